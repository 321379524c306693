//! Simulate command handler

use crate::commands::{ReportFormat, SimulateArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use nzverify::{
    Catalog, FixtureData, MockDefects, MockDriver, Scenario, ScenarioRunner, Suite, SuiteReport,
    VerifyConfig,
};
use std::path::Path;
use tracing::{debug, info};

/// Execute the simulate command
pub fn execute_simulate(catalog: &Catalog, config: &CliConfig, args: &SimulateArgs) -> CliResult<()> {
    let suite = load_suite(&args.file, args.fail_fast)?;

    let mut fixture = FixtureData::builtin_factors();
    if let Some(path) = &args.fixture {
        fixture = fixture.merged(&FixtureData::load(path)?);
    }
    let verify_config = match &args.config {
        Some(path) => VerifyConfig::load(path)?,
        None => VerifyConfig::default(),
    };
    let defects: MockDefects = match &args.defects {
        Some(path) => serde_yaml_ng::from_str(&std::fs::read_to_string(path)?)?,
        None => MockDefects::new(),
    };
    debug!(?defects, settle_reads = args.settle_reads, "simulated application");

    let mut driver = MockDriver::new(catalog.clone(), FixtureData::builtin_factors())
        .with_settle_reads(args.settle_reads)
        .with_defects(defects);
    let runner = ScenarioRunner::new(catalog.clone())
        .with_fixture(fixture)
        .with_config(verify_config);

    info!(suite = %suite.name, scenarios = suite.scenarios.len(), "running suite");
    let report = suite.run(&runner, &mut driver);
    print_report(&report, config, args.format)?;

    if report.all_passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: report.failed_count() + report.skipped,
            total: report.reports.len() + report.skipped,
        })
    }
}

fn print_report(report: &SuiteReport, config: &CliConfig, format: ReportFormat) -> CliResult<()> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        ReportFormat::Text => {
            let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
            for scenario in &report.reports {
                reporter.scenario(scenario);
            }
            reporter.summary(report);
        }
    }
    Ok(())
}

/// Load a suite file, or a single scenario file as a one-scenario suite
pub fn load_suite(path: &Path, fail_fast: bool) -> CliResult<Suite> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(&text)?;
    let mut suite = if value.get("scenarios").is_some() {
        serde_yaml_ng::from_value::<Suite>(value)?
    } else {
        let scenario: Scenario = serde_yaml_ng::from_value(value)?;
        Suite::new(scenario.name.clone()).with_scenario(scenario)
    };
    if fail_fast {
        suite = suite.with_fail_fast();
    }
    Ok(suite)
}
