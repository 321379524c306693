//! Suites of scenarios.

use crate::driver::FormDriver;
use crate::result::VerifyResult;
use crate::scenario::{Scenario, ScenarioReport, ScenarioRunner};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Named scenarios run one after another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    /// Suite name
    pub name: String,
    /// Scenarios in run order
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    /// Stop after the first failed scenario
    #[serde(default)]
    pub fail_fast: bool,
}

impl Suite {
    /// Create an empty suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
            fail_fast: false,
        }
    }

    /// Add a scenario
    #[must_use]
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Enable fail-fast mode
    #[must_use]
    pub const fn with_fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Parse a YAML suite
    pub fn from_yaml_str(yaml: &str) -> VerifyResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML suite file
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Run every scenario, each against its own record
    pub fn run(&self, runner: &ScenarioRunner, driver: &mut dyn FormDriver) -> SuiteReport {
        let start = Instant::now();
        let mut reports = Vec::with_capacity(self.scenarios.len());
        let mut skipped = 0;
        for (i, scenario) in self.scenarios.iter().enumerate() {
            let report = runner.run(scenario, driver);
            let failed = !report.passed();
            reports.push(report);
            if failed && self.fail_fast {
                skipped = self.scenarios.len() - i - 1;
                info!(suite = %self.name, skipped, "fail-fast: stopping suite");
                break;
            }
        }
        let report = SuiteReport {
            suite: self.name.clone(),
            reports,
            skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            suite = %self.name,
            passed = report.passed_count(),
            failed = report.failed_count(),
            skipped,
            "suite finished"
        );
        report
    }
}

/// Results of a suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite: String,
    /// One report per scenario that ran
    pub reports: Vec<ScenarioReport>,
    /// Scenarios not run because of fail-fast
    pub skipped: usize,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl SuiteReport {
    /// Check if every scenario that ran passed and none were skipped
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.skipped == 0 && self.reports.iter().all(ScenarioReport::passed)
    }

    /// Count passed scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    /// Count failed scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.passed()).count()
    }

    /// Get failed scenarios
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioReport> {
        self.reports.iter().filter(|r| !r.passed()).collect()
    }

    /// Pretty JSON
    pub fn to_json(&self) -> VerifyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::VerifyConfig;
    use crate::driver::{MockDefects, MockDriver};
    use crate::fixture::FixtureData;
    use crate::poller::PollPolicy;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(Catalog::builtin())
            .with_fixture(FixtureData::builtin_factors())
            .with_config(VerifyConfig::new().with_default_policy(PollPolicy::immediate()))
    }

    fn scope2() -> Scenario {
        Scenario::new("scope 2")
            .with_row(
                "scope2_electricity",
                &[("activity", "Non Renewable Electricity from Grid"), ("consumption", "100")],
            )
            .with_section_total("scope2_total")
    }

    fn bad_process() -> Scenario {
        Scenario::new("unknown process").with_row("scope1_process", &[("process", "Lime Kiln"), ("quantity", "1")])
    }

    #[test]
    fn test_empty_suite() {
        let report = Suite::new("empty").run(&runner(), &mut MockDriver::builtin());
        assert!(report.all_passed());
        assert_eq!(report.reports.len(), 0);
    }

    #[test]
    fn test_counts_without_fail_fast() {
        let suite = Suite::new("mixed")
            .with_scenario(bad_process())
            .with_scenario(scope2());
        let report = suite.run(&runner(), &mut MockDriver::builtin());
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failures()[0].scenario, "unknown process");
        assert!(!report.all_passed());
    }

    #[test]
    fn test_fail_fast_skips_rest() {
        let suite = Suite::new("ff")
            .with_scenario(bad_process())
            .with_scenario(scope2())
            .with_fail_fast();
        let report = suite.run(&runner(), &mut MockDriver::builtin());
        assert_eq!(report.reports.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_scenarios_get_separate_records() {
        let suite = Suite::new("two").with_scenario(scope2()).with_scenario(scope2());
        let defects = MockDefects::new();
        let report = suite.run(&runner(), &mut MockDriver::builtin().with_defects(defects));
        assert!(report.all_passed());
        assert_ne!(report.reports[0].record_id, report.reports[1].record_id);
    }

    #[test]
    fn test_yaml_suite() {
        let yaml = r"
name: smoke
fail_fast: true
scenarios:
  - name: electricity
    entries:
      - table: scope2_electricity
        rows:
          - { activity: Non Renewable Electricity from Grid, consumption: 100 }
    section_totals: [scope2_total]
";
        let suite = Suite::from_yaml_str(yaml).unwrap();
        assert!(suite.fail_fast);
        let report = suite.run(&runner(), &mut MockDriver::builtin());
        assert!(report.all_passed(), "{}", report.to_json().unwrap());
    }
}
