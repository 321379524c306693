//! nzverify: verified form entry and reconciliation for net-zero reporting UIs
//!
//! ## Usage
//!
//! ```bash
//! nzverify tables --section emissions               # Show the catalog
//! nzverify expect scope1_fuels fuel="Natural Gas" consumption=100
//! nzverify section A=253925 B=11820 C=6800          # Sum table totals
//! nzverify fixture factors.yaml                     # Check a fixture file
//! nzverify simulate gas.yaml -f json                # Run against the mock app
//! ```

use clap::Parser;
use nzverify_cli::{handlers, init_tracing, Cli, CliConfig, CliResult, Commands, Reporter, Verbosity};
use std::process::ExitCode;
use tracing::debug;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_tracing(&config);
    debug!(?config, "starting");

    let catalog = handlers::load_catalog(cli.catalog.as_deref())?;

    match cli.command {
        Commands::Tables(args) => handlers::execute_tables(&catalog, &args),
        Commands::Expect(args) => handlers::execute_expect(&catalog, &args),
        Commands::Section(args) => handlers::execute_section(&args),
        Commands::Fixture(args) => {
            let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
            handlers::execute_fixture(&catalog, &args, &reporter)
        }
        Commands::Simulate(args) => handlers::execute_simulate(&catalog, &config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.clone().into())
        .with_log_json(cli.log_json)
}
