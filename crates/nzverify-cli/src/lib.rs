//! nzverify CLI library
//!
//! Catalog inspection, offline expectation checks and simulated scenario
//! runs for the `nzverify` binary.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, ExpectArgs, FixtureArgs, ReportFormat, SectionArg, SectionArgs,
    SimulateArgs, TablesArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::init_tracing;
pub use output::{render_scenario, Reporter};
