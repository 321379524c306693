//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// nzverify: verified form entry and reconciliation for net-zero reporting UIs
#[derive(Parser, Debug)]
#[command(name = "nzverify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Catalog YAML to use instead of the built-in one
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List catalog tables, rollups and mirrors
    Tables(TablesArgs),

    /// Compute the expected total of one row
    Expect(ExpectArgs),

    /// Sum table totals into a section total
    Section(SectionArgs),

    /// Validate a fixture file against the catalog
    Fixture(FixtureArgs),

    /// Run a scenario or suite against the in-memory application
    Simulate(SimulateArgs),
}

/// Arguments for the tables command
#[derive(Parser, Debug)]
pub struct TablesArgs {
    /// Only tables of this section
    #[arg(short, long)]
    pub section: Option<SectionArg>,

    /// Print the catalog as YAML
    #[arg(long)]
    pub yaml: bool,
}

/// Arguments for the expect command
#[derive(Parser, Debug)]
pub struct ExpectArgs {
    /// Table id, e.g. scope1_fuels
    pub table: String,

    /// Column values as column=value; missing auto-populated columns are
    /// looked up from the reference factors
    #[arg(value_name = "COLUMN=VALUE")]
    pub values: Vec<String>,

    /// Fixture file overriding the built-in reference factors
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

/// Arguments for the section command
#[derive(Parser, Debug)]
pub struct SectionArgs {
    /// Table totals as label=amount
    #[arg(value_name = "LABEL=AMOUNT", required = true)]
    pub totals: Vec<String>,
}

/// Arguments for the fixture command
#[derive(Parser, Debug)]
pub struct FixtureArgs {
    /// Fixture file (YAML, or JSON by extension)
    pub file: PathBuf,
}

/// Arguments for the simulate command
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Scenario or suite YAML
    pub file: PathBuf,

    /// Fixture file merged over the built-in reference factors
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Verification config YAML
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Defects for the simulated application, as YAML
    #[arg(long)]
    pub defects: Option<PathBuf>,

    /// Reads before derived values show up after a write
    #[arg(long, default_value = "0")]
    pub settle_reads: u32,

    /// Stop after the first failed scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,
}

/// Report output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON report
    Json,
}

/// Section filter
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionArg {
    /// Emissions tab
    Emissions,
    /// Energy tab
    Energy,
    /// Water tab
    Water,
    /// Waste tab
    Waste,
    /// Offsets tab
    Offsets,
}

impl From<SectionArg> for nzverify::Section {
    fn from(arg: SectionArg) -> Self {
        match arg {
            SectionArg::Emissions => Self::Emissions,
            SectionArg::Energy => Self::Energy,
            SectionArg::Water => Self::Water,
            SectionArg::Waste => Self::Waste,
            SectionArg::Offsets => Self::Offsets,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_expect() {
        let cli = Cli::parse_from([
            "nzverify",
            "expect",
            "scope1_fuels",
            "fuel=Natural Gas",
            "consumption=100",
        ]);
        let Commands::Expect(args) = cli.command else {
            panic!("expected expect command");
        };
        assert_eq!(args.table, "scope1_fuels");
        assert_eq!(args.values, ["fuel=Natural Gas", "consumption=100"]);
    }

    #[test]
    fn test_parse_simulate_with_globals() {
        let cli = Cli::parse_from([
            "nzverify",
            "simulate",
            "gas.yaml",
            "--settle-reads",
            "2",
            "-f",
            "json",
            "-vv",
            "--log-json",
        ]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate command");
        };
        assert_eq!(args.settle_reads, 2);
        assert_eq!(args.format, ReportFormat::Json);
    }

    #[test]
    fn test_section_requires_totals() {
        assert!(Cli::try_parse_from(["nzverify", "section"]).is_err());
    }

    #[test]
    fn test_section_arg_conversion() {
        assert_eq!(nzverify::Section::from(SectionArg::Energy), nzverify::Section::Energy);
    }
}
