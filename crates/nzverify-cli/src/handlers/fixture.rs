//! Fixture command handler

use crate::commands::FixtureArgs;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use nzverify::{Catalog, FixtureData};
use std::path::Path;

/// Execute the fixture command
pub fn execute_fixture(catalog: &Catalog, args: &FixtureArgs, reporter: &Reporter) -> CliResult<()> {
    let problems = check_fixture(catalog, &args.file)?;
    if problems.is_empty() {
        reporter.success(&format!("{} is consistent with the catalog", args.file.display()));
        return Ok(());
    }
    for problem in &problems {
        reporter.failure(problem);
    }
    Err(CliError::InvalidFixture {
        count: problems.len(),
    })
}

/// Load a fixture file and list its problems against the catalog
pub fn check_fixture(catalog: &Catalog, path: &Path) -> CliResult<Vec<String>> {
    Ok(FixtureData::load(path)?.check_against(catalog))
}
