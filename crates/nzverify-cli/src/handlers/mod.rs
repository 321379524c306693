//! Command handlers
//!
//! Each handler renders its output as a string in a pure helper, which the
//! `execute_*` entry point prints. The helpers carry the tests.

pub mod expect;
pub mod fixture;
pub mod section;
pub mod simulate;
pub mod tables;

pub use expect::{execute_expect, expect_row};
pub use fixture::{check_fixture, execute_fixture};
pub use section::{execute_section, section_total};
pub use simulate::{execute_simulate, load_suite};
pub use tables::{execute_tables, render_tables};

use crate::error::{CliError, CliResult};
use nzverify::Catalog;
use std::path::Path;

/// The `--catalog` file, or the built-in catalog
pub fn load_catalog(path: Option<&Path>) -> CliResult<Catalog> {
    Ok(match path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    })
}

/// Split a `key=value` argument
pub fn parse_pair(arg: &str) -> CliResult<(&str, &str)> {
    arg.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| CliError::invalid_argument(format!("expected key=value, got '{arg}'")))
}
