//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Fixture file has problems
    #[error("Fixture has {count} problem(s)")]
    InvalidFixture {
        /// Number of problems
        count: usize,
    },

    /// One or more scenarios failed
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed {
        /// Failed or skipped scenarios
        failed: usize,
        /// Scenarios in the suite
        total: usize,
    },

    /// nzverify library error
    #[error("{0}")]
    Verify(#[from] nzverify::VerifyError),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument() {
        let err = CliError::invalid_argument("expected column=value, got 'factor'");
        assert!(err.to_string().starts_with("Invalid argument: expected"));
    }

    #[test]
    fn test_from_verify_error() {
        let err: CliError = nzverify::VerifyError::UnknownTable {
            table: "scope9".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Unknown table: scope9");
    }

    #[test]
    fn test_scenarios_failed() {
        let err = CliError::ScenariosFailed { failed: 1, total: 3 };
        assert_eq!(err.to_string(), "1 of 3 scenario(s) failed");
    }
}
