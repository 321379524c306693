//! Result and error types for nzverify.

use crate::reconcile::Mismatch;
use thiserror::Error;

/// Result type for nzverify operations
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Errors that can occur while entering and verifying form data.
///
/// Every variant is fatal to the scenario that raised it: the runner stops at
/// the first error and records it in the report.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Catalog asked for a table id it does not know
    #[error("Unknown table: {table}")]
    UnknownTable {
        /// Requested table id
        table: String,
    },

    /// Column not declared on the table
    #[error("Unknown column '{column}' on table {table}")]
    UnknownColumn {
        /// Table id
        table: String,
        /// Requested column
        column: String,
    },

    /// Auto-populated or computed column passed as an entry value
    #[error("Column '{column}' on table {table} is read-only and cannot be entered")]
    ReadOnlyColumn {
        /// Table id
        table: String,
        /// Offending column
        column: String,
    },

    /// An entered column was observed disabled at write time
    #[error("Field {field} is not editable")]
    FieldNotEditable {
        /// Field address
        field: String,
    },

    /// A derived field never left its unsettled state
    #[error(
        "Field {field} did not settle after {attempts} attempt(s), last observed '{last_observed}'"
    )]
    SettlementTimeout {
        /// Field address
        field: String,
        /// Last value read before giving up
        last_observed: String,
        /// Number of reads made
        attempts: u32,
    },

    /// Expected and observed values differ beyond tolerance
    #[error("Reconciliation mismatch: {0}")]
    ReconciliationMismatch(Box<Mismatch>),

    /// A value surfaced in a second section diverged from the original
    #[error(
        "Retention mismatch for {column}: {source_field} = '{expected}' but {mirror_field} = '{observed}'"
    )]
    RetentionMismatch {
        /// Column compared
        column: String,
        /// Field where the value was entered
        source_field: String,
        /// Field where the value was re-read
        mirror_field: String,
        /// Value recorded at entry
        expected: String,
        /// Value read in the mirror view
        observed: String,
    },

    /// Value could not be parsed as an amount
    #[error("Invalid amount '{value}'")]
    InvalidAmount {
        /// Raw text
        value: String,
    },

    /// Total rule operand missing from the row
    #[error("Row {row} has no value for operand '{column}'")]
    MissingOperand {
        /// Row address
        row: String,
        /// Missing column
        column: String,
    },

    /// Catalog definition violates an invariant
    #[error("Invalid catalog: {message}")]
    InvalidCatalog {
        /// Error message
        message: String,
    },

    /// Scenario state machine was driven out of order
    #[error("Invalid scenario transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Soft assertions escalated at the end of a scenario
    #[error("{count} soft assertion(s) failed: {summary}")]
    SoftAssertionsFailed {
        /// Number of failures
        count: usize,
        /// Joined failure messages
        summary: String,
    },

    /// Driver reported a failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Fixture data could not be loaded
    #[error("Fixture error: {message}")]
    Fixture {
        /// Error message
        message: String,
    },

    /// Configuration is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifyError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a fixture error
    #[must_use]
    pub fn fixture(message: impl Into<String>) -> Self {
        Self::Fixture {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid catalog error
    #[must_use]
    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            message: message.into(),
        }
    }

    /// Short stable name of the variant, used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTable { .. } => "unknown_table",
            Self::UnknownColumn { .. } => "unknown_column",
            Self::ReadOnlyColumn { .. } => "read_only_column",
            Self::FieldNotEditable { .. } => "field_not_editable",
            Self::SettlementTimeout { .. } => "settlement_timeout",
            Self::ReconciliationMismatch(_) => "reconciliation_mismatch",
            Self::RetentionMismatch { .. } => "retention_mismatch",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::MissingOperand { .. } => "missing_operand",
            Self::InvalidCatalog { .. } => "invalid_catalog",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::SoftAssertionsFailed { .. } => "soft_assertions_failed",
            Self::Driver { .. } => "driver",
            Self::Fixture { .. } => "fixture",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Yaml(_) => "yaml",
            Self::Json(_) => "json",
        }
    }

    /// Whether the error reports a defect in the application under test
    /// rather than in the catalog, fixture or driver
    #[must_use]
    pub const fn is_application_defect(&self) -> bool {
        matches!(
            self,
            Self::FieldNotEditable { .. }
                | Self::SettlementTimeout { .. }
                | Self::ReconciliationMismatch(_)
                | Self::RetentionMismatch { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_table_display() {
        let err = VerifyError::UnknownTable {
            table: "scope9".into(),
        };
        assert_eq!(err.to_string(), "Unknown table: scope9");
        assert_eq!(err.kind(), "unknown_table");
        assert!(!err.is_application_defect());
    }

    #[test]
    fn test_settlement_timeout_carries_last_value() {
        let err = VerifyError::SettlementTimeout {
            field: "Emissions/scope1_fuels[0].total".into(),
            last_observed: "0.00".into(),
            attempts: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("5 attempt(s)"));
        assert!(msg.contains("'0.00'"));
        assert!(err.is_application_defect());
    }

    #[test]
    fn test_retention_mismatch_display() {
        let err = VerifyError::RetentionMismatch {
            column: "factor".into(),
            source_field: "Emissions/scope1_fuels[0].factor".into(),
            mirror_field: "Energy/scope1_fuels[0].factor".into(),
            expected: "2539.25".into(),
            observed: "2539.00".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Energy/scope1_fuels[0].factor"));
        assert!(msg.contains("'2539.00'"));
    }

    #[test]
    fn test_constructors() {
        assert!(VerifyError::driver("gone").to_string().contains("Driver"));
        assert!(VerifyError::fixture("bad").to_string().contains("Fixture"));
        assert!(VerifyError::config("bad").to_string().contains("Configuration"));
        assert!(VerifyError::invalid_catalog("dup")
            .to_string()
            .contains("Invalid catalog"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VerifyError = io_err.into();
        assert_eq!(err.kind(), "io");
    }
}
