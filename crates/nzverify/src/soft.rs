//! Soft assertions
//!
//! Diagnostics that should not stop a scenario on their own, such as an
//! auto-populated unit label or a factor that differs from the reference
//! table. They are collected and attached to the report; in
//! [`SoftMode::Escalate`] any collected failure fails the scenario once the
//! hard checks have passed.
//!
//! Reconciliation and retention mismatches never go through here.

use serde::{Deserialize, Serialize};

/// A single diagnostic failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    /// Message describing the failure
    pub message: String,
    /// Field or total the failure is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Index of this failure in the sequence
    pub index: usize,
}

impl AssertionFailure {
    /// Create a new assertion failure
    #[must_use]
    pub fn new(message: impl Into<String>, index: usize) -> Self {
        Self {
            message: message.into(),
            location: None,
            index,
        }
    }

    /// Set the location of the failure
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// What happens to collected failures at the end of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftMode {
    /// Report only (default)
    #[default]
    Collect,
    /// Fail the scenario if any were collected
    Escalate,
}

/// Summary of assertion results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionSummary {
    /// Total assertions checked
    pub total: usize,
    /// Assertions that passed
    pub passed: usize,
    /// Assertions that failed
    pub failed: usize,
}

/// Soft assertions collector
///
/// ```
/// use nzverify::soft::SoftAssertions;
///
/// let mut soft = SoftAssertions::new();
/// soft.assert_text_eq("scope1_fuels[0].unit", "kWh", "kWh");
/// soft.assert_text_eq("scope1_fuels[0].unit", "kWh", "MWh");
/// assert_eq!(soft.failure_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SoftAssertions {
    failures: Vec<AssertionFailure>,
    mode: SoftMode,
    assertion_count: usize,
}

impl SoftAssertions {
    /// Create a new soft assertions collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a specific mode
    #[must_use]
    pub fn with_mode(mode: SoftMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Current mode
    #[must_use]
    pub const fn mode(&self) -> SoftMode {
        self.mode
    }

    /// Text at `location` should equal the reference
    pub fn assert_text_eq(&mut self, location: &str, expected: &str, actual: &str) {
        self.assertion_count += 1;
        if expected.trim() != actual.trim() {
            self.record_failure(
                location,
                format!("expected '{expected}', got '{actual}'"),
            );
        }
    }

    /// Amount at `location` should agree with the reference within epsilon
    pub fn assert_approx_eq(&mut self, location: &str, expected: f64, actual: f64, epsilon: f64) {
        self.assertion_count += 1;
        if !crate::reconcile::within_epsilon(expected, actual, epsilon) {
            self.record_failure(
                location,
                format!("expected {expected} ≈ {actual} (epsilon: {epsilon})"),
            );
        }
    }

    /// Record a custom failure
    pub fn fail(&mut self, location: &str, message: impl Into<String>) {
        self.assertion_count += 1;
        self.record_failure(location, message.into());
    }

    fn record_failure(&mut self, location: &str, message: String) {
        let failure = AssertionFailure::new(message, self.failures.len()).with_location(location);
        tracing::warn!(location, message = %failure.message, "soft assertion failed");
        self.failures.push(failure);
    }

    /// Get all failures
    #[must_use]
    pub fn failures(&self) -> &[AssertionFailure] {
        &self.failures
    }

    /// Get the number of failures
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all assertions passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Get a summary of the assertions
    #[must_use]
    pub fn summary(&self) -> AssertionSummary {
        AssertionSummary {
            total: self.assertion_count,
            passed: self.assertion_count - self.failures.len(),
            failed: self.failures.len(),
        }
    }

    /// Apply the mode to the collected failures.
    ///
    /// # Errors
    ///
    /// `SoftAssertionsFailed` in escalate mode when anything was collected.
    pub fn verify(&self) -> crate::result::VerifyResult<()> {
        if self.mode == SoftMode::Collect || self.failures.is_empty() {
            return Ok(());
        }
        let summary = self
            .failures
            .iter()
            .map(|f| match &f.location {
                Some(location) => format!("{location}: {}", f.message),
                None => f.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(crate::result::VerifyError::SoftAssertionsFailed {
            count: self.failures.len(),
            summary,
        })
    }

    /// Hand over the collected failures
    #[must_use]
    pub fn into_failures(self) -> Vec<AssertionFailure> {
        self.failures
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_mode_never_fails() {
        let mut soft = SoftAssertions::new();
        soft.assert_text_eq("unit", "kWh", "MWh");
        soft.fail("factor", "no reference value");
        assert_eq!(soft.failure_count(), 2);
        soft.verify().unwrap();
    }

    #[test]
    fn test_escalate_mode_fails_with_summary() {
        let mut soft = SoftAssertions::with_mode(SoftMode::Escalate);
        soft.assert_text_eq("scope1_fuels[0].unit", "kWh", "MWh");
        let err = soft.verify().unwrap_err();
        assert_eq!(err.kind(), "soft_assertions_failed");
        assert!(err.to_string().contains("scope1_fuels[0].unit: expected 'kWh', got 'MWh'"));
    }

    #[test]
    fn test_escalate_mode_passes_when_clean() {
        let mut soft = SoftAssertions::with_mode(SoftMode::Escalate);
        soft.assert_approx_eq("factor", 2539.25, 2539.25, 0.01);
        soft.verify().unwrap();
        assert!(soft.all_passed());
    }

    #[test]
    fn test_summary_counts() {
        let mut soft = SoftAssertions::new();
        soft.assert_text_eq("a", "x", "x");
        soft.assert_approx_eq("b", 1.0, 2.0, 0.01);
        let summary = soft.summary();
        assert_eq!((summary.total, summary.passed, summary.failed), (2, 1, 1));
        let failures = soft.into_failures();
        assert_eq!(failures[0].location.as_deref(), Some("b"));
        assert_eq!(failures[0].index, 0);
    }

    #[test]
    fn test_mode_serde() {
        let mode: SoftMode = serde_json::from_str("\"escalate\"").unwrap();
        assert_eq!(mode, SoftMode::Escalate);
    }
}
