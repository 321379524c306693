//! Reconciler
//!
//! Compares observed UI values against expectations. Numeric comparison is
//! tolerant to [`DEFAULT_EPSILON`] after separator stripping; text is
//! compared exactly. A mismatch carries everything needed to diagnose it
//! without re-running: both renderings, both parsed values, the tolerance
//! and the arithmetic behind the expectation.

use crate::amount::{format_amount, parse_amount};
use crate::expect::{Breakdown, Expectation};
use crate::poller::Settlement;
use crate::result::{VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Tolerance used for amounts unless configured otherwise
pub const DEFAULT_EPSILON: f64 = 0.01;

// absorbs binary representation error at exactly one epsilon
const FLOAT_SLACK: f64 = 1e-9;

/// Diagnostic payload of a failed comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    /// What was compared (field or total)
    pub label: String,
    /// Expected value as rendered
    pub expected: String,
    /// Observed value as read
    pub observed: String,
    /// Parsed expected value, for numeric comparisons
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    /// Parsed observed value, if it parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<f64>,
    /// Tolerance applied; zero for exact text
    pub epsilon: f64,
    /// Arithmetic behind the expectation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected '{}', observed '{}'",
            self.label, self.expected, self.observed
        )?;
        if let (Some(e), Some(o)) = (self.expected_value, self.observed_value) {
            write!(f, " (diff {:.4}, epsilon {})", (e - o).abs(), self.epsilon)?;
        }
        if let Some(breakdown) = &self.breakdown {
            write!(f, " [{breakdown}]")?;
        }
        Ok(())
    }
}

impl From<Mismatch> for VerifyError {
    fn from(mismatch: Mismatch) -> Self {
        Self::ReconciliationMismatch(Box::new(mismatch))
    }
}

/// Whether two amounts agree within `epsilon`
#[must_use]
pub fn within_epsilon(expected: f64, observed: f64, epsilon: f64) -> bool {
    (expected - observed).abs() <= epsilon + FLOAT_SLACK
}

/// Compares observed values against expectations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciler {
    epsilon: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl Reconciler {
    /// Reconciler with the given tolerance
    #[must_use]
    pub const fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Tolerance
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Compare two amounts in UI rendering.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` if the expected text does not parse, otherwise
    /// `ReconciliationMismatch` when the values differ beyond epsilon or the
    /// observed text is not an amount.
    pub fn assert_numeric_equal(
        &self,
        label: &str,
        expected: &str,
        observed: &str,
        breakdown: Option<&Breakdown>,
    ) -> VerifyResult<()> {
        let expected_value = parse_amount(expected)?;
        let observed_value = parse_amount(observed).ok();
        let agrees = observed_value.is_some_and(|o| within_epsilon(expected_value, o, self.epsilon));
        debug!(label, expected, observed, agrees, "numeric comparison");
        if agrees {
            return Ok(());
        }
        Err(Mismatch {
            label: label.to_string(),
            expected: expected.to_string(),
            observed: observed.to_string(),
            expected_value: Some(expected_value),
            observed_value,
            epsilon: self.epsilon,
            breakdown: breakdown.cloned(),
        }
        .into())
    }

    /// Compare an observed amount against a computed expectation
    pub fn assert_expectation(
        &self,
        label: &str,
        expectation: &Expectation,
        observed: &str,
    ) -> VerifyResult<()> {
        self.assert_numeric_equal(
            label,
            &format_amount(expectation.value),
            observed,
            Some(&expectation.breakdown),
        )
    }

    /// Compare text exactly, whitespace included
    pub fn assert_exact_string(&self, label: &str, expected: &str, observed: &str) -> VerifyResult<()> {
        if expected == observed {
            return Ok(());
        }
        Err(Mismatch {
            label: label.to_string(),
            expected: expected.to_string(),
            observed: observed.to_string(),
            expected_value: None,
            observed_value: None,
            epsilon: 0.0,
            breakdown: None,
        }
        .into())
    }

    /// Reconcile the outcome of a poll against an expectation.
    ///
    /// A poll that ran out of budget while the value still looked
    /// uncalculated is a `SettlementTimeout`, whatever the expectation; a
    /// poll that ran out on a drifting but calculated value is compared.
    pub fn reconcile_settlement(
        &self,
        label: &str,
        expectation: &Expectation,
        settlement: &Settlement,
    ) -> VerifyResult<()> {
        if settlement.timed_out_unsettled() {
            return Err(VerifyError::SettlementTimeout {
                field: label.to_string(),
                last_observed: settlement.value.clone(),
                attempts: settlement.attempts,
            });
        }
        self.assert_expectation(label, expectation, &settlement.value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::expect::Operand;
    use crate::poller::SettlementStatus;
    use std::time::Duration;

    fn settlement(value: &str, status: SettlementStatus, unsettled: bool) -> Settlement {
        Settlement {
            value: value.to_string(),
            attempts: 5,
            status,
            unsettled,
            elapsed: Duration::ZERO,
        }
    }

    fn fuel_expectation() -> Expectation {
        Expectation::new(Breakdown::product(
            vec![Operand::new("factor", 2539.25), Operand::new("consumption", 100.0)],
            253_925.0,
        ))
    }

    mod numeric {
        use super::*;

        #[test]
        fn test_equal_after_separator_stripping() {
            let r = Reconciler::default();
            r.assert_numeric_equal("t", "253,925.00", "253925", None).unwrap();
        }

        #[test]
        fn test_boundary_is_inclusive() {
            let r = Reconciler::default();
            r.assert_numeric_equal("t", "14.90", "14.91", None).unwrap();
            assert!(r.assert_numeric_equal("t", "14.90", "14.92", None).is_err());
        }

        #[test]
        fn test_mismatch_carries_diagnostics() {
            let r = Reconciler::default();
            let exp = fuel_expectation();
            let err = r.assert_expectation("scope1_fuels[0].total", &exp, "253,926.00").unwrap_err();
            let VerifyError::ReconciliationMismatch(m) = err else {
                panic!("expected mismatch");
            };
            assert_eq!(m.expected, "253,925.00");
            assert_eq!(m.observed_value, Some(253_926.0));
            assert_eq!(m.epsilon, DEFAULT_EPSILON);
            let text = m.to_string();
            assert!(text.contains("factor 2539.25 × consumption 100"), "{text}");
        }

        #[test]
        fn test_non_numeric_observed_is_mismatch() {
            let r = Reconciler::default();
            let err = r.assert_numeric_equal("t", "1.00", "N/A", None).unwrap_err();
            assert_eq!(err.kind(), "reconciliation_mismatch");
        }

        #[test]
        fn test_non_numeric_expected_is_invalid() {
            let r = Reconciler::default();
            let err = r.assert_numeric_equal("t", "abc", "1.00", None).unwrap_err();
            assert_eq!(err.kind(), "invalid_amount");
        }

        #[test]
        fn test_custom_epsilon() {
            let r = Reconciler::new(1.0);
            r.assert_numeric_equal("t", "100.00", "100.75", None).unwrap();
            assert_eq!(r.epsilon(), 1.0);
        }
    }

    mod text {
        use super::*;

        #[test]
        fn test_exact_string() {
            let r = Reconciler::default();
            r.assert_exact_string("fuel", "Natural Gas", "Natural Gas").unwrap();
            assert!(r.assert_exact_string("fuel", "Natural Gas", " Natural Gas").is_err());
            let err = r.assert_exact_string("fuel", "Natural Gas", "natural gas").unwrap_err();
            assert!(err.to_string().contains("expected 'Natural Gas'"));
        }
    }

    mod settlements {
        use super::*;

        #[test]
        fn test_exhausted_sentinel_is_timeout() {
            let r = Reconciler::default();
            let s = settlement("0.00", SettlementStatus::Exhausted, true);
            let err = r.reconcile_settlement("total", &fuel_expectation(), &s).unwrap_err();
            match err {
                VerifyError::SettlementTimeout { last_observed, attempts, .. } => {
                    assert_eq!(last_observed, "0.00");
                    assert_eq!(attempts, 5);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_exhausted_sentinel_times_out_even_if_zero_expected() {
            let r = Reconciler::default();
            let zero = Expectation::new(Breakdown::product(vec![Operand::new("credits", 0.0)], 0.0));
            let s = settlement("0.00", SettlementStatus::Exhausted, true);
            assert_eq!(
                r.reconcile_settlement("total", &zero, &s).unwrap_err().kind(),
                "settlement_timeout"
            );
        }

        #[test]
        fn test_exhausted_drift_is_compared() {
            let r = Reconciler::default();
            let s = settlement("253,925.00", SettlementStatus::Exhausted, false);
            r.reconcile_settlement("total", &fuel_expectation(), &s).unwrap();
        }

        #[test]
        fn test_stable_value_is_compared() {
            let r = Reconciler::default();
            let s = settlement("253,925.00", SettlementStatus::Stable, false);
            r.reconcile_settlement("total", &fuel_expectation(), &s).unwrap();
            let wrong = settlement("250,000.00", SettlementStatus::Stable, false);
            assert!(r.reconcile_settlement("total", &fuel_expectation(), &wrong).is_err());
        }
    }
}
