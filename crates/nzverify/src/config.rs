//! Verification configuration
//!
//! Tolerances, retry budgets and timeouts for a run. Loaded from YAML or
//! built in code; every field has a default.
//!
//! ```yaml
//! epsilon: 0.01
//! default_policy: { max_attempts: 5, interval_ms: 1000 }
//! table_policies:
//!   scope2_electricity: { max_attempts: 3, interval_ms: 5000 }
//! soft_mode: escalate
//! ```

use crate::catalog::TableId;
use crate::poller::PollPolicy;
use crate::reconcile::DEFAULT_EPSILON;
use crate::result::{VerifyError, VerifyResult};
use crate::soft::SoftMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Configuration of one verification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Tolerance for amount comparisons
    pub epsilon: f64,
    /// Poll policy for tables without an override
    pub default_policy: PollPolicy,
    /// Per-table poll policies
    pub table_policies: BTreeMap<TableId, PollPolicy>,
    /// How long to wait for a field to render, in milliseconds
    pub visibility_timeout_ms: u64,
    /// How long to wait for a view to load, in milliseconds
    pub load_timeout_ms: u64,
    /// What happens to soft diagnostics
    pub soft_mode: SoftMode,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            default_policy: PollPolicy::default(),
            table_policies: BTreeMap::new(),
            visibility_timeout_ms: 10_000,
            load_timeout_ms: 30_000,
            soft_mode: SoftMode::Collect,
        }
    }
}

impl VerifyConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll policy for a table
    #[must_use]
    pub fn policy_for(&self, table: &TableId) -> PollPolicy {
        self.table_policies
            .get(table)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Policy with the longest budget among `tables`, for values derived
    /// from all of them
    #[must_use]
    pub fn policy_for_tables(&self, tables: &[TableId]) -> PollPolicy {
        tables
            .iter()
            .map(|t| self.policy_for(t))
            .max_by_key(|p| (u64::from(p.max_attempts) * p.interval_ms, p.max_attempts))
            .unwrap_or(self.default_policy)
    }

    /// Visibility timeout
    #[must_use]
    pub const fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }

    /// Load timeout
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Set the tolerance
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the default poll policy
    #[must_use]
    pub const fn with_default_policy(mut self, policy: PollPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Override the poll policy of one table
    #[must_use]
    pub fn with_table_policy(mut self, table: impl Into<TableId>, policy: PollPolicy) -> Self {
        let _ = self.table_policies.insert(table.into(), policy);
        self
    }

    /// Set the soft assertion mode
    #[must_use]
    pub const fn with_soft_mode(mut self, mode: SoftMode) -> Self {
        self.soft_mode = mode;
        self
    }

    /// Set the visibility timeout
    #[must_use]
    pub const fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Reject values that would make every comparison or poll meaningless
    pub fn validate(&self) -> VerifyResult<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(VerifyError::config(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        let policies = std::iter::once(("default", &self.default_policy)).chain(
            self.table_policies
                .iter()
                .map(|(table, policy)| (table.as_str(), policy)),
        );
        for (name, policy) in policies {
            if policy.max_attempts == 0 {
                return Err(VerifyError::config(format!(
                    "poll policy '{name}' must allow at least one attempt"
                )));
            }
            if policy.confirm_reads >= policy.max_attempts {
                return Err(VerifyError::config(format!(
                    "poll policy '{name}' needs more attempts than confirming reads"
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate YAML configuration
    pub fn from_yaml_str(yaml: &str) -> VerifyResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }
}
