//! Settlement Poller
//!
//! The application recomputes derived fields asynchronously relative to the
//! input events that drive them. After every write that feeds an
//! auto-populated or computed field, the field is re-read until it holds a
//! settled value that survives a confirming re-read, or the attempt budget
//! runs out.
//!
//! Exhaustion is not an error here: the last observation is returned with
//! [`SettlementStatus::Exhausted`] and the reconciler decides whether it is
//! acceptable.

use crate::amount::is_zero_amount;
use crate::result::VerifyResult;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default "not yet calculated" predicate: blank text or a zero amount.
#[must_use]
pub fn is_unsettled_default(value: &str) -> bool {
    value.trim().is_empty() || is_zero_amount(value)
}

/// Retry budget for one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Maximum reads, including confirming reads
    pub max_attempts: u32,
    /// Pause between reads, in milliseconds
    pub interval_ms: u64,
    /// Identical settled reads required after the first one
    #[serde(default = "default_confirm_reads")]
    pub confirm_reads: u32,
}

const fn default_confirm_reads() -> u32 {
    1
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval_ms: 1000,
            confirm_reads: 1,
        }
    }
}

impl PollPolicy {
    /// Create a policy
    #[must_use]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval_ms: interval.as_millis() as u64,
            confirm_reads: 1,
        }
    }

    /// Set confirming reads
    #[must_use]
    pub const fn with_confirm_reads(mut self, reads: u32) -> Self {
        self.confirm_reads = reads;
        self
    }

    /// Set the interval
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set maximum attempts
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Pause between reads
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Policy for slow tables that rebuild several derived fields
    #[must_use]
    pub const fn slow() -> Self {
        Self {
            max_attempts: 3,
            interval_ms: 5000,
            confirm_reads: 1,
        }
    }

    /// No pauses, used against in-memory drivers
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            max_attempts: 5,
            interval_ms: 0,
            confirm_reads: 1,
        }
    }
}

/// How a poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Settled and confirmed
    Stable,
    /// Budget ran out
    Exhausted,
}

/// Outcome of a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Last value read
    pub value: String,
    /// Reads made
    pub attempts: u32,
    /// How the poll ended
    pub status: SettlementStatus,
    /// Whether the last value is still a "not yet calculated" sentinel
    pub unsettled: bool,
    /// Time spent polling
    #[serde(skip)]
    pub elapsed: Duration,
}

impl Settlement {
    /// Settled and confirmed
    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.status == SettlementStatus::Stable
    }

    /// Budget ran out while the value was still a sentinel
    #[must_use]
    pub fn timed_out_unsettled(&self) -> bool {
        self.status == SettlementStatus::Exhausted && self.unsettled
    }
}

/// Re-reads a derived field until it settles
///
/// ## Example
///
/// ```ignore
/// let settlement = SettlementPoller::new(PollPolicy::default())
///     .with_description("scope1_fuels[0].total")
///     .await_stable(|| driver.read_value(&field))?;
/// ```
pub struct SettlementPoller<U = fn(&str) -> bool>
where
    U: Fn(&str) -> bool,
{
    policy: PollPolicy,
    is_unsettled: U,
    description: Option<String>,
}

impl SettlementPoller {
    /// Poller with the default unsettled predicate
    #[must_use]
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            is_unsettled: is_unsettled_default,
            description: None,
        }
    }
}

impl<U> SettlementPoller<U>
where
    U: Fn(&str) -> bool,
{
    /// Replace the unsettled predicate
    #[must_use]
    pub fn with_predicate<V>(self, is_unsettled: V) -> SettlementPoller<V>
    where
        V: Fn(&str) -> bool,
    {
        SettlementPoller {
            policy: self.policy,
            is_unsettled,
            description: self.description,
        }
    }

    /// Describe what is polled, for logs
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The retry budget
    #[must_use]
    pub const fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Read until the value is settled and confirmed, or the budget runs out.
    ///
    /// # Errors
    ///
    /// Only read errors propagate; exhaustion is reported in the result.
    pub fn await_stable<F>(&self, mut read: F) -> VerifyResult<Settlement>
    where
        F: FnMut() -> VerifyResult<String>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let what = self.description.as_deref().unwrap_or("field");
        let mut attempts = 0;
        let mut candidate: Option<String> = None;
        let mut confirmations = 0;

        loop {
            attempts += 1;
            let value = read()?;
            let unsettled = (self.is_unsettled)(&value);
            trace!(field = what, attempt = attempts, value = %value, unsettled, "poll read");

            if unsettled {
                candidate = None;
                confirmations = 0;
            } else if candidate.as_deref() == Some(value.as_str()) {
                confirmations += 1;
            } else {
                candidate = Some(value.clone());
                confirmations = 0;
            }

            if !unsettled && confirmations >= self.policy.confirm_reads {
                debug!(field = what, attempts, value = %value, "settled");
                return Ok(Settlement {
                    value,
                    attempts,
                    status: SettlementStatus::Stable,
                    unsettled: false,
                    elapsed: start.elapsed(),
                });
            }

            if attempts >= max_attempts {
                debug!(field = what, attempts, value = %value, unsettled, "poll budget exhausted");
                return Ok(Settlement {
                    value,
                    attempts,
                    status: SettlementStatus::Exhausted,
                    unsettled,
                    elapsed: start.elapsed(),
                });
            }

            std::thread::sleep(self.policy.interval());
        }
    }
}

impl<U> Debug for SettlementPoller<U>
where
    U: Fn(&str) -> bool,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementPoller")
            .field("policy", &self.policy)
            .field("description", &self.description)
            .finish()
    }
}

/// Poll with the default predicate
pub fn await_stable<F>(read: F, policy: &PollPolicy) -> VerifyResult<Settlement>
where
    F: FnMut() -> VerifyResult<String>,
{
    SettlementPoller::new(*policy).await_stable(read)
}
