//! nzverify: verified form entry for net-zero reporting UIs
//!
//! Drives multi-tab, multi-table data-entry workflows (emissions, energy,
//! water, waste, carbon offsets) through an abstract [`FormDriver`] and
//! reconciles every UI-side calculation against an independent
//! recomputation: row totals, table totals, scope totals and values that a
//! save re-renders in other tabs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────────┐   ┌────────────┐
//! │ Catalog  │──►│ Sequencer │──►│  Poller  │──►│ Expectation  │──►│ Reconciler │
//! │ (tables) │   │ (writes)  │   │ (reads)  │   │ (arithmetic) │   │            │
//! └──────────┘   └───────────┘   └──────────┘   └──────────────┘   └────────────┘
//!                                                                        │
//!                                                       save ──► retention check
//! ```
//!
//! # Example
//!
//! ```
//! use nzverify::{Catalog, FixtureData, MockDriver, PollPolicy, Scenario, ScenarioRunner, VerifyConfig};
//!
//! let runner = ScenarioRunner::new(Catalog::builtin())
//!     .with_fixture(FixtureData::builtin_factors())
//!     .with_config(VerifyConfig::new().with_default_policy(PollPolicy::immediate()));
//! let scenario = Scenario::new("natural gas")
//!     .with_row("scope1_fuels", &[("fuel", "Natural Gas"), ("consumption", "100")])
//!     .with_section_total("scope1_total");
//!
//! let report = runner.run(&scenario, &mut MockDriver::builtin());
//! assert!(report.passed());
//! assert_eq!(report.rows[0].total.as_deref(), Some("253,925.00"));
//! ```

#![warn(missing_docs)]

mod amount;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod expect;
pub mod fixture;
pub mod poller;
pub mod reconcile;
mod result;
pub mod retention;
mod row;
pub mod scenario;
pub mod sequencer;
pub mod soft;
pub mod suite;

pub use amount::{format_amount, is_zero_amount, normalize_amount, parse_amount, round2};
pub use catalog::{
    Catalog, ColumnKind, ColumnSpec, MirrorSpec, Section, SectionTotalSpec, TableId, TableSpec,
    TotalRule, ValueKind,
};
pub use config::VerifyConfig;
pub use driver::{ClickTarget, ElementState, FormDriver, MockDefects, MockDriver, TotalRef};
pub use expect::{
    expected_row_total, expected_section_total, expected_table_total, Breakdown, Expectation,
    Operand, Operator,
};
pub use fixture::FixtureData;
pub use poller::{await_stable, PollPolicy, Settlement, SettlementPoller, SettlementStatus};
pub use reconcile::{Mismatch, Reconciler, DEFAULT_EPSILON};
pub use result::{VerifyError, VerifyResult};
pub use retention::{retention_pairs, RetentionCheck, RetentionPair};
pub use row::{FieldRef, RowHandle, RowInstance};
pub use scenario::{
    FailureReport, Scenario, ScenarioReport, ScenarioRunner, ScenarioState, TableEntry, TotalCheck,
};
pub use sequencer::EntrySequencer;
pub use soft::{AssertionFailure, AssertionSummary, SoftAssertions, SoftMode};
pub use suite::{Suite, SuiteReport};
