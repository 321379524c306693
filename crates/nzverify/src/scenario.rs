//! Scenarios and the runner that drives them
//!
//! A [`Scenario`] is plain data: rows to enter per table, rollups to check,
//! and whether mirrored values are re-read after saving. [`ScenarioRunner`]
//! walks it through a fixed state machine and stops at the first error:
//!
//! ```text
//! NotStarted → Entering → Settling → VerifiedLocal → Saved → VerifiedCrossSection → Done
//!                 └───────────┴────────────┴───────────┴──────────────┴──────────→ Failed
//! ```
//!
//! Every run opens its own record on the driver, so scenarios never share
//! in-progress form state.

use crate::amount::{format_amount, parse_amount};
use crate::catalog::{Catalog, Section, TableId, TableSpec, ValueKind};
use crate::config::VerifyConfig;
use crate::driver::{ClickTarget, FormDriver, TotalRef};
use crate::expect::{expected_row_total, expected_section_total, expected_table_total, Expectation};
use crate::fixture::FixtureData;
use crate::poller::{is_unsettled_default, SettlementPoller};
use crate::reconcile::{Mismatch, Reconciler};
use crate::result::{VerifyError, VerifyResult};
use crate::retention::{mirror_sections, retention_pairs, RetentionCheck};
use crate::row::{FieldRef, RowHandle, RowInstance};
use crate::sequencer::EntrySequencer;
use crate::soft::{AssertionFailure, AssertionSummary, SoftAssertions};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Rows to enter into one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Target table
    pub table: TableId,
    /// One column → value map per row
    #[serde(deserialize_with = "rows_as_text")]
    pub rows: Vec<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Cell {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

// YAML users write `consumption: 100`; values are kept as typed text
fn rows_as_text<'de, D>(deserializer: D) -> Result<Vec<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<BTreeMap<String, Cell>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|row| row.into_iter().map(|(k, v)| (k, v.into_text())).collect())
        .collect())
}

const fn yes() -> bool {
    true
}

/// A data-entry workflow to verify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tables and rows, entered in order
    #[serde(default)]
    pub entries: Vec<TableEntry>,
    /// Rollups to verify, by id
    #[serde(default)]
    pub section_totals: Vec<String>,
    /// Re-read mirrored values after saving
    #[serde(default = "yes")]
    pub check_retention: bool,
}

impl Scenario {
    /// Create an empty scenario
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            entries: Vec::new(),
            section_totals: Vec::new(),
            check_retention: true,
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a row to a table, creating the entry on first use
    #[must_use]
    pub fn with_row(mut self, table: &str, values: &[(&str, &str)]) -> Self {
        let row = values
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.table.as_str() == table) {
            entry.rows.push(row);
        } else {
            self.entries.push(TableEntry {
                table: table.into(),
                rows: vec![row],
            });
        }
        self
    }

    /// Verify a rollup
    #[must_use]
    pub fn with_section_total(mut self, id: impl Into<String>) -> Self {
        self.section_totals.push(id.into());
        self
    }

    /// Skip the cross-section checks
    #[must_use]
    pub const fn without_retention(mut self) -> Self {
        self.check_retention = false;
        self
    }

    /// Parse a YAML scenario
    pub fn from_yaml_str(yaml: &str) -> VerifyResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML scenario file
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Number of rows across all tables
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.entries.iter().map(|e| e.rows.len()).sum()
    }
}

/// Where a scenario run is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    /// Not started
    NotStarted,
    /// Writing rows
    Entering,
    /// Polling and reconciling row and table totals
    Settling,
    /// Local totals and rollups verified
    VerifiedLocal,
    /// Record saved
    Saved,
    /// Mirrored values verified
    VerifiedCrossSection,
    /// Finished successfully
    Done,
    /// Stopped at an error
    Failed,
}

impl ScenarioState {
    /// Whether the run has ended
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The only successful successor
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Entering),
            Self::Entering => Some(Self::Settling),
            Self::Settling => Some(Self::VerifiedLocal),
            Self::VerifiedLocal => Some(Self::Saved),
            Self::Saved => Some(Self::VerifiedCrossSection),
            Self::VerifiedCrossSection => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Whether `to` may follow this state
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not_started",
            Self::Entering => "entering",
            Self::Settling => "settling",
            Self::VerifiedLocal => "verified_local",
            Self::Saved => "saved",
            Self::VerifiedCrossSection => "verified_cross_section",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A verified total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalCheck {
    /// Field or rollup
    pub label: String,
    /// Expected rendering
    pub expected: String,
    /// Observed rendering
    pub observed: String,
    /// How the expectation was computed
    pub breakdown: String,
}

impl TotalCheck {
    fn new(label: impl Into<String>, expectation: &Expectation, observed: &str) -> Self {
        Self {
            label: label.into(),
            expected: expectation.formatted(),
            observed: observed.to_string(),
            breakdown: expectation.breakdown.to_string(),
        }
    }
}

/// Structured account of the error that stopped a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// What the runner was doing
    pub step: String,
    /// Stable error kind, e.g. `reconciliation_mismatch`
    pub kind: String,
    /// Rendered error
    pub message: String,
    /// Comparison diagnostics, for reconciliation mismatches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<Mismatch>,
    /// Last value read, for settlement timeouts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<String>,
}

impl FailureReport {
    fn new(step: &str, error: &VerifyError) -> Self {
        let mismatch = match error {
            VerifyError::ReconciliationMismatch(m) => Some(m.as_ref().clone()),
            _ => None,
        };
        let last_observed = match error {
            VerifyError::SettlementTimeout { last_observed, .. } => Some(last_observed.clone()),
            VerifyError::RetentionMismatch { observed, .. } => Some(observed.clone()),
            _ => None,
        };
        Self {
            step: step.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            mismatch,
            last_observed,
        }
    }
}

/// Outcome of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: String,
    /// Record opened for the run
    pub record_id: String,
    /// Final state
    pub state: ScenarioState,
    /// States visited, in order
    pub transitions: Vec<ScenarioState>,
    /// Rows as entered and observed
    pub rows: Vec<RowInstance>,
    /// Totals verified
    pub totals: Vec<TotalCheck>,
    /// Mirrored values verified
    pub retained: usize,
    /// Auto-populated fields that needed a fallback write
    pub fallbacks: Vec<String>,
    /// Soft checks run against reference values
    pub soft_checks: AssertionSummary,
    /// Soft diagnostics
    pub soft_failures: Vec<AssertionFailure>,
    /// What stopped the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// Whether the scenario reached `Done`
    #[must_use]
    pub fn passed(&self) -> bool {
        self.state == ScenarioState::Done
    }

    /// Pretty JSON
    pub fn to_json(&self) -> VerifyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// In-flight bookkeeping of one run
#[derive(Debug)]
struct Run {
    scenario: String,
    state: ScenarioState,
    transitions: Vec<ScenarioState>,
    step: String,
    rows: Vec<RowInstance>,
    totals: Vec<TotalCheck>,
    retained: usize,
    fallbacks: Vec<String>,
    soft: SoftAssertions,
}

impl Run {
    fn advance(&mut self, to: ScenarioState) -> VerifyResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(VerifyError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        info!(scenario = %self.scenario, from = %self.state, to = %to, "scenario transition");
        self.state = to;
        self.transitions.push(to);
        Ok(())
    }

    fn tables(&self) -> Vec<TableId> {
        let mut tables: Vec<TableId> = Vec::new();
        for row in &self.rows {
            if !tables.contains(&row.handle.table) {
                tables.push(row.handle.table.clone());
            }
        }
        tables
    }

    fn rows_of(&self, table: &TableId) -> Vec<RowInstance> {
        self.rows
            .iter()
            .filter(|r| &r.handle.table == table)
            .cloned()
            .collect()
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Drives scenarios through a [`FormDriver`]
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    catalog: Catalog,
    fixture: FixtureData,
    config: VerifyConfig,
}

impl ScenarioRunner {
    /// Runner over a catalog, with no fixture data and default configuration
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            fixture: FixtureData::new(),
            config: VerifyConfig::default(),
        }
    }

    /// Reference values and fallbacks
    #[must_use]
    pub fn with_fixture(mut self, fixture: FixtureData) -> Self {
        self.fixture = fixture;
        self
    }

    /// Configuration
    #[must_use]
    pub fn with_config(mut self, config: VerifyConfig) -> Self {
        self.config = config;
        self
    }

    /// The catalog
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run a scenario to `Done` or `Failed`
    pub fn run(&self, scenario: &Scenario, driver: &mut dyn FormDriver) -> ScenarioReport {
        let start = Instant::now();
        let record_id = Uuid::new_v4().to_string();
        let mut run = Run {
            scenario: scenario.name.clone(),
            state: ScenarioState::NotStarted,
            transitions: vec![ScenarioState::NotStarted],
            step: "begin record".to_string(),
            rows: Vec::new(),
            totals: Vec::new(),
            retained: 0,
            fallbacks: Vec::new(),
            soft: SoftAssertions::with_mode(self.config.soft_mode),
        };

        let outcome = self.execute(scenario, driver, &record_id, &mut run);
        let failure = match outcome {
            Ok(()) => None,
            Err(error) => {
                warn!(scenario = %scenario.name, step = %run.step, error = %error, "scenario failed");
                let report = FailureReport::new(&run.step, &error);
                // Failed is reachable from every non-terminal state
                let _ = run.advance(ScenarioState::Failed);
                Some(report)
            }
        };

        ScenarioReport {
            scenario: scenario.name.clone(),
            record_id,
            state: run.state,
            transitions: run.transitions,
            rows: run.rows,
            totals: run.totals,
            retained: run.retained,
            fallbacks: run.fallbacks,
            soft_checks: run.soft.summary(),
            soft_failures: run.soft.into_failures(),
            failure,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn execute(
        &self,
        scenario: &Scenario,
        driver: &mut dyn FormDriver,
        record_id: &str,
        run: &mut Run,
    ) -> VerifyResult<()> {
        driver.begin_record(record_id)?;
        run.advance(ScenarioState::Entering)?;
        self.enter_rows(scenario, driver, run)?;

        run.advance(ScenarioState::Settling)?;
        self.settle_totals(driver, run)?;
        self.verify_section_totals(scenario, driver, run)?;
        run.advance(ScenarioState::VerifiedLocal)?;

        run.step = "save".to_string();
        driver.click(&ClickTarget::Save)?;
        driver.wait_for_load(self.config.load_timeout())?;
        run.advance(ScenarioState::Saved)?;

        if scenario.check_retention {
            self.verify_retention(driver, run)?;
        }
        run.advance(ScenarioState::VerifiedCrossSection)?;

        run.step = "soft assertions".to_string();
        run.soft.verify()?;
        run.advance(ScenarioState::Done)
    }

    fn open_section(&self, driver: &mut dyn FormDriver, section: Section) -> VerifyResult<()> {
        driver.click(&ClickTarget::Section(section))?;
        driver.wait_for_load(self.config.load_timeout())
    }

    fn enter_rows(
        &self,
        scenario: &Scenario,
        driver: &mut dyn FormDriver,
        run: &mut Run,
    ) -> VerifyResult<()> {
        let sequencer =
            EntrySequencer::new(&self.catalog).with_visibility_timeout(self.config.visibility_timeout());
        for entry in &scenario.entries {
            let spec = self.catalog.get_spec(entry.table.as_str())?;
            run.step = format!("open {}", spec.section);
            self.open_section(driver, spec.section)?;
            for values in &entry.rows {
                let index = run.rows.iter().filter(|r| r.handle.table == spec.id).count();
                let handle = RowHandle::new(spec.id.clone(), index);
                run.step = format!("enter {handle}");
                if index > 0 {
                    driver.click(&ClickTarget::AddRow(spec.id.clone()))?;
                }
                let mut row = sequencer.fill_row(driver, &handle, values)?;
                self.settle_autofill(&sequencer, driver, spec, &mut row, run)?;
                run.rows.push(row);
            }
        }
        Ok(())
    }

    /// Wait for every auto-populated column of a freshly entered row,
    /// writing the reference value when one never fills.
    fn settle_autofill(
        &self,
        sequencer: &EntrySequencer<'_>,
        driver: &mut dyn FormDriver,
        spec: &TableSpec,
        row: &mut RowInstance,
        run: &mut Run,
    ) -> VerifyResult<()> {
        let selection = spec
            .trigger_column()
            .and_then(|t| row.get(&t.name))
            .map(str::to_string);
        let policy = self.config.policy_for(&spec.id);

        for column in spec.auto_columns() {
            let field = FieldRef::new(spec.section, row.handle.clone(), column.name.as_str());
            run.step = format!("settle {field}");
            let predicate: fn(&str) -> bool = match column.value {
                ValueKind::Numeric => is_unsettled_default,
                ValueKind::Text => is_blank,
            };
            let settlement = SettlementPoller::new(policy)
                .with_predicate(predicate)
                .with_description(field.to_string())
                .await_stable(|| driver.read_value(&field))?;

            let reference = selection
                .as_deref()
                .and_then(|s| self.fixture.autofill(&spec.id, &column.name, s));

            if settlement.timed_out_unsettled() {
                let Some(fallback) = reference.or(column.fallback.as_deref()) else {
                    return Err(VerifyError::SettlementTimeout {
                        field: field.to_string(),
                        last_observed: settlement.value,
                        attempts: settlement.attempts,
                    });
                };
                warn!(field = %field, fallback, "auto-population did not happen, writing fallback");
                sequencer.write_fallback(driver, &field, fallback)?;
                row.set(column.name.as_str(), fallback);
                run.fallbacks.push(field.to_string());
                continue;
            }

            let location = field.to_string();
            match (reference, column.value) {
                (Some(expected), ValueKind::Text) => {
                    run.soft.assert_text_eq(&location, expected, &settlement.value);
                }
                (Some(expected), ValueKind::Numeric) => {
                    match (parse_amount(expected), parse_amount(&settlement.value)) {
                        (Ok(e), Ok(o)) => run.soft.assert_approx_eq(&location, e, o, self.config.epsilon),
                        _ => run.soft.fail(
                            &location,
                            format!("'{}' is not comparable with reference '{expected}'", settlement.value),
                        ),
                    }
                }
                (None, _) => {}
            }
            row.set(column.name.as_str(), settlement.value);
        }
        Ok(())
    }

    fn settle_totals(&self, driver: &mut dyn FormDriver, run: &mut Run) -> VerifyResult<()> {
        let reconciler = Reconciler::new(self.config.epsilon);
        for table in run.tables() {
            let spec = self.catalog.get_spec(table.as_str())?;
            let total_column = spec.total_column()?.name.clone();
            let policy = self.config.policy_for(&spec.id);
            run.step = format!("open {}", spec.section);
            self.open_section(driver, spec.section)?;

            for row in run.rows.iter_mut().filter(|r| r.handle.table == spec.id) {
                let field = FieldRef::new(spec.section, row.handle.clone(), total_column.as_str());
                let label = field.to_string();
                run.step = format!("settle {label}");
                let settlement = SettlementPoller::new(policy)
                    .with_description(label.as_str())
                    .await_stable(|| driver.read_value(&field))?;
                let expectation = expected_row_total(&self.catalog, row)?;
                if !settlement.timed_out_unsettled() {
                    run.step = format!("reconcile {label}");
                }
                reconciler.reconcile_settlement(&label, &expectation, &settlement)?;
                run.totals.push(TotalCheck::new(label, &expectation, &settlement.value));
                row.set_total(settlement.value);
            }

            let total = TotalRef::Table(spec.id.clone());
            let label = total.to_string();
            let expectation = expected_table_total(&self.catalog, &run.rows_of(&spec.id))?;
            run.step = format!("settle {label}");
            let settlement = SettlementPoller::new(policy)
                .with_description(label.as_str())
                .await_stable(|| driver.read_total(spec.section, &total))?;
            if !settlement.timed_out_unsettled() {
                run.step = format!("reconcile {label}");
            }
            reconciler.reconcile_settlement(&label, &expectation, &settlement)?;
            run.totals.push(TotalCheck::new(label, &expectation, &settlement.value));
        }
        Ok(())
    }

    fn verify_section_totals(
        &self,
        scenario: &Scenario,
        driver: &mut dyn FormDriver,
        run: &mut Run,
    ) -> VerifyResult<()> {
        let reconciler = Reconciler::new(self.config.epsilon);
        for id in &scenario.section_totals {
            run.step = format!("settle {id}");
            let rollup = self.catalog.section_total(id)?;
            let mut table_totals = Vec::with_capacity(rollup.tables.len());
            for table in &rollup.tables {
                let expectation = expected_table_total(&self.catalog, &run.rows_of(table))?;
                table_totals.push((table.as_str(), expectation.value));
            }
            let expectation = expected_section_total(table_totals);
            self.open_section(driver, rollup.section)?;
            let total = TotalRef::Section(id.clone());
            let settlement = SettlementPoller::new(self.config.policy_for_tables(&rollup.tables))
                .with_description(id.as_str())
                .await_stable(|| driver.read_total(rollup.section, &total))?;
            if !settlement.timed_out_unsettled() {
                run.step = format!("reconcile {id}");
            }
            reconciler.reconcile_settlement(&rollup.label, &expectation, &settlement)?;
            info!(rollup = %rollup.label, value = %format_amount(expectation.value), "rollup verified");
            run.totals.push(TotalCheck::new(rollup.label.as_str(), &expectation, &settlement.value));
        }
        Ok(())
    }

    fn verify_retention(&self, driver: &mut dyn FormDriver, run: &mut Run) -> VerifyResult<()> {
        let check = RetentionCheck::new(self.config.epsilon, self.config.visibility_timeout());
        let pairs = retention_pairs(&self.catalog, &run.rows);
        for section in mirror_sections(&pairs) {
            run.step = format!("open {section}");
            self.open_section(driver, section)?;
            for pair in pairs.iter().filter(|p| p.mirror.section == section) {
                run.step = format!("retain {}", pair.mirror);
                check.assert_retained(driver, pair)?;
                run.retained += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDefects, MockDriver};
    use crate::poller::PollPolicy;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(Catalog::builtin())
            .with_fixture(FixtureData::builtin_factors())
            .with_config(VerifyConfig::new().with_default_policy(PollPolicy::immediate()))
    }

    fn natural_gas() -> Scenario {
        Scenario::new("natural gas")
            .with_row("scope1_fuels", &[("fuel", "Natural Gas"), ("consumption", "100")])
            .with_section_total("scope1_total")
    }

    mod states {
        use super::*;

        #[test]
        fn test_linear_successors() {
            let mut state = ScenarioState::NotStarted;
            let mut visited = 0;
            while let Some(next) = state.next() {
                assert!(state.can_transition_to(next));
                state = next;
                visited += 1;
            }
            assert_eq!(state, ScenarioState::Done);
            assert_eq!(visited, 6);
        }

        #[test]
        fn test_no_skipping_or_leaving_terminal() {
            assert!(!ScenarioState::Entering.can_transition_to(ScenarioState::Saved));
            assert!(ScenarioState::Saved.can_transition_to(ScenarioState::Failed));
            assert!(!ScenarioState::Done.can_transition_to(ScenarioState::Failed));
            assert!(!ScenarioState::Failed.can_transition_to(ScenarioState::Entering));
        }
    }

    mod scenarios {
        use super::*;

        #[test]
        fn test_yaml_accepts_numbers() {
            let yaml = r"
name: gas
entries:
  - table: scope1_fuels
    rows:
      - { fuel: Natural Gas, consumption: 100 }
      - { fuel: Diesel, consumption: 2.5 }
section_totals: [scope1_total]
";
            let scenario = Scenario::from_yaml_str(yaml).unwrap();
            assert_eq!(scenario.entries[0].rows[0]["consumption"], "100");
            assert_eq!(scenario.entries[0].rows[1]["consumption"], "2.5");
            assert!(scenario.check_retention);
            assert_eq!(scenario.row_count(), 2);
        }

        #[test]
        fn test_builder_groups_rows_by_table() {
            let scenario = natural_gas()
                .with_row("scope1_fuels", &[("fuel", "Diesel"), ("consumption", "1")])
                .without_retention();
            assert_eq!(scenario.entries.len(), 1);
            assert_eq!(scenario.entries[0].rows.len(), 2);
            assert!(!scenario.check_retention);
        }
    }

    mod runs {
        use super::*;

        #[test]
        fn test_happy_path_reaches_done() {
            let mut driver = MockDriver::builtin().with_settle_reads(2);
            let report = runner().run(&natural_gas(), &mut driver);
            assert!(report.passed(), "{:?}", report.failure);
            assert_eq!(report.transitions.len(), 7);
            assert_eq!(report.rows[0].total.as_deref(), Some("253,925.00"));
            assert_eq!(report.retained, 3);
            assert!(report.soft_failures.is_empty());
            // unit and factor of the one row
            assert_eq!(report.soft_checks.total, 2);
            assert_eq!(report.soft_checks.passed, 2);
            assert!(driver.is_saved());
            assert_eq!(driver.record(), Some(report.record_id.as_str()));
        }

        #[test]
        fn test_wrong_total_fails_with_breakdown() {
            let defects = MockDefects::new().with_total_offset("scope1_fuels", 5.0);
            let mut driver = MockDriver::builtin().with_defects(defects);
            let report = runner().run(&natural_gas(), &mut driver);
            assert_eq!(report.state, ScenarioState::Failed);
            let failure = report.failure.unwrap();
            assert_eq!(failure.kind, "reconciliation_mismatch");
            assert_eq!(failure.step, "reconcile Emissions/scope1_fuels[0].total");
            let mismatch = failure.mismatch.unwrap();
            assert_eq!(mismatch.expected, "253,925.00");
            assert_eq!(mismatch.observed, "253,930.00");
            assert!(!driver.is_saved());
        }

        #[test]
        fn test_failed_run_records_transition() {
            let defects = MockDefects::new().with_stuck_total("scope1_fuels");
            let mut driver = MockDriver::builtin().with_defects(defects);
            let report = runner().run(&natural_gas(), &mut driver);
            assert_eq!(
                report.transitions,
                [
                    ScenarioState::NotStarted,
                    ScenarioState::Entering,
                    ScenarioState::Settling,
                    ScenarioState::Failed
                ]
            );
            assert_eq!(report.failure.unwrap().last_observed.as_deref(), Some("0.00"));
        }

        #[test]
        fn test_report_json() {
            let mut driver = MockDriver::builtin();
            let json = runner().run(&natural_gas(), &mut driver).to_json().unwrap();
            assert!(json.contains("\"state\": \"done\""));
            assert!(json.contains("factor 2539.25 × consumption 100"));
        }
    }
}
