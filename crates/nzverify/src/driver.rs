//! FormDriver - abstract capability set the verification model needs
//!
//! The model never talks to a browser directly. Anything that can locate,
//! read, write and click fields addressed by [`FieldRef`] can drive it: a CDP
//! session, a WebDriver bridge, or the in-memory [`MockDriver`] used by the
//! tests and the CLI's `simulate` command.
//!
//! ```text
//! ┌──────────────┐   fill_row / await_stable / assert_retained   ┌─────────────┐
//! │ ScenarioRunner│ ───────────────────────────────────────────► │ FormDriver  │
//! └──────────────┘                                               └─────────────┘
//!                                                                 │         │
//!                                                       browser binding   MockDriver
//! ```

use crate::amount::{format_amount, parse_amount};
use crate::catalog::{Catalog, ColumnKind, Section, TableId, TableSpec, ValueKind};
use crate::fixture::FixtureData;
use crate::result::{VerifyError, VerifyResult};
use crate::row::{FieldRef, RowHandle, RowInstance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// What the driver observed about a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Rendered in the current view
    pub visible: bool,
    /// Accepts input
    pub editable: bool,
}

impl ElementState {
    /// Visible and editable
    #[must_use]
    pub const fn editable() -> Self {
        Self {
            visible: true,
            editable: true,
        }
    }

    /// Visible but disabled
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            visible: true,
            editable: false,
        }
    }

    /// Not rendered
    #[must_use]
    pub const fn hidden() -> Self {
        Self {
            visible: false,
            editable: false,
        }
    }
}

/// Clickable targets the model needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickTarget {
    /// Switch to a section tab
    Section(Section),
    /// Persist the current record
    Save,
    /// Append a row to a table
    AddRow(TableId),
}

impl fmt::Display for ClickTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section(section) => write!(f, "tab:{section}"),
            Self::Save => f.write_str("save"),
            Self::AddRow(table) => write!(f, "add-row:{table}"),
        }
    }
}

/// Aggregate totals rendered below tables and sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalRef {
    /// Total row of a table
    Table(TableId),
    /// Named rollup such as `scope1_total`
    Section(String),
}

impl fmt::Display for TotalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(table) => write!(f, "{table}.total"),
            Self::Section(id) => f.write_str(id),
        }
    }
}

/// Abstract driver for form automation
///
/// One driver is owned by one scenario at a time; every operation takes
/// `&mut self`.
pub trait FormDriver {
    /// Start an isolated record (project) for a scenario
    fn begin_record(&mut self, record_id: &str) -> VerifyResult<()>;

    /// Locate a field and report its state
    fn locate(&mut self, field: &FieldRef) -> VerifyResult<ElementState>;

    /// Read a field's rendered value
    fn read_value(&mut self, field: &FieldRef) -> VerifyResult<String>;

    /// Type or pick a value
    fn write_value(&mut self, field: &FieldRef, value: &str) -> VerifyResult<()>;

    /// Read an aggregate total in a section
    fn read_total(&mut self, section: Section, total: &TotalRef) -> VerifyResult<String>;

    /// Click a target
    fn click(&mut self, target: &ClickTarget) -> VerifyResult<()>;

    /// Wait until a field is rendered
    fn wait_for_visible(&mut self, field: &FieldRef, timeout: Duration) -> VerifyResult<()>;

    /// Wait for the current view to finish loading
    fn wait_for_load(&mut self, timeout: Duration) -> VerifyResult<()>;
}

/// Defects the mock application can be told to exhibit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockDefects {
    /// Added to every row total of the table
    #[serde(default)]
    pub total_offset: BTreeMap<TableId, f64>,
    /// Added to the rendered value of a section rollup
    #[serde(default)]
    pub section_offset: BTreeMap<String, f64>,
    /// Tables whose auto-populated columns never fill
    #[serde(default)]
    pub stuck_autofill: BTreeSet<TableId>,
    /// Tables whose totals never compute
    #[serde(default)]
    pub stuck_total: BTreeSet<TableId>,
    /// Section rollups that never compute, by id
    #[serde(default)]
    pub stuck_section: BTreeSet<String>,
    /// Entered columns rendered disabled, as `table.column`
    #[serde(default)]
    pub read_only: BTreeSet<String>,
    /// Values shown instead of the stored fact in mirror views, keyed
    /// `table.column`
    #[serde(default)]
    pub retention_drift: BTreeMap<String, String>,
}

impl MockDefects {
    /// No defects
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Row totals of `table` are off by `offset`
    #[must_use]
    pub fn with_total_offset(mut self, table: &str, offset: f64) -> Self {
        let _ = self.total_offset.insert(table.into(), offset);
        self
    }

    /// A section rollup is off by `offset`
    #[must_use]
    pub fn with_section_offset(mut self, id: &str, offset: f64) -> Self {
        let _ = self.section_offset.insert(id.to_string(), offset);
        self
    }

    /// Auto-population of `table` never happens
    #[must_use]
    pub fn with_stuck_autofill(mut self, table: &str) -> Self {
        let _ = self.stuck_autofill.insert(table.into());
        self
    }

    /// Totals of `table` never compute
    #[must_use]
    pub fn with_stuck_total(mut self, table: &str) -> Self {
        let _ = self.stuck_total.insert(table.into());
        self
    }

    /// A section rollup never computes
    #[must_use]
    pub fn with_stuck_section(mut self, id: &str) -> Self {
        let _ = self.stuck_section.insert(id.to_string());
        self
    }

    /// An entered column is rendered disabled
    #[must_use]
    pub fn with_read_only(mut self, table: &str, column: &str) -> Self {
        let _ = self.read_only.insert(format!("{table}.{column}"));
        self
    }

    /// A mirror view shows `value` instead of the stored fact
    #[must_use]
    pub fn with_retention_drift(mut self, table: &str, column: &str, value: &str) -> Self {
        let _ = self
            .retention_drift
            .insert(format!("{table}.{column}"), value.to_string());
        self
    }
}

type CellKey = (TableId, usize, String);

/// In-memory simulation of the application, for unit testing
///
/// Stores each fact once and renders it in the table's own section and in
/// every mirror section. Writing a trigger column looks up reference values
/// for the auto-populated columns; derived values only become visible after
/// `settle_reads` reads of the row, imitating asynchronous recalculation.
/// Table totals and the rollups over a written table lag the same number of
/// reads, counted per total.
#[derive(Debug)]
pub struct MockDriver {
    catalog: Catalog,
    reference: FixtureData,
    defects: MockDefects,
    settle_reads: u32,
    current: Option<Section>,
    record: Option<String>,
    saved: bool,
    cells: BTreeMap<CellKey, String>,
    rows: BTreeMap<TableId, usize>,
    latency: BTreeMap<RowHandle, u32>,
    total_latency: BTreeMap<String, u32>,
    /// Call history for verification
    pub call_history: Vec<String>,
}

impl MockDriver {
    /// Simulate `catalog`, auto-populating from `reference`
    #[must_use]
    pub fn new(catalog: Catalog, reference: FixtureData) -> Self {
        Self {
            catalog,
            reference,
            defects: MockDefects::default(),
            settle_reads: 0,
            current: None,
            record: None,
            saved: false,
            cells: BTreeMap::new(),
            rows: BTreeMap::new(),
            latency: BTreeMap::new(),
            total_latency: BTreeMap::new(),
            call_history: Vec::new(),
        }
    }

    /// Built-in catalog and reference factors
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(Catalog::builtin(), FixtureData::builtin_factors())
    }

    /// Number of reads a row's derived values stay stale after a write
    #[must_use]
    pub const fn with_settle_reads(mut self, reads: u32) -> Self {
        self.settle_reads = reads;
        self
    }

    /// Inject defects
    #[must_use]
    pub fn with_defects(mut self, defects: MockDefects) -> Self {
        self.defects = defects;
        self
    }

    /// Whether the record has been saved
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        self.saved
    }

    /// Current record id
    #[must_use]
    pub fn record(&self) -> Option<&str> {
        self.record.as_deref()
    }

    /// Current section
    #[must_use]
    pub const fn current_section(&self) -> Option<Section> {
        self.current
    }

    /// Check if a call was made
    #[must_use]
    pub fn was_called(&self, call: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(call))
    }

    /// Stored fact, independent of any view
    #[must_use]
    pub fn stored(&self, handle: &RowHandle, column: &str) -> Option<&str> {
        self.cells
            .get(&(handle.table.clone(), handle.row, column.to_string()))
            .map(String::as_str)
    }

    fn require_record(&self) -> VerifyResult<()> {
        if self.record.is_none() {
            return Err(VerifyError::driver("no record open"));
        }
        Ok(())
    }

    fn require_current(&self, section: Section) -> VerifyResult<()> {
        if self.current == Some(section) {
            Ok(())
        } else {
            Err(VerifyError::driver(format!(
                "{section} tab is not open (current: {})",
                self.current.map_or("none", Section::label)
            )))
        }
    }

    /// Spec of the table and whether the field is shown in its section
    fn resolve(&self, field: &FieldRef) -> VerifyResult<(&TableSpec, bool)> {
        let spec = self.catalog.get_spec(field.handle.table.as_str())?;
        let _ = spec.require_column(&field.column)?;
        if spec.section == field.section {
            return Ok((spec, true));
        }
        let mirrored = self
            .catalog
            .mirrors_of(&spec.id)
            .any(|m| m.to == field.section && m.columns.contains(&field.column));
        if mirrored {
            Ok((spec, false))
        } else {
            Err(VerifyError::driver(format!("{field} is not rendered")))
        }
    }

    fn row_count(&self, table: &TableId) -> usize {
        self.rows.get(table).copied().unwrap_or(1)
    }

    fn require_row(&self, handle: &RowHandle) -> VerifyResult<()> {
        if handle.row < self.row_count(&handle.table) {
            Ok(())
        } else {
            Err(VerifyError::driver(format!("row {handle} does not exist")))
        }
    }

    /// Consume one stale read; true while the row is still recalculating
    fn tick_latency(&mut self, handle: &RowHandle) -> bool {
        match self.latency.get_mut(handle) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn tick_total_latency(&mut self, total: &TotalRef) -> bool {
        match self.total_latency.get_mut(&total.to_string()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Restart recalculation of a table's total and every rollup over it
    fn invalidate_totals(&mut self, table: &TableId) {
        let mut stale = vec![TotalRef::Table(table.clone()).to_string()];
        stale.extend(
            self.catalog
                .section_totals()
                .iter()
                .filter(|r| r.tables.contains(table))
                .map(|r| r.id.clone()),
        );
        for key in stale {
            let _ = self.total_latency.insert(key, self.settle_reads);
        }
    }

    fn row_total(&self, spec: &TableSpec, row: usize) -> Option<f64> {
        if self.defects.stuck_total.contains(&spec.id) {
            return None;
        }
        let mut instance = RowInstance::new(RowHandle::new(spec.id.clone(), row));
        for column in &spec.total_rule.operands {
            let value = self.cells.get(&(spec.id.clone(), row, column.clone()))?;
            instance.set(column.as_str(), value.as_str());
        }
        let offset = self.defects.total_offset.get(&spec.id).copied().unwrap_or(0.0);
        spec.total_rule
            .apply(&instance)
            .ok()
            .map(|exp| exp.value + offset)
    }

    fn table_total(&self, spec: &TableSpec) -> f64 {
        (0..self.row_count(&spec.id))
            .filter_map(|row| self.row_total(spec, row))
            .sum()
    }

    fn autofill(&mut self, spec: &TableSpec, row: usize, selection: &str) {
        if self.defects.stuck_autofill.contains(&spec.id) {
            return;
        }
        for column in spec.auto_columns() {
            if let Some(value) = self.reference.autofill(&spec.id, &column.name, selection) {
                let _ = self
                    .cells
                    .insert((spec.id.clone(), row, column.name.clone()), value.to_string());
            }
        }
    }
}

impl FormDriver for MockDriver {
    fn begin_record(&mut self, record_id: &str) -> VerifyResult<()> {
        self.call_history.push(format!("begin_record:{record_id}"));
        self.record = Some(record_id.to_string());
        self.saved = false;
        self.current = None;
        self.cells.clear();
        self.rows.clear();
        self.latency.clear();
        self.total_latency.clear();
        Ok(())
    }

    fn locate(&mut self, field: &FieldRef) -> VerifyResult<ElementState> {
        self.call_history.push(format!("locate:{field}"));
        self.require_record()?;
        let (spec, own_section) = self.resolve(field)?;
        if self.current != Some(field.section) || field.handle.row >= self.row_count(&spec.id) {
            return Ok(ElementState::hidden());
        }
        let column = spec.require_column(&field.column)?;
        let disabled = self
            .defects
            .read_only
            .contains(&format!("{}.{}", spec.id, column.name));
        let editable = own_section
            && !disabled
            && matches!(
                column.kind,
                ColumnKind::Entered | ColumnKind::Selected | ColumnKind::AutoPopulated
            );
        Ok(ElementState {
            visible: true,
            editable,
        })
    }

    fn read_value(&mut self, field: &FieldRef) -> VerifyResult<String> {
        self.call_history.push(format!("read:{field}"));
        self.require_record()?;
        self.require_current(field.section)?;
        self.require_row(&field.handle)?;
        let (spec, own_section) = self.resolve(field)?;
        let kind = spec.require_column(&field.column)?.kind;
        let key = (spec.id.clone(), field.handle.row, field.column.clone());

        if !own_section {
            let drift_key = format!("{}.{}", spec.id, field.column);
            if let Some(drift) = self.defects.retention_drift.get(&drift_key) {
                return Ok(drift.clone());
            }
            return Ok(self.cells.get(&key).cloned().unwrap_or_default());
        }

        match kind {
            ColumnKind::Entered | ColumnKind::Selected => {
                Ok(self.cells.get(&key).cloned().unwrap_or_default())
            }
            ColumnKind::AutoPopulated => {
                let value = self.cells.get(&key).cloned().unwrap_or_default();
                if self.tick_latency(&field.handle) {
                    return Ok(String::new());
                }
                Ok(value)
            }
            ColumnKind::Computed => {
                let spec = spec.clone();
                if self.tick_latency(&field.handle) {
                    return Ok(format_amount(0.0));
                }
                Ok(format_amount(
                    self.row_total(&spec, field.handle.row).unwrap_or(0.0),
                ))
            }
        }
    }

    fn write_value(&mut self, field: &FieldRef, value: &str) -> VerifyResult<()> {
        self.call_history.push(format!("write:{field}={value}"));
        self.require_record()?;
        self.require_current(field.section)?;
        self.require_row(&field.handle)?;
        let (spec, own_section) = self.resolve(field)?;
        if !own_section {
            return Err(VerifyError::driver(format!("{field} is display-only")));
        }
        let spec = spec.clone();
        let column = spec.require_column(&field.column)?.clone();
        if column.kind == ColumnKind::Computed {
            return Err(VerifyError::driver(format!("{field} is computed")));
        }
        if column.value == ValueKind::Numeric {
            let _ = parse_amount(value)
                .map_err(|_| VerifyError::driver(format!("{field} rejected '{value}'")))?;
        }

        let row = field.handle.row;
        let _ = self
            .cells
            .insert((spec.id.clone(), row, column.name.clone()), value.to_string());
        if column.triggers_autofill {
            self.autofill(&spec, row, value);
        }
        self.saved = false;
        let _ = self.latency.insert(field.handle.clone(), self.settle_reads);
        self.invalidate_totals(&spec.id);
        Ok(())
    }

    fn read_total(&mut self, section: Section, total: &TotalRef) -> VerifyResult<String> {
        self.call_history.push(format!("read_total:{total}"));
        self.require_record()?;
        self.require_current(section)?;
        let value = match total {
            TotalRef::Table(table) => {
                let spec = self.catalog.get_spec(table.as_str())?;
                if spec.section != section {
                    return Err(VerifyError::driver(format!("{total} is not rendered in {section}")));
                }
                self.table_total(spec)
            }
            TotalRef::Section(id) => {
                let rollup = self.catalog.section_total(id)?;
                if rollup.section != section {
                    return Err(VerifyError::driver(format!("{total} is not rendered in {section}")));
                }
                if self.defects.stuck_section.contains(id) {
                    return Ok(format_amount(0.0));
                }
                let mut sum = 0.0;
                for table in &rollup.tables {
                    sum += self.table_total(self.catalog.get_spec(table.as_str())?);
                }
                sum + self.defects.section_offset.get(id).copied().unwrap_or(0.0)
            }
        };
        if self.tick_total_latency(total) {
            return Ok(format_amount(0.0));
        }
        Ok(format_amount(value))
    }

    fn click(&mut self, target: &ClickTarget) -> VerifyResult<()> {
        self.call_history.push(format!("click:{target}"));
        self.require_record()?;
        match target {
            ClickTarget::Section(section) => self.current = Some(*section),
            ClickTarget::Save => self.saved = true,
            ClickTarget::AddRow(table) => {
                let spec = self.catalog.get_spec(table.as_str())?;
                self.require_current(spec.section)?;
                let count = self.row_count(table) + 1;
                let _ = self.rows.insert(table.clone(), count);
            }
        }
        Ok(())
    }

    fn wait_for_visible(&mut self, field: &FieldRef, timeout: Duration) -> VerifyResult<()> {
        if self.locate(field)?.visible {
            Ok(())
        } else {
            Err(VerifyError::driver(format!(
                "{field} not visible after {}ms",
                timeout.as_millis()
            )))
        }
    }

    fn wait_for_load(&mut self, _timeout: Duration) -> VerifyResult<()> {
        self.call_history.push("wait_for_load".to_string());
        Ok(())
    }
}
