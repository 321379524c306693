//! Field Catalog
//!
//! Single source of truth for every data-entry table: its columns, which of
//! them are typed, picked, auto-populated or computed, and the rule that
//! derives the row total. Table-specific behaviour lives here as data, so the
//! sequencer and the expectation calculator stay generic.
//!
//! The built-in catalog mirrors the certification platform's emissions,
//! energy, water, waste and offsets workflows. Alternative catalogs can be
//! loaded from YAML and are validated on load.

use crate::amount::{parse_amount, round2};
use crate::expect::{Breakdown, Expectation, Operand};
use crate::result::{VerifyError, VerifyResult};
use crate::row::RowInstance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Stable identifier of a logical table (e.g. `scope1_fuels`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(String);

impl TableId {
    /// Create a table id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TableId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Workflow section (tab) of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Detailed emissions entry, scopes 1-3
    Emissions,
    /// Rolled-up energy view
    Energy,
    /// Water consumption
    Water,
    /// Waste disposal view
    Waste,
    /// Carbon offsets
    Offsets,
}

impl Section {
    /// Tab label as rendered by the application
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Emissions => "Emissions",
            Self::Energy => "Energy",
            Self::Water => "Water",
            Self::Waste => "Waste",
            Self::Offsets => "Offsets",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a column gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Typed by the user
    Entered,
    /// Filled by the application after a trigger column changes
    AutoPopulated,
    /// Derived by the application (the row total)
    Computed,
    /// Picked by the user from a list
    Selected,
}

impl ColumnKind {
    /// Whether the model may write this column through normal entry
    #[must_use]
    pub const fn is_enterable(self) -> bool {
        matches!(self, Self::Entered | Self::Selected)
    }
}

/// Representation of a column's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Amount, compared with an epsilon
    #[default]
    Numeric,
    /// Free text, compared exactly
    Text,
}

/// One column within a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// How the column gets its value
    pub kind: ColumnKind,
    /// Value representation
    #[serde(default)]
    pub value: ValueKind,
    /// Writing this column makes the application auto-populate others
    #[serde(default)]
    pub triggers_autofill: bool,
    /// Literal written when an auto-populated column never settles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl ColumnSpec {
    fn new(name: &str, kind: ColumnKind, value: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value,
            triggers_autofill: false,
            fallback: None,
        }
    }

    /// Numeric column typed by the user
    #[must_use]
    pub fn entered(name: &str) -> Self {
        Self::new(name, ColumnKind::Entered, ValueKind::Numeric)
    }

    /// Text column typed by the user
    #[must_use]
    pub fn entered_text(name: &str) -> Self {
        Self::new(name, ColumnKind::Entered, ValueKind::Text)
    }

    /// Text column picked from a list
    #[must_use]
    pub fn selected(name: &str) -> Self {
        Self::new(name, ColumnKind::Selected, ValueKind::Text)
    }

    /// Numeric column filled by the application
    #[must_use]
    pub fn auto(name: &str) -> Self {
        Self::new(name, ColumnKind::AutoPopulated, ValueKind::Numeric)
    }

    /// Text column filled by the application
    #[must_use]
    pub fn auto_text(name: &str) -> Self {
        Self::new(name, ColumnKind::AutoPopulated, ValueKind::Text)
    }

    /// The computed total column
    #[must_use]
    pub fn computed(name: &str) -> Self {
        Self::new(name, ColumnKind::Computed, ValueKind::Numeric)
    }

    /// Mark as an auto-population trigger
    #[must_use]
    pub const fn trigger(mut self) -> Self {
        self.triggers_autofill = true;
        self
    }

    /// Set a fallback literal
    #[must_use]
    pub fn with_fallback(mut self, value: impl Into<String>) -> Self {
        self.fallback = Some(value.into());
        self
    }
}

const fn unit_scale() -> f64 {
    1.0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_unit_scale(scale: &f64) -> bool {
    *scale == 1.0
}

/// Row total rule: the product of the named operand columns, times a scale.
///
/// The scale carries unit conversions (litres to cubic metres for water).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalRule {
    /// Operand columns, in display order
    pub operands: Vec<String>,
    /// Constant multiplier
    #[serde(default = "unit_scale", skip_serializing_if = "is_unit_scale")]
    pub scale: f64,
}

impl TotalRule {
    /// Product of the given columns
    #[must_use]
    pub fn product(operands: &[&str]) -> Self {
        Self {
            operands: operands.iter().map(|s| (*s).to_string()).collect(),
            scale: 1.0,
        }
    }

    /// Set the constant multiplier
    #[must_use]
    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Human readable form, e.g. `factor × consumption`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = self.operands.clone();
        if !is_unit_scale(&self.scale) {
            parts.push(self.scale.to_string());
        }
        parts.join(" × ")
    }

    /// Apply the rule to a row, rounding to cents.
    ///
    /// # Errors
    ///
    /// Fails if an operand is missing from the row or is not an amount.
    pub fn apply(&self, row: &RowInstance) -> VerifyResult<Expectation> {
        let mut operands = Vec::with_capacity(self.operands.len() + 1);
        for column in &self.operands {
            let raw = row.get(column).ok_or_else(|| VerifyError::MissingOperand {
                row: row.handle.to_string(),
                column: column.clone(),
            })?;
            operands.push(Operand::new(column, parse_amount(raw)?));
        }
        if !is_unit_scale(&self.scale) {
            operands.push(Operand::new("scale", self.scale));
        }
        let value = round2(operands.iter().map(|o| o.value).product());
        Ok(Expectation::new(Breakdown::product(operands, value)))
    }
}

/// Describes one logical data-entry table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Stable identifier
    pub id: TableId,
    /// Section the table is entered in
    pub section: Section,
    /// Title as rendered by the application
    pub title: String,
    /// Ordered columns
    pub columns: Vec<ColumnSpec>,
    /// Row total rule
    pub total_rule: TotalRule,
}

impl TableSpec {
    /// Create a table spec
    #[must_use]
    pub fn new(
        id: impl Into<TableId>,
        section: Section,
        title: impl Into<String>,
        columns: Vec<ColumnSpec>,
        total_rule: TotalRule,
    ) -> Self {
        Self {
            id: id.into(),
            section,
            title: title.into(),
            columns,
            total_rule,
        }
    }

    /// Look up a column
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with `UnknownColumn`
    pub fn require_column(&self, name: &str) -> VerifyResult<&ColumnSpec> {
        self.column(name).ok_or_else(|| VerifyError::UnknownColumn {
            table: self.id.to_string(),
            column: name.to_string(),
        })
    }

    /// The single computed total column.
    ///
    /// Validated catalogs always have exactly one.
    pub fn total_column(&self) -> VerifyResult<&ColumnSpec> {
        let mut computed = self
            .columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Computed);
        match (computed.next(), computed.next()) {
            (Some(col), None) => Ok(col),
            _ => Err(VerifyError::invalid_catalog(format!(
                "table {} must have exactly one computed column",
                self.id
            ))),
        }
    }

    /// Column whose value drives auto-population, if any
    #[must_use]
    pub fn trigger_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.triggers_autofill)
    }

    /// Auto-populated columns in declared order
    pub fn auto_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::AutoPopulated)
    }

    fn validate(&self) -> VerifyResult<()> {
        let total = self.total_column()?;
        let mut names = BTreeSet::new();
        for col in &self.columns {
            if !names.insert(col.name.as_str()) {
                return Err(VerifyError::invalid_catalog(format!(
                    "table {} declares column '{}' twice",
                    self.id, col.name
                )));
            }
            if col.triggers_autofill && !col.kind.is_enterable() {
                return Err(VerifyError::invalid_catalog(format!(
                    "table {}: trigger column '{}' must be entered or selected",
                    self.id, col.name
                )));
            }
            if col.fallback.is_some() && col.kind != ColumnKind::AutoPopulated {
                return Err(VerifyError::invalid_catalog(format!(
                    "table {}: only auto-populated columns take a fallback ('{}')",
                    self.id, col.name
                )));
            }
        }
        if self.total_rule.operands.is_empty() {
            return Err(VerifyError::invalid_catalog(format!(
                "table {} has an empty total rule",
                self.id
            )));
        }
        for operand in &self.total_rule.operands {
            let col = self.column(operand).ok_or_else(|| {
                VerifyError::invalid_catalog(format!(
                    "table {}: rule operand '{operand}' is not a column",
                    self.id
                ))
            })?;
            if col.name == total.name || col.value != ValueKind::Numeric {
                return Err(VerifyError::invalid_catalog(format!(
                    "table {}: rule operand '{operand}' must be a numeric input column",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// A rollup that sums the totals of several tables (e.g. "Scope 1 Total")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTotalSpec {
    /// Stable identifier (e.g. `scope1_total`)
    pub id: String,
    /// Label as rendered by the application
    pub label: String,
    /// Section the rollup is displayed in
    pub section: Section,
    /// Constituent tables
    pub tables: Vec<TableId>,
}

/// Columns of a table that the application surfaces again in another section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSpec {
    /// Table whose values are mirrored
    pub table: TableId,
    /// Section the values are entered in
    pub from: Section,
    /// Section that re-displays them
    pub to: Section,
    /// Mirrored columns
    pub columns: Vec<String>,
}

/// Registry of table specs, section totals and mirrors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    tables: Vec<TableSpec>,
    #[serde(default)]
    section_totals: Vec<SectionTotalSpec>,
    #[serde(default)]
    mirrors: Vec<MirrorSpec>,
}

impl Catalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, validating it.
    ///
    /// # Errors
    ///
    /// Fails if the id is taken or the spec violates a column invariant.
    pub fn register(&mut self, spec: TableSpec) -> VerifyResult<&mut Self> {
        spec.validate()?;
        if self.tables.iter().any(|t| t.id == spec.id) {
            return Err(VerifyError::invalid_catalog(format!(
                "table {} registered twice",
                spec.id
            )));
        }
        self.tables.push(spec);
        Ok(self)
    }

    /// Register a section rollup over already registered tables
    pub fn register_section_total(&mut self, spec: SectionTotalSpec) -> VerifyResult<&mut Self> {
        for table in &spec.tables {
            let _ = self.get_spec(table.as_str())?;
        }
        if self.section_totals.iter().any(|s| s.id == spec.id) {
            return Err(VerifyError::invalid_catalog(format!(
                "section total {} registered twice",
                spec.id
            )));
        }
        self.section_totals.push(spec);
        Ok(self)
    }

    /// Register a cross-section mirror
    pub fn register_mirror(&mut self, mirror: MirrorSpec) -> VerifyResult<&mut Self> {
        let table = self.get_spec(mirror.table.as_str())?;
        if table.section != mirror.from || mirror.from == mirror.to {
            return Err(VerifyError::invalid_catalog(format!(
                "mirror of {} must go from {} to another section",
                mirror.table, table.section
            )));
        }
        for column in &mirror.columns {
            let _ = table.require_column(column)?;
        }
        self.mirrors.push(mirror);
        Ok(self)
    }

    /// Get the spec of a table.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::UnknownTable`] for unregistered ids.
    pub fn get_spec(&self, table_id: &str) -> VerifyResult<&TableSpec> {
        self.tables
            .iter()
            .find(|t| t.id.as_str() == table_id)
            .ok_or_else(|| VerifyError::UnknownTable {
                table: table_id.to_string(),
            })
    }

    /// Get the total rule of a table
    pub fn total_rule_for(&self, table_id: &str) -> VerifyResult<&TotalRule> {
        Ok(&self.get_spec(table_id)?.total_rule)
    }

    /// Get a section rollup by id
    pub fn section_total(&self, id: &str) -> VerifyResult<&SectionTotalSpec> {
        self.section_totals
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| VerifyError::invalid_catalog(format!("unknown section total {id}")))
    }

    /// All tables in registration order
    #[must_use]
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// All section rollups
    #[must_use]
    pub fn section_totals(&self) -> &[SectionTotalSpec] {
        &self.section_totals
    }

    /// All mirrors
    #[must_use]
    pub fn mirrors(&self) -> &[MirrorSpec] {
        &self.mirrors
    }

    /// Mirrors declared for one table
    pub fn mirrors_of<'a>(&'a self, table: &'a TableId) -> impl Iterator<Item = &'a MirrorSpec> {
        self.mirrors.iter().filter(move |m| &m.table == table)
    }

    /// Re-run every invariant check, e.g. after deserialising
    pub fn validate(&self) -> VerifyResult<()> {
        let mut rebuilt = Self::new();
        for table in &self.tables {
            let _ = rebuilt.register(table.clone())?;
        }
        for total in &self.section_totals {
            let _ = rebuilt.register_section_total(total.clone())?;
        }
        for mirror in &self.mirrors {
            let _ = rebuilt.register_mirror(mirror.clone())?;
        }
        Ok(())
    }

    /// Parse and validate a YAML catalog
    pub fn from_yaml_str(yaml: &str) -> VerifyResult<Self> {
        let catalog: Self = serde_yaml_ng::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a YAML catalog file
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialise to YAML
    pub fn to_yaml(&self) -> VerifyResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// The platform's tables, rollups and mirrors
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            tables: builtin_tables(),
            section_totals: builtin_section_totals(),
            mirrors: builtin_mirrors(),
        }
    }
}

fn builtin_tables() -> Vec<TableSpec> {
    vec![
        TableSpec::new(
            "scope1_fuels",
            Section::Emissions,
            "Scope 1 - Table A: Stationary Combustion",
            vec![
                ColumnSpec::selected("fuel").trigger(),
                ColumnSpec::auto_text("unit"),
                ColumnSpec::entered("consumption"),
                ColumnSpec::auto("factor"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["factor", "consumption"]),
        ),
        TableSpec::new(
            "scope1_refrigerants",
            Section::Emissions,
            "Scope 1 - Table B: Fugitive Emissions",
            vec![
                ColumnSpec::selected("refrigerant").trigger(),
                ColumnSpec::entered("quantity"),
                ColumnSpec::auto("factor"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["factor", "quantity"]),
        ),
        TableSpec::new(
            "scope1_process",
            Section::Emissions,
            "Scope 1 - Table C: Process Emissions",
            vec![
                ColumnSpec::selected("process").trigger(),
                ColumnSpec::entered("quantity"),
                ColumnSpec::auto("factor"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["factor", "quantity"]),
        ),
        TableSpec::new(
            "scope2_electricity",
            Section::Emissions,
            "Scope 2 - Table D: Purchased Electricity",
            vec![
                ColumnSpec::selected("activity").trigger(),
                ColumnSpec::entered("consumption"),
                ColumnSpec::auto("factor"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["factor", "consumption"]),
        ),
        TableSpec::new(
            "scope3_logistics",
            Section::Emissions,
            "Scope 3 - Upstream Transportation",
            vec![
                ColumnSpec::selected("mode").trigger(),
                ColumnSpec::entered("weight"),
                ColumnSpec::entered("distance"),
                ColumnSpec::auto("factor"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["weight", "distance", "factor"]),
        ),
        // quantity_generated is collected but not part of the total: the
        // platform accounts landfill only
        TableSpec::new(
            "scope3_waste",
            Section::Emissions,
            "Scope 3 - Waste Disposal",
            vec![
                ColumnSpec::selected("waste_type").trigger(),
                ColumnSpec::entered("quantity_generated"),
                ColumnSpec::entered("quantity_landfill"),
                ColumnSpec::auto("factor"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["factor", "quantity_landfill"]),
        ),
        TableSpec::new(
            "water_supply",
            Section::Water,
            "Water Supply",
            vec![
                ColumnSpec::selected("source").trigger(),
                ColumnSpec::entered("volume_litres"),
                ColumnSpec::auto("factor"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["volume_litres", "factor"]).with_scale(0.001),
        ),
        TableSpec::new(
            "carbon_offsets",
            Section::Offsets,
            "Carbon Offsets",
            vec![
                ColumnSpec::entered_text("project"),
                ColumnSpec::selected("standard"),
                ColumnSpec::entered("credits"),
                ColumnSpec::computed("total"),
            ],
            TotalRule::product(&["credits"]),
        ),
    ]
}

fn builtin_section_totals() -> Vec<SectionTotalSpec> {
    let rollup = |id: &str, label: &str, section: Section, tables: &[&str]| SectionTotalSpec {
        id: id.to_string(),
        label: label.to_string(),
        section,
        tables: tables.iter().map(|t| TableId::from(*t)).collect(),
    };
    vec![
        rollup(
            "scope1_total",
            "Scope 1 Total",
            Section::Emissions,
            &["scope1_fuels", "scope1_refrigerants", "scope1_process"],
        ),
        rollup(
            "scope2_total",
            "Scope 2 Total",
            Section::Emissions,
            &["scope2_electricity"],
        ),
        rollup(
            "scope3_total",
            "Scope 3 Total",
            Section::Emissions,
            &["scope3_logistics", "scope3_waste"],
        ),
        rollup(
            "water_total",
            "Water Total",
            Section::Water,
            &["water_supply"],
        ),
        rollup(
            "offsets_total",
            "Offsets Total",
            Section::Offsets,
            &["carbon_offsets"],
        ),
    ]
}

fn builtin_mirrors() -> Vec<MirrorSpec> {
    let mirror = |table: &str, to: Section, columns: &[&str]| MirrorSpec {
        table: TableId::from(table),
        from: Section::Emissions,
        to,
        columns: columns.iter().map(|c| (*c).to_string()).collect(),
    };
    vec![
        mirror(
            "scope1_fuels",
            Section::Energy,
            &["fuel", "consumption", "factor"],
        ),
        mirror(
            "scope2_electricity",
            Section::Energy,
            &["activity", "consumption", "factor"],
        ),
        mirror(
            "scope3_waste",
            Section::Waste,
            &["waste_type", "quantity_generated", "quantity_landfill"],
        ),
    ]
}
