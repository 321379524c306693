//! Test data source.
//!
//! Fixture data is an injected key/value map loaded from YAML or JSON. The
//! verification model only reads it; it never owns where it comes from.
//!
//! Reference values for auto-populated columns are addressed as
//! `autofill.<table>.<column>.<selection>`, where `selection` is the value of
//! the table's trigger column. They serve two purposes: the literal written
//! when the application fails to auto-populate, and a diagnostic comparison
//! when it does.

use crate::amount::parse_amount;
use crate::catalog::{Catalog, ColumnKind, TableId, ValueKind};
use crate::result::{VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const AUTOFILL_PREFIX: &str = "autofill";

/// Key/value fixture data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureData {
    values: BTreeMap<String, String>,
}

impl FixtureData {
    /// Create empty fixture data
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing map
    #[must_use]
    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Get a raw value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Insert a raw value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.values.insert(key.into(), value.into());
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Key of an auto-populated reference value
    #[must_use]
    pub fn autofill_key(table: &TableId, column: &str, selection: &str) -> String {
        format!("{AUTOFILL_PREFIX}.{table}.{column}.{selection}")
    }

    /// Reference value of an auto-populated column for a selection
    #[must_use]
    pub fn autofill(&self, table: &TableId, column: &str, selection: &str) -> Option<&str> {
        self.get(&Self::autofill_key(table, column, selection))
    }

    /// Builder-style reference value setter
    #[must_use]
    pub fn with_autofill(
        mut self,
        table: &str,
        column: &str,
        selection: &str,
        value: impl Into<String>,
    ) -> Self {
        self.insert(
            Self::autofill_key(&TableId::from(table), column, selection),
            value,
        );
        self
    }

    /// Overlay another fixture; its entries win
    #[must_use]
    pub fn merged(mut self, other: &Self) -> Self {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
        self
    }

    /// Parse YAML fixture data
    pub fn from_yaml_str(yaml: &str) -> VerifyResult<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| VerifyError::fixture(format!("invalid YAML fixture: {e}")))
    }

    /// Parse JSON fixture data
    pub fn from_json_str(json: &str) -> VerifyResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| VerifyError::fixture(format!("invalid JSON fixture: {e}")))
    }

    /// Load a fixture file; `.json` is parsed as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VerifyError::fixture(format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// Check every autofill entry against the catalog.
    ///
    /// Returns one message per problem: unknown tables or columns, columns
    /// that are not auto-populated, and numeric references that do not parse.
    #[must_use]
    pub fn check_against(&self, catalog: &Catalog) -> Vec<String> {
        let mut problems = Vec::new();
        for (key, value) in self.iter() {
            let Some(rest) = key.strip_prefix(AUTOFILL_PREFIX).and_then(|r| r.strip_prefix('.'))
            else {
                continue;
            };
            let mut parts = rest.splitn(3, '.');
            let (Some(table), Some(column), Some(_selection)) =
                (parts.next(), parts.next(), parts.next())
            else {
                problems.push(format!("{key}: expected autofill.<table>.<column>.<selection>"));
                continue;
            };
            let spec = match catalog.get_spec(table) {
                Ok(spec) => spec,
                Err(e) => {
                    problems.push(format!("{key}: {e}"));
                    continue;
                }
            };
            match spec.column(column) {
                None => problems.push(format!("{key}: table {table} has no column '{column}'")),
                Some(col) if col.kind != ColumnKind::AutoPopulated => {
                    problems.push(format!("{key}: column '{column}' is not auto-populated"));
                }
                Some(col) if col.value == ValueKind::Numeric && parse_amount(value).is_err() => {
                    problems.push(format!("{key}: '{value}' is not an amount"));
                }
                Some(_) => {}
            }
        }
        problems
    }

    /// Reference values observed on the platform's emission-factor table.
    ///
    /// These mirror an external, versioned reference; override them with a
    /// fixture file when the reference changes.
    #[must_use]
    pub fn builtin_factors() -> Self {
        Self::new()
            .with_autofill("scope1_fuels", "factor", "Natural Gas", "2539.25")
            .with_autofill("scope1_fuels", "unit", "Natural Gas", "kWh")
            .with_autofill("scope1_fuels", "factor", "Diesel", "2687.85")
            .with_autofill("scope1_fuels", "unit", "Diesel", "litres")
            .with_autofill("scope1_refrigerants", "factor", "R-407C", "1182.00")
            .with_autofill("scope1_process", "factor", "Cement Clinker", "68.00")
            .with_autofill(
                "scope2_electricity",
                "factor",
                "Non Renewable Electricity from Grid",
                "0.149",
            )
            .with_autofill("scope3_logistics", "factor", "Road Freight", "0.107")
            .with_autofill("scope3_waste", "factor", "Mixed Municipal Waste", "586.5")
            .with_autofill("water_supply", "factor", "Mains Water", "149")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_autofill_lookup() {
        let fixture = FixtureData::builtin_factors();
        let table = TableId::from("scope1_fuels");
        assert_eq!(fixture.autofill(&table, "factor", "Natural Gas"), Some("2539.25"));
        assert_eq!(fixture.autofill(&table, "unit", "Natural Gas"), Some("kWh"));
        assert_eq!(fixture.autofill(&table, "factor", "Coal"), None);
    }

    #[test]
    fn test_builtin_factors_match_catalog() {
        let problems = FixtureData::builtin_factors().check_against(&Catalog::builtin());
        assert!(problems.is_empty(), "{problems:?}");
    }

    #[test]
    fn test_check_reports_problems() {
        let fixture = FixtureData::new()
            .with_autofill("scope1_fuels", "consumption", "Natural Gas", "1")
            .with_autofill("scope1_fuels", "factor", "Natural Gas", "lots")
            .with_autofill("nope", "factor", "x", "1")
            .with_autofill("scope1_fuels", "colour", "x", "1");
        let mut other = fixture.clone();
        other.insert("autofill.short", "1");
        other.insert("login.user", "auditor@example.com");
        let problems = other.check_against(&Catalog::builtin());
        assert_eq!(problems.len(), 5, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("not auto-populated")));
        assert!(problems.iter().any(|p| p.contains("not an amount")));
        assert!(problems.iter().any(|p| p.contains("Unknown table")));
        assert!(problems.iter().any(|p| p.contains("no column 'colour'")));
        assert!(problems.iter().any(|p| p.contains("expected autofill.")));
    }

    #[test]
    fn test_selection_may_contain_dots() {
        let fixture = FixtureData::new().with_autofill("scope1_fuels", "factor", "Fuel Oil No. 2", "2.9");
        assert!(fixture.check_against(&Catalog::builtin()).is_empty());
    }

    #[test]
    fn test_yaml_and_json() {
        let yaml = FixtureData::from_yaml_str("autofill.scope1_fuels.factor.Natural Gas: '2539.25'\n")
            .unwrap();
        assert_eq!(yaml.len(), 1);
        let json = FixtureData::from_json_str(r#"{"login.user": "auditor"}"#).unwrap();
        assert_eq!(json.get("login.user"), Some("auditor"));
        assert!(FixtureData::from_json_str("[1,2]").is_err());
    }

    #[test]
    fn test_merged_overrides() {
        let over = FixtureData::new().with_autofill("scope1_fuels", "factor", "Natural Gas", "2600");
        let merged = FixtureData::builtin_factors().merged(&over);
        assert_eq!(
            merged.autofill(&"scope1_fuels".into(), "factor", "Natural Gas"),
            Some("2600")
        );
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("data.json");
        let mut file = std::fs::File::create(&json_path).unwrap();
        writeln!(file, r#"{{"autofill.scope1_fuels.factor.Diesel": "2687.85"}}"#).unwrap();
        let loaded = FixtureData::load(&json_path).unwrap();
        assert_eq!(loaded.len(), 1);

        let missing = FixtureData::load(dir.path().join("missing.yaml")).unwrap_err();
        assert_eq!(missing.kind(), "fixture");
    }
}
