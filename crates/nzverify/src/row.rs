//! Typed addresses for rows and fields, and the filled-row record.

use crate::catalog::{Section, TableId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A row of a table, addressed by table id and zero-based index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowHandle {
    /// Table the row belongs to
    pub table: TableId,
    /// Zero-based row index
    pub row: usize,
}

impl RowHandle {
    /// Create a new row handle
    #[must_use]
    pub fn new(table: impl Into<TableId>, row: usize) -> Self {
        Self {
            table: table.into(),
            row,
        }
    }
}

impl fmt::Display for RowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.table, self.row)
    }
}

/// One cell as surfaced in a given section of the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    /// Section (tab) the field is rendered in
    pub section: Section,
    /// Row the field belongs to
    pub handle: RowHandle,
    /// Column name
    pub column: String,
}

impl FieldRef {
    /// Create a new field reference
    #[must_use]
    pub fn new(section: Section, handle: RowHandle, column: impl Into<String>) -> Self {
        Self {
            section,
            handle,
            column: column.into(),
        }
    }

    /// Same row and column, rendered in another section
    #[must_use]
    pub fn in_section(&self, section: Section) -> Self {
        Self {
            section,
            handle: self.handle.clone(),
            column: self.column.clone(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.section, self.handle, self.column)
    }
}

/// A filled row at a point in time.
///
/// Values are kept as the strings typed or read back, since the UI mixes
/// numeric and text formats. `total` is the observed row total once it has
/// been read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowInstance {
    /// Row address
    pub handle: RowHandle,
    /// Column values by name
    pub values: BTreeMap<String, String>,
    /// Observed row total
    pub total: Option<String>,
}

impl RowInstance {
    /// Create an empty row instance
    #[must_use]
    pub fn new(handle: RowHandle) -> Self {
        Self {
            handle,
            values: BTreeMap::new(),
            total: None,
        }
    }

    /// Builder-style value setter
    #[must_use]
    pub fn with_value(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column value
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let _ = self.values.insert(column.into(), value.into());
    }

    /// Get a column value
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Record the observed total
    pub fn set_total(&mut self, total: impl Into<String>) {
        self.total = Some(total.into());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        let handle = RowHandle::new("scope1_fuels", 2);
        assert_eq!(handle.to_string(), "scope1_fuels[2]");
    }

    #[test]
    fn test_field_display_and_section_swap() {
        let field = FieldRef::new(
            Section::Emissions,
            RowHandle::new("scope1_fuels", 0),
            "factor",
        );
        assert_eq!(field.to_string(), "Emissions/scope1_fuels[0].factor");
        let mirror = field.in_section(Section::Energy);
        assert_eq!(mirror.to_string(), "Energy/scope1_fuels[0].factor");
        assert_eq!(mirror.handle, field.handle);
    }

    #[test]
    fn test_row_instance_values() {
        let mut row = RowInstance::new(RowHandle::new("scope2_electricity", 0))
            .with_value("consumption", "100");
        row.set("factor", "0.149");
        row.set_total("14.90");
        assert_eq!(row.get("consumption"), Some("100"));
        assert_eq!(row.get("factor"), Some("0.149"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.total.as_deref(), Some("14.90"));
    }
}
