//! Entry Sequencer
//!
//! Writes a row's entered and selected values in an order the application
//! accepts: autofill triggers first, because selecting a fuel or activity
//! re-renders the row, then the remaining columns in catalog order.

use crate::catalog::{Catalog, ColumnKind, TableSpec};
use crate::driver::FormDriver;
use crate::result::{VerifyError, VerifyResult};
use crate::row::{FieldRef, RowHandle, RowInstance};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Fills rows through a driver
#[derive(Debug, Clone, Copy)]
pub struct EntrySequencer<'a> {
    catalog: &'a Catalog,
    visibility_timeout: Duration,
}

impl<'a> EntrySequencer<'a> {
    /// Sequencer over a catalog
    #[must_use]
    pub const fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            visibility_timeout: Duration::from_secs(10),
        }
    }

    /// How long to wait for a field that is not rendered yet
    #[must_use]
    pub const fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// `(column, value)` pairs of `values` in write order.
    ///
    /// # Errors
    ///
    /// `UnknownColumn` for names the table does not declare and
    /// `ReadOnlyColumn` for auto-populated or computed columns.
    pub fn entry_order<'s, 'v>(
        spec: &'s TableSpec,
        values: &'v BTreeMap<String, String>,
    ) -> VerifyResult<Vec<(&'s str, &'v str)>> {
        for name in values.keys() {
            let column = spec.require_column(name)?;
            if !column.kind.is_enterable() {
                return Err(VerifyError::ReadOnlyColumn {
                    table: spec.id.to_string(),
                    column: name.clone(),
                });
            }
        }
        let present = spec
            .columns
            .iter()
            .filter_map(|c| values.get(&c.name).map(|v| (c, v.as_str())));
        let (triggers, rest): (Vec<_>, Vec<_>) = present.partition(|(c, _)| c.triggers_autofill);
        Ok(triggers
            .into_iter()
            .chain(rest)
            .map(|(c, v)| (c.name.as_str(), v))
            .collect())
    }

    /// Fill one row and return what was written.
    ///
    /// The driver must already show the table's section and the row must
    /// exist.
    pub fn fill_row(
        &self,
        driver: &mut dyn FormDriver,
        handle: &RowHandle,
        values: &BTreeMap<String, String>,
    ) -> VerifyResult<RowInstance> {
        let spec = self.catalog.get_spec(handle.table.as_str())?;
        let order = Self::entry_order(spec, values)?;
        let mut row = RowInstance::new(handle.clone());

        for (column, value) in order {
            let field = FieldRef::new(spec.section, handle.clone(), column);
            let mut state = driver.locate(&field)?;
            if !state.visible {
                driver.wait_for_visible(&field, self.visibility_timeout)?;
                state = driver.locate(&field)?;
            }
            if !state.editable {
                return Err(VerifyError::FieldNotEditable {
                    field: field.to_string(),
                });
            }
            driver.write_value(&field, value)?;
            debug!(field = %field, value = %value, "entered");
            row.set(column, value);
        }
        Ok(row)
    }

    /// Write a fallback literal into an auto-populated column that never
    /// filled itself.
    ///
    /// # Errors
    ///
    /// `ReadOnlyColumn` unless the column is auto-populated.
    pub fn write_fallback(
        &self,
        driver: &mut dyn FormDriver,
        field: &FieldRef,
        value: &str,
    ) -> VerifyResult<()> {
        let spec = self.catalog.get_spec(field.handle.table.as_str())?;
        if spec.require_column(&field.column)?.kind != ColumnKind::AutoPopulated {
            return Err(VerifyError::ReadOnlyColumn {
                table: spec.id.to_string(),
                column: field.column.clone(),
            });
        }
        driver.write_value(field, value)
    }
}
