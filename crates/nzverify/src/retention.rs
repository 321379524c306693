//! Cross-Section Retention Check
//!
//! The application stores each fact once and renders it in several tabs.
//! After a save, every mirrored value is re-read in the tab that mirrors it
//! and compared with what was recorded at entry time.

use crate::amount::{format_amount, parse_amount};
use crate::catalog::{Catalog, Section, ValueKind};
use crate::driver::FormDriver;
use crate::reconcile::{within_epsilon, DEFAULT_EPSILON};
use crate::result::{VerifyError, VerifyResult};
use crate::row::{FieldRef, RowInstance};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A value that must read the same in two views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPair {
    /// Where the value was entered or observed
    pub source: FieldRef,
    /// Where it is surfaced again
    pub mirror: FieldRef,
    /// Value recorded at entry time
    pub expected: String,
    /// Comparison mode
    pub value: ValueKind,
}

/// Pairs for every mirrored column of the given rows.
///
/// Columns with no recorded value are skipped; so are rows of unknown
/// tables, which the sequencer would already have rejected.
#[must_use]
pub fn retention_pairs(catalog: &Catalog, rows: &[RowInstance]) -> Vec<RetentionPair> {
    let mut pairs = Vec::new();
    for row in rows {
        let Ok(spec) = catalog.get_spec(row.handle.table.as_str()) else {
            continue;
        };
        for mirror in catalog.mirrors_of(&spec.id) {
            for column in &mirror.columns {
                let (Some(expected), Some(col)) = (row.get(column), spec.column(column)) else {
                    continue;
                };
                let source = FieldRef::new(mirror.from, row.handle.clone(), column.as_str());
                pairs.push(RetentionPair {
                    mirror: source.in_section(mirror.to),
                    source,
                    expected: expected.to_string(),
                    value: col.value,
                });
            }
        }
    }
    pairs
}

/// Sections that mirror at least one pair, in first-seen order
#[must_use]
pub fn mirror_sections(pairs: &[RetentionPair]) -> Vec<Section> {
    let mut sections = Vec::new();
    for pair in pairs {
        if !sections.contains(&pair.mirror.section) {
            sections.push(pair.mirror.section);
        }
    }
    sections
}

/// Reads mirrored values back and compares them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionCheck {
    epsilon: f64,
    visibility_timeout: Duration,
}

impl Default for RetentionCheck {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON, Duration::from_secs(10))
    }
}

impl RetentionCheck {
    /// Check with tolerance and visibility timeout
    #[must_use]
    pub const fn new(epsilon: f64, visibility_timeout: Duration) -> Self {
        Self {
            epsilon,
            visibility_timeout,
        }
    }

    /// Read the mirror field and compare it with the recorded value.
    ///
    /// The driver must already show the mirror's section.
    pub fn assert_retained(&self, driver: &mut dyn FormDriver, pair: &RetentionPair) -> VerifyResult<()> {
        if !driver.locate(&pair.mirror)?.visible {
            driver.wait_for_visible(&pair.mirror, self.visibility_timeout)?;
        }
        let observed = driver.read_value(&pair.mirror)?;
        let retained = match pair.value {
            ValueKind::Numeric => parse_amount(&pair.expected)
                .ok()
                .zip(parse_amount(&observed).ok())
                .is_some_and(|(e, o)| within_epsilon(e, o, self.epsilon)),
            ValueKind::Text => pair.expected == observed,
        };
        debug!(mirror = %pair.mirror, expected = %pair.expected, observed = %observed, retained, "retention read");
        if retained {
            return Ok(());
        }
        let expected = match pair.value {
            ValueKind::Numeric => parse_amount(&pair.expected)
                .map_or_else(|_| pair.expected.clone(), format_amount),
            ValueKind::Text => pair.expected.clone(),
        };
        Err(VerifyError::RetentionMismatch {
            column: pair.source.column.clone(),
            source_field: pair.source.to_string(),
            mirror_field: pair.mirror.to_string(),
            expected,
            observed,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{ClickTarget, MockDefects, MockDriver};
    use crate::row::RowHandle;

    fn gas_row() -> RowInstance {
        RowInstance::new(RowHandle::new("scope1_fuels", 0))
            .with_value("fuel", "Natural Gas")
            .with_value("unit", "kWh")
            .with_value("consumption", "100")
            .with_value("factor", "2539.25")
    }

    fn entered(driver: &mut MockDriver) {
        driver.begin_record("rec").unwrap();
        driver.click(&ClickTarget::Section(Section::Emissions)).unwrap();
        let row = gas_row();
        for column in ["fuel", "consumption"] {
            let field = FieldRef::new(Section::Emissions, row.handle.clone(), column);
            driver.write_value(&field, row.get(column).unwrap()).unwrap();
        }
        driver.click(&ClickTarget::Save).unwrap();
        driver.click(&ClickTarget::Section(Section::Energy)).unwrap();
    }

    #[test]
    fn test_pairs_follow_mirrors() {
        let pairs = retention_pairs(&Catalog::builtin(), &[gas_row()]);
        let columns: Vec<&str> = pairs.iter().map(|p| p.source.column.as_str()).collect();
        assert_eq!(columns, ["fuel", "consumption", "factor"]);
        assert!(pairs.iter().all(|p| p.mirror.section == Section::Energy));
        assert_eq!(pairs[0].value, ValueKind::Text);
        assert_eq!(mirror_sections(&pairs), [Section::Energy]);
    }

    #[test]
    fn test_unmirrored_table_has_no_pairs() {
        let row = RowInstance::new(RowHandle::new("scope1_process", 0)).with_value("quantity", "1");
        assert!(retention_pairs(&Catalog::builtin(), &[row]).is_empty());
    }

    #[test]
    fn test_natural_gas_retained_in_energy() {
        let mut driver = MockDriver::builtin();
        entered(&mut driver);
        let check = RetentionCheck::default();
        for pair in retention_pairs(&Catalog::builtin(), &[gas_row()]) {
            check.assert_retained(&mut driver, &pair).unwrap();
        }
    }

    #[test]
    fn test_drift_is_reported() {
        let defects = MockDefects::new().with_retention_drift("scope1_fuels", "consumption", "10");
        let mut driver = MockDriver::builtin().with_defects(defects);
        entered(&mut driver);
        let pairs = retention_pairs(&Catalog::builtin(), &[gas_row()]);
        let err = RetentionCheck::default()
            .assert_retained(&mut driver, &pairs[1])
            .unwrap_err();
        match err {
            VerifyError::RetentionMismatch {
                column,
                expected,
                observed,
                ..
            } => {
                assert_eq!(column, "consumption");
                assert_eq!(expected, "100.00");
                assert_eq!(observed, "10");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_padded_text_is_drift() {
        let defects =
            MockDefects::new().with_retention_drift("scope1_fuels", "fuel", " Natural Gas");
        let mut driver = MockDriver::builtin().with_defects(defects);
        entered(&mut driver);
        let pairs = retention_pairs(&Catalog::builtin(), &[gas_row()]);
        let err = RetentionCheck::default()
            .assert_retained(&mut driver, &pairs[0])
            .unwrap_err();
        assert_eq!(err.kind(), "retention_mismatch");
    }

    #[test]
    fn test_amounts_compare_by_value_not_format() {
        let defects = MockDefects::new()
            .with_retention_drift("scope1_fuels", "factor", "2,539.25")
            .with_retention_drift("scope1_fuels", "consumption", "100.00");
        let mut driver = MockDriver::builtin().with_defects(defects);
        entered(&mut driver);
        let check = RetentionCheck::default();
        for pair in retention_pairs(&Catalog::builtin(), &[gas_row()]) {
            check.assert_retained(&mut driver, &pair).unwrap();
        }
    }

    #[test]
    fn test_wrong_tab_fails_visibility() {
        let mut driver = MockDriver::builtin();
        entered(&mut driver);
        driver.click(&ClickTarget::Section(Section::Water)).unwrap();
        let pairs = retention_pairs(&Catalog::builtin(), &[gas_row()]);
        let err = RetentionCheck::default()
            .assert_retained(&mut driver, &pairs[0])
            .unwrap_err();
        assert_eq!(err.kind(), "driver");
    }
}
