//! Expectation Calculator
//!
//! Recomputes row, table and section totals from the same inputs the UI
//! consumed, so a discrepancy points at the application's arithmetic and not
//! at the test data. Every expectation carries the arithmetic that produced
//! it; the reconciler attaches it to mismatch reports.

use crate::amount::{format_amount, round2};
use crate::catalog::Catalog;
use crate::result::VerifyResult;
use crate::row::RowInstance;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arithmetic operator of a breakdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Multiplication
    Product,
    /// Addition
    Sum,
}

impl Operator {
    /// Symbol used when rendering
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Product => "×",
            Self::Sum => "+",
        }
    }
}

/// A labelled operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operand {
    /// What the value is (column, row or table)
    pub label: String,
    /// Parsed value
    pub value: f64,
}

impl Operand {
    /// Create an operand
    #[must_use]
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Operands and operator behind an expected value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    /// Operator applied across all operands
    pub operator: Operator,
    /// Operands in order
    pub operands: Vec<Operand>,
    /// Result, rounded to cents
    pub result: f64,
}

impl Breakdown {
    /// Product breakdown
    #[must_use]
    pub const fn product(operands: Vec<Operand>, result: f64) -> Self {
        Self {
            operator: Operator::Product,
            operands,
            result,
        }
    }

    /// Sum breakdown
    #[must_use]
    pub const fn sum(operands: Vec<Operand>, result: f64) -> Self {
        Self {
            operator: Operator::Sum,
            operands,
            result,
        }
    }
}

impl fmt::Display for Breakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = format!(" {} ", self.operator.symbol());
        let terms: Vec<String> = self
            .operands
            .iter()
            .map(|o| format!("{} {}", o.label, o.value))
            .collect();
        write!(f, "{} = {}", terms.join(&sep), format_amount(self.result))
    }
}

/// An expected value together with how it was derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    /// Expected value, rounded to cents
    pub value: f64,
    /// Derivation
    pub breakdown: Breakdown,
}

impl Expectation {
    /// Wrap a breakdown
    #[must_use]
    pub const fn new(breakdown: Breakdown) -> Self {
        Self {
            value: breakdown.result,
            breakdown,
        }
    }

    /// Rendered as the UI renders amounts
    #[must_use]
    pub fn formatted(&self) -> String {
        format_amount(self.value)
    }
}

fn sum_of(operands: Vec<Operand>) -> Expectation {
    let value = round2(operands.iter().map(|o| o.value).sum());
    Expectation::new(Breakdown::sum(operands, value))
}

/// Expected total of one row, applying the table's rule.
///
/// # Errors
///
/// Fails for unknown tables and missing or non-numeric operands.
pub fn expected_row_total(catalog: &Catalog, row: &RowInstance) -> VerifyResult<Expectation> {
    catalog
        .total_rule_for(row.handle.table.as_str())?
        .apply(row)
}

/// Expected table total: the sum of its row totals.
///
/// A single-row table's total is that row's total.
pub fn expected_table_total(catalog: &Catalog, rows: &[RowInstance]) -> VerifyResult<Expectation> {
    let mut operands = Vec::with_capacity(rows.len());
    for row in rows {
        let total = expected_row_total(catalog, row)?;
        if rows.len() == 1 {
            return Ok(total);
        }
        operands.push(Operand::new(format!("row {}", row.handle.row), total.value));
    }
    Ok(sum_of(operands))
}

/// Expected section total: the sum of the labelled table totals.
pub fn expected_section_total<'a, I>(table_totals: I) -> Expectation
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    sum_of(
        table_totals
            .into_iter()
            .map(|(label, value)| Operand::new(label, value))
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::row::RowHandle;
    use proptest::prelude::*;

    fn fuel_row(row: usize, factor: &str, consumption: &str) -> RowInstance {
        RowInstance::new(RowHandle::new("scope1_fuels", row))
            .with_value("fuel", "Natural Gas")
            .with_value("factor", factor)
            .with_value("consumption", consumption)
    }

    mod rows {
        use super::*;

        #[test]
        fn test_natural_gas_row() {
            let exp = expected_row_total(&Catalog::builtin(), &fuel_row(0, "2539.25", "100"))
                .unwrap();
            assert_eq!(exp.formatted(), "253,925.00");
            assert_eq!(
                exp.breakdown.to_string(),
                "factor 2539.25 × consumption 100 = 253,925.00"
            );
        }

        #[test]
        fn test_refrigerant_row() {
            let row = RowInstance::new(RowHandle::new("scope1_refrigerants", 0))
                .with_value("factor", "1,182.00")
                .with_value("quantity", "10");
            let exp = expected_row_total(&Catalog::builtin(), &row).unwrap();
            assert_eq!(exp.formatted(), "11,820.00");
        }

        #[test]
        fn test_scope2_electricity_row() {
            let row = RowInstance::new(RowHandle::new("scope2_electricity", 0))
                .with_value("activity", "Non Renewable Electricity from Grid")
                .with_value("consumption", "100")
                .with_value("factor", "0.149");
            let exp = expected_row_total(&Catalog::builtin(), &row).unwrap();
            assert_eq!(exp.formatted(), "14.90");
        }

        #[test]
        fn test_waste_uses_landfill_only() {
            let row = RowInstance::new(RowHandle::new("scope3_waste", 0))
                .with_value("quantity_generated", "50")
                .with_value("quantity_landfill", "20")
                .with_value("factor", "586.5");
            let exp = expected_row_total(&Catalog::builtin(), &row).unwrap();
            assert_eq!(exp.formatted(), "11,730.00");
        }

        #[test]
        fn test_unknown_table() {
            let row = RowInstance::new(RowHandle::new("nope", 0));
            let err = expected_row_total(&Catalog::builtin(), &row).unwrap_err();
            assert_eq!(err.kind(), "unknown_table");
        }
    }

    mod tables {
        use super::*;

        #[test]
        fn test_single_row_table_total_is_row_total() {
            let catalog = Catalog::builtin();
            let row = fuel_row(0, "2539.25", "100");
            let row_total = expected_row_total(&catalog, &row).unwrap();
            let table_total = expected_table_total(&catalog, &[row]).unwrap();
            assert_eq!(table_total, row_total);
        }

        #[test]
        fn test_multi_row_table_total() {
            let catalog = Catalog::builtin();
            let rows = [fuel_row(0, "2539.25", "100"), fuel_row(1, "2539.25", "2")];
            let total = expected_table_total(&catalog, &rows).unwrap();
            assert_eq!(total.formatted(), "259,003.50");
            assert_eq!(total.breakdown.operator, Operator::Sum);
            assert_eq!(total.breakdown.operands[1].label, "row 1");
        }

        #[test]
        fn test_empty_table_is_zero() {
            let total = expected_table_total(&Catalog::builtin(), &[]).unwrap();
            assert_eq!(total.formatted(), "0.00");
        }
    }

    mod sections {
        use super::*;

        #[test]
        fn test_scope1_total() {
            let exp = expected_section_total([
                ("scope1_fuels", 253925.0),
                ("scope1_refrigerants", 11820.0),
                ("scope1_process", 6800.0),
            ]);
            assert_eq!(exp.formatted(), "272,545.00");
            assert!(exp.breakdown.to_string().contains(" + "));
        }

        #[test]
        fn test_single_table_section() {
            let exp = expected_section_total([("scope2_electricity", 14.9)]);
            assert_eq!(exp.formatted(), "14.90");
        }
    }

    proptest! {
        #[test]
        fn prop_row_total_is_rounded_product(
            factor_cents in 0u32..100_000_000,
            consumption in 0u32..1_000_000,
        ) {
            let factor = f64::from(factor_cents) / 100.0;
            let row = fuel_row(0, &factor.to_string(), &consumption.to_string());
            let exp = expected_row_total(&Catalog::builtin(), &row).unwrap();
            prop_assert_eq!(exp.formatted(), format_amount(round2(factor * f64::from(consumption))));
        }

        #[test]
        fn prop_section_total_is_sum_within_epsilon(
            totals in proptest::collection::vec(0u32..100_000_000, 1..6)
        ) {
            let values: Vec<f64> = totals.iter().map(|c| f64::from(*c) / 100.0).collect();
            let labelled: Vec<(&str, f64)> = values.iter().map(|v| ("t", *v)).collect();
            let exp = expected_section_total(labelled);
            let direct: f64 = values.iter().sum();
            prop_assert!((exp.value - direct).abs() <= 0.01);
        }
    }
}
