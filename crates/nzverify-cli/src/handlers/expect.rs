//! Expect command handler

use super::parse_pair;
use crate::commands::ExpectArgs;
use crate::error::CliResult;
use nzverify::{expected_row_total, Catalog, Expectation, FixtureData, RowHandle, RowInstance};

/// Execute the expect command
pub fn execute_expect(catalog: &Catalog, args: &ExpectArgs) -> CliResult<()> {
    let mut fixture = FixtureData::builtin_factors();
    if let Some(path) = &args.fixture {
        fixture = fixture.merged(&FixtureData::load(path)?);
    }
    let expectation = expect_row(catalog, &fixture, &args.table, &args.values)?;
    println!("{}: {}", args.table, expectation.breakdown);
    Ok(())
}

/// Expected total of a row given as `column=value` pairs.
///
/// Auto-populated columns left out are filled from the reference values
/// for the row's trigger selection.
pub fn expect_row(
    catalog: &Catalog,
    fixture: &FixtureData,
    table: &str,
    values: &[String],
) -> CliResult<Expectation> {
    let spec = catalog.get_spec(table)?;
    let mut row = RowInstance::new(RowHandle::new(spec.id.clone(), 0));
    for arg in values {
        let (column, value) = parse_pair(arg)?;
        spec.require_column(column)?;
        row.set(column, value);
    }

    let selection = spec
        .trigger_column()
        .and_then(|t| row.get(&t.name))
        .map(str::to_string);
    if let Some(selection) = selection {
        for column in spec.auto_columns() {
            if row.get(&column.name).is_none() {
                if let Some(reference) = fixture.autofill(&spec.id, &column.name, &selection) {
                    row.set(column.name.as_str(), reference);
                }
            }
        }
    }

    Ok(expected_row_total(catalog, &row)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::CliError;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_explicit_factor() {
        let exp = expect_row(
            &Catalog::builtin(),
            &FixtureData::new(),
            "scope1_fuels",
            &args(&["factor=2539.25", "consumption=100"]),
        )
        .unwrap();
        assert_eq!(exp.formatted(), "253,925.00");
    }

    #[test]
    fn test_factor_from_reference() {
        let exp = expect_row(
            &Catalog::builtin(),
            &FixtureData::builtin_factors(),
            "scope2_electricity",
            &args(&["activity=Non Renewable Electricity from Grid", "consumption=100"]),
        )
        .unwrap();
        assert_eq!(exp.formatted(), "14.90");
        assert_eq!(exp.breakdown.to_string(), "factor 0.149 × consumption 100 = 14.90");
    }

    #[test]
    fn test_missing_operand() {
        let err = expect_row(
            &Catalog::builtin(),
            &FixtureData::new(),
            "scope1_fuels",
            &args(&["fuel=Peat", "consumption=1"]),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Verify(nzverify::VerifyError::MissingOperand { .. })));
    }

    #[test]
    fn test_unknown_column() {
        let err = expect_row(
            &Catalog::builtin(),
            &FixtureData::new(),
            "scope1_fuels",
            &args(&["colour=red"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown column 'colour'"));
    }
}
