//! Section command handler

use super::parse_pair;
use crate::commands::SectionArgs;
use crate::error::CliResult;
use nzverify::{expected_section_total, parse_amount, Expectation};

/// Execute the section command
pub fn execute_section(args: &SectionArgs) -> CliResult<()> {
    let expectation = section_total(&args.totals)?;
    println!("{}", expectation.breakdown);
    Ok(())
}

/// Sum `label=amount` table totals
pub fn section_total(totals: &[String]) -> CliResult<Expectation> {
    let mut labelled = Vec::with_capacity(totals.len());
    for arg in totals {
        let (label, amount) = parse_pair(arg)?;
        labelled.push((label, parse_amount(amount)?));
    }
    Ok(expected_section_total(labelled))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scope1_total() {
        let totals: Vec<String> = ["A=253,925.00", "B=11820", "C=6,800.00"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let exp = section_total(&totals).unwrap();
        assert_eq!(exp.formatted(), "272,545.00");
        assert_eq!(exp.breakdown.to_string(), "A 253925 + B 11820 + C 6800 = 272,545.00");
    }

    #[test]
    fn test_bad_amount() {
        let err = section_total(&["A=lots".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Invalid amount 'lots'"));
    }
}
