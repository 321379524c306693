//! Amount parsing and formatting.
//!
//! The UI renders amounts with two decimals and `,` thousands separators
//! (`"253,925.00"`) but accepts plain numbers on entry (`"100"`). Everything
//! that crosses the UI boundary goes through these helpers so both
//! representations compare on the same footing.

use crate::result::{VerifyError, VerifyResult};

/// Parse a UI amount, stripping thousands separators.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidAmount`] for empty or non-numeric text.
pub fn parse_amount(raw: &str) -> VerifyResult<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(VerifyError::InvalidAmount {
            value: raw.to_string(),
        });
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| VerifyError::InvalidAmount {
            value: raw.to_string(),
        })
}

/// Round to two decimal places, half away from zero.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format an amount with two decimals and thousands separators.
///
/// ```
/// assert_eq!(nzverify::format_amount(11820.0), "11,820.00");
/// assert_eq!(nzverify::format_amount(14.899999), "14.90");
/// ```
#[must_use]
pub fn format_amount(value: f64) -> String {
    let rounded = round2(value);
    let fixed = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // -0.004 rounds to zero and must not render as "-0.00"
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Normalise a UI amount to its canonical rendering, if it parses.
#[must_use]
pub fn normalize_amount(raw: &str) -> Option<String> {
    parse_amount(raw).ok().map(format_amount)
}

/// Whether the text is a zero amount in any rendering (`0`, `0.00`, `0,000.0`).
#[must_use]
pub fn is_zero_amount(raw: &str) -> bool {
    parse_amount(raw).is_ok_and(|v| v == 0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod parsing {
        use super::*;

        #[test]
        fn test_plain_number() {
            assert_eq!(parse_amount("100").unwrap(), 100.0);
        }

        #[test]
        fn test_strips_separators_and_whitespace() {
            assert_eq!(parse_amount(" 253,925.00 ").unwrap(), 253925.0);
            assert_eq!(parse_amount("1,182.00").unwrap(), 1182.0);
        }

        #[test]
        fn test_negative() {
            assert_eq!(parse_amount("-1,000.50").unwrap(), -1000.5);
        }

        #[test]
        fn test_empty_is_invalid() {
            let err = parse_amount("   ").unwrap_err();
            assert_eq!(err.kind(), "invalid_amount");
        }

        #[test]
        fn test_text_is_invalid() {
            assert!(parse_amount("Natural Gas").is_err());
            assert!(parse_amount("NaN").is_err());
            assert!(parse_amount("inf").is_err());
        }
    }

    mod formatting {
        use super::*;

        #[test]
        fn test_thousands_grouping() {
            assert_eq!(format_amount(253925.0), "253,925.00");
            assert_eq!(format_amount(272545.0), "272,545.00");
            assert_eq!(format_amount(1234567.891), "1,234,567.89");
        }

        #[test]
        fn test_small_values() {
            assert_eq!(format_amount(0.0), "0.00");
            assert_eq!(format_amount(14.9), "14.90");
            assert_eq!(format_amount(999.999), "1,000.00");
        }

        #[test]
        fn test_float_noise_rounds_away() {
            assert_eq!(format_amount(0.149 * 100.0), "14.90");
        }

        #[test]
        fn test_negative_and_negative_zero() {
            assert_eq!(format_amount(-1500.0), "-1,500.00");
            assert_eq!(format_amount(-0.001), "0.00");
        }

        #[test]
        fn test_normalize() {
            assert_eq!(normalize_amount("11820").as_deref(), Some("11,820.00"));
            assert_eq!(normalize_amount("kWh"), None);
        }

        #[test]
        fn test_zero_detection() {
            assert!(is_zero_amount("0"));
            assert!(is_zero_amount("0.00"));
            assert!(is_zero_amount("0,000.0"));
            assert!(!is_zero_amount("0.01"));
            assert!(!is_zero_amount(""));
        }
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_is_within_a_cent(cents in -10_000_000_000i64..10_000_000_000i64) {
            let value = cents as f64 / 100.0;
            let parsed = parse_amount(&format_amount(value)).unwrap();
            prop_assert!((parsed - value).abs() < 0.005);
        }

        #[test]
        fn prop_groups_have_three_digits(value in 0.0f64..1e12) {
            let formatted = format_amount(value);
            let int_part = formatted.split('.').next().unwrap();
            for group in int_part.split(',').skip(1) {
                prop_assert_eq!(group.len(), 3);
            }
        }
    }
}
