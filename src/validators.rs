//! # Input Validators Module
//!
//! Parses free-text numeric input against declared shapes before it reaches
//! an estimator. Each parser returns a specific [`ValidationError`] tag on
//! failure and never touches session state.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::ValidationError;

/// Sanity ceiling for a single compost material (kg)
pub const MAX_MATERIAL_KG: f64 = 50.0;
/// Sanity ceiling for a food-waste amount (kg)
pub const MAX_FOOD_WASTE_KG: f64 = 100.0;
/// Sanity ceiling for ML greens input (g)
pub const MAX_GREENS_GRAMS: f64 = 50_000.0;
/// Sanity ceiling for tank/soil volumes (L)
pub const MAX_VOLUME_L: f64 = 10_000.0;
/// Upper bound for an EC reading (mS/cm)
pub const MAX_EC_MS_CM: f64 = 10.0;

lazy_static! {
    static ref PERCENTAGE_RE: Regex =
        Regex::new(r"^\s*(-?\d+(?:[.,]\d+)?)\s*%?\s*$").unwrap();
}

/// Parse a single float, accepting the European decimal comma.
fn parse_float(raw: &str) -> Result<f64, ValidationError> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| ValidationError::NotANumber)
}

/// Parse a single positive float with an upper bound.
///
/// Zero and negative values are rejected as out of range, matching the
/// re-prompt behaviour of the `Awaiting*` states.
pub fn parse_bounded_positive(raw: &str, max: f64) -> Result<f64, ValidationError> {
    let value = parse_float(raw)?;
    if value <= 0.0 || value > max {
        return Err(ValidationError::OutOfRange { min: 0.0, max });
    }
    Ok(value)
}

/// Split a semicolon-delimited input into exactly `expected` non-negative floats.
fn parse_delimited(raw: &str, expected: usize) -> Result<Vec<f64>, ValidationError> {
    let parts: Vec<&str> = raw.split(';').collect();
    if parts.len() != expected {
        return Err(ValidationError::WrongArity {
            expected,
            found: parts.len(),
        });
    }
    let mut values = Vec::with_capacity(expected);
    for part in parts {
        values.push(parse_float(part)?);
    }
    if values.iter().any(|v| *v < 0.0) {
        return Err(ValidationError::NegativeValue);
    }
    Ok(values)
}

/// Parse a `greens;browns;water` triple.
pub fn parse_mix_triple(raw: &str) -> Result<(f64, f64, f64), ValidationError> {
    let values = parse_delimited(raw, 3)?;
    Ok((values[0], values[1], values[2]))
}

/// Parse an `ec;moisture` pair.
pub fn parse_ec_pair(raw: &str) -> Result<(f64, f64), ValidationError> {
    let values = parse_delimited(raw, 2)?;
    let ec = values[0];
    let moisture = values[1];
    if ec > MAX_EC_MS_CM {
        return Err(ValidationError::OutOfRange {
            min: 0.0,
            max: MAX_EC_MS_CM,
        });
    }
    if moisture > 100.0 {
        return Err(ValidationError::OutOfRange {
            min: 0.0,
            max: 100.0,
        });
    }
    Ok((ec, moisture))
}

/// Parse a percentage (0-100), tolerating a trailing `%`.
pub fn parse_percentage(raw: &str) -> Result<f64, ValidationError> {
    let captures = PERCENTAGE_RE
        .captures(raw)
        .ok_or(ValidationError::NotANumber)?;
    let value = parse_float(&captures[1])?;
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange {
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_positive_accepts_plain_floats() {
        assert_eq!(parse_bounded_positive("1.5", MAX_MATERIAL_KG).unwrap(), 1.5);
        assert_eq!(parse_bounded_positive(" 2,5 ", MAX_MATERIAL_KG).unwrap(), 2.5);
    }

    #[test]
    fn test_bounded_positive_rejects_garbage_and_bounds() {
        assert_eq!(
            parse_bounded_positive("abc", MAX_MATERIAL_KG),
            Err(ValidationError::NotANumber)
        );
        assert!(matches!(
            parse_bounded_positive("0", MAX_MATERIAL_KG),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_bounded_positive("51", MAX_MATERIAL_KG),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_bounded_positive("-3", MAX_MATERIAL_KG),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_mix_triple_round_trip() {
        let (g, b, w) = parse_mix_triple("1.5;0.8;0.4").unwrap();
        assert_eq!((g, b, w), (1.5, 0.8, 0.4));
    }

    #[test]
    fn test_mix_triple_specific_tags() {
        assert_eq!(
            parse_mix_triple("1.5;0.8"),
            Err(ValidationError::WrongArity {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            parse_mix_triple("1.5;0.8;0.4;0.2"),
            Err(ValidationError::WrongArity {
                expected: 3,
                found: 4
            })
        );
        assert_eq!(
            parse_mix_triple("1.5;x;0.4"),
            Err(ValidationError::NotANumber)
        );
        assert_eq!(
            parse_mix_triple("1.5;-0.8;0.4"),
            Err(ValidationError::NegativeValue)
        );
    }

    #[test]
    fn test_percentage_tolerates_suffix() {
        assert_eq!(parse_percentage("45").unwrap(), 45.0);
        assert_eq!(parse_percentage("45%").unwrap(), 45.0);
        assert_eq!(parse_percentage(" 45.5 % ").unwrap(), 45.5);
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(matches!(
            parse_percentage("101"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_percentage("-1"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(parse_percentage("pct"), Err(ValidationError::NotANumber));
    }

    #[test]
    fn test_ec_pair() {
        assert_eq!(parse_ec_pair("4.2;55").unwrap(), (4.2, 55.0));
        assert_eq!(
            parse_ec_pair("4.2"),
            Err(ValidationError::WrongArity {
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            parse_ec_pair("12;55"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
