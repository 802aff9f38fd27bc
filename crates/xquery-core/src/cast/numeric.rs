//! Numeric classification, lexical parsing and cross-kind comparison.
use core::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::xdm::XdmAtomicValue;

/// Position in the numeric promotion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NumKind {
    Integer,
    Decimal,
    Float,
    Double,
}

pub(crate) fn classify(v: &XdmAtomicValue) -> Option<NumKind> {
    match v {
        XdmAtomicValue::Decimal(_) => Some(NumKind::Decimal),
        XdmAtomicValue::Float(_) => Some(NumKind::Float),
        XdmAtomicValue::Double(_) => Some(NumKind::Double),
        other => integer_value(other).map(|_| NumKind::Integer),
    }
}

/// Value of any integer-derived variant.
pub(crate) fn integer_value(a: &XdmAtomicValue) -> Option<i128> {
    use XdmAtomicValue::*;
    Some(match a {
        Integer(v) | Long(v) | NonPositiveInteger(v) | NegativeInteger(v) => i128::from(*v),
        Int(v) => i128::from(*v),
        Short(v) => i128::from(*v),
        Byte(v) => i128::from(*v),
        NonNegativeInteger(v) | UnsignedLong(v) | PositiveInteger(v) => i128::from(*v),
        UnsignedInt(v) => i128::from(*v),
        UnsignedShort(v) => i128::from(*v),
        UnsignedByte(v) => i128::from(*v),
        _ => return None,
    })
}

/// Exact decimal view of integer and decimal values.
pub(crate) fn to_decimal(a: &XdmAtomicValue) -> Option<Decimal> {
    match a {
        XdmAtomicValue::Decimal(d) => Some(*d),
        other => integer_value(other).and_then(Decimal::from_i128),
    }
}

pub(crate) fn to_f64(a: &XdmAtomicValue) -> Option<f64> {
    match a {
        XdmAtomicValue::Double(d) => Some(*d),
        XdmAtomicValue::Float(f) => Some(f64::from(*f)),
        XdmAtomicValue::Decimal(d) => d.to_f64(),
        other => integer_value(other).and_then(|i| i.to_f64()),
    }
}

fn is_nan(a: &XdmAtomicValue) -> bool {
    match a {
        XdmAtomicValue::Double(d) => d.is_nan(),
        XdmAtomicValue::Float(f) => f.is_nan(),
        _ => false,
    }
}

/// Value comparison between two numerics of any kind after promotion.
/// `None` when either side is not numeric or a NaN is involved.
pub(crate) fn compare(a: &XdmAtomicValue, b: &XdmAtomicValue) -> Option<Ordering> {
    let ka = classify(a)?;
    let kb = classify(b)?;
    if is_nan(a) || is_nan(b) {
        return None;
    }
    match ka.max(kb) {
        NumKind::Integer => Some(integer_value(a)?.cmp(&integer_value(b)?)),
        NumKind::Decimal => Some(to_decimal(a)?.cmp(&to_decimal(b)?)),
        NumKind::Float => {
            // float promotion happens in single precision
            let fa = to_f64(a)? as f32;
            let fb = to_f64(b)? as f32;
            fa.partial_cmp(&fb)
        }
        NumKind::Double => to_f64(a)?.partial_cmp(&to_f64(b)?),
    }
}

/// Equality used by deep-equal: NaN equals NaN across float and double.
pub(crate) fn deep_equal(a: &XdmAtomicValue, b: &XdmAtomicValue) -> bool {
    if classify(a).is_none() || classify(b).is_none() {
        return false;
    }
    match (is_nan(a), is_nan(b)) {
        (true, true) => true,
        (false, false) => compare(a, b) == Some(Ordering::Equal),
        _ => false,
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix(['+', '-']).unwrap_or(s)
}

/// Why a numeric lexical form was not turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberLexError {
    /// Does not match the lexical grammar.
    Malformed,
    /// Matches the grammar but exceeds the representable range.
    Overflow,
}

/// `[+-]?[0-9]+`
pub(crate) fn parse_integer_lexical(s: &str) -> Result<i128, NumberLexError> {
    if !all_digits(strip_sign(s)) {
        return Err(NumberLexError::Malformed);
    }
    s.parse().map_err(|_| NumberLexError::Overflow)
}

/// `[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)`
pub(crate) fn is_decimal_lexical(s: &str) -> bool {
    match strip_sign(s).split_once('.') {
        Some((w, f)) => {
            (w.is_empty() || all_digits(w)) && (f.is_empty() || all_digits(f)) && !(w.is_empty() && f.is_empty())
        }
        None => all_digits(strip_sign(s)),
    }
}

pub(crate) fn parse_decimal_lexical(s: &str) -> Result<Decimal, NumberLexError> {
    if !is_decimal_lexical(s) {
        return Err(NumberLexError::Malformed);
    }
    let negative = s.starts_with('-');
    let (whole, frac) = strip_sign(s).split_once('.').unwrap_or((strip_sign(s), ""));
    let mut normalized = String::with_capacity(s.len() + 2);
    if negative {
        normalized.push('-');
    }
    normalized.push_str(if whole.is_empty() { "0" } else { whole });
    if !frac.is_empty() {
        normalized.push('.');
        normalized.push_str(frac);
    }
    Decimal::from_str(&normalized).map_err(|_| NumberLexError::Overflow)
}

/// Double lexical space including `INF`, `+INF`, `-INF` and `NaN`.
pub(crate) fn parse_double_lexical(s: &str) -> Option<f64> {
    match s {
        "INF" | "+INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };
    if !is_decimal_lexical(mantissa) {
        return None;
    }
    if let Some(exp) = exponent {
        if !all_digits(strip_sign(exp)) {
            return None;
        }
    }
    s.parse::<f64>().ok()
}

pub(crate) fn has_exponent(s: &str) -> bool {
    s.contains(['e', 'E'])
}

/// Exact conversion of a finite double to decimal via its shortest
/// round-trip representation. `None` when out of decimal range.
pub(crate) fn decimal_from_f64(d: f64) -> Option<Decimal> {
    if !d.is_finite() {
        return None;
    }
    Decimal::from_str(&format!("{d}")).ok()
}

pub(crate) fn decimal_from_f32(f: f32) -> Option<Decimal> {
    if !f.is_finite() {
        return None;
    }
    Decimal::from_str(&format!("{f}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", true)]
    #[case("-1.5", true)]
    #[case(".5", true)]
    #[case("5.", true)]
    #[case(".", false)]
    #[case("1e3", false)]
    #[case("1_000", false)]
    #[case("", false)]
    fn decimal_lexical(#[case] s: &str, #[case] ok: bool) {
        assert_eq!(is_decimal_lexical(s), ok, "{s}");
    }

    #[rstest]
    #[case("42", Ok(42))]
    #[case("+7", Ok(7))]
    #[case("1.0", Err(NumberLexError::Malformed))]
    #[case("- 1", Err(NumberLexError::Malformed))]
    #[case("1000000000000000000000000000000000000000000", Err(NumberLexError::Overflow))]
    fn integer_lexical(#[case] s: &str, #[case] expected: Result<i128, NumberLexError>) {
        assert_eq!(parse_integer_lexical(s), expected, "{s}");
    }

    #[rstest]
    fn decimal_overflow_is_not_malformed() {
        assert_eq!(parse_decimal_lexical("1.5").unwrap().to_string(), "1.5");
        assert_eq!(parse_decimal_lexical("1.5.0"), Err(NumberLexError::Malformed));
        let huge = format!("1{}", "0".repeat(33));
        assert_eq!(parse_decimal_lexical(&huge), Err(NumberLexError::Overflow));
    }

    #[rstest]
    #[case("1.0e2", Some(100.0))]
    #[case("-INF", Some(f64::NEG_INFINITY))]
    #[case("inf", None)]
    #[case("infinity", None)]
    #[case("1e", None)]
    #[case("+.5E-1", Some(0.05))]
    fn double_lexical(#[case] s: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_double_lexical(s), expected, "{s}");
    }

    #[rstest]
    fn cross_kind_compare() {
        let one_dec = XdmAtomicValue::Decimal(Decimal::from_str("1.0").unwrap());
        assert_eq!(compare(&one_dec, &XdmAtomicValue::Byte(1)), Some(Ordering::Equal));
        assert_eq!(
            compare(&XdmAtomicValue::Float(f32::INFINITY), &XdmAtomicValue::Double(f64::INFINITY)),
            Some(Ordering::Equal)
        );
        assert!(deep_equal(&XdmAtomicValue::Float(f32::NAN), &XdmAtomicValue::Double(f64::NAN)));
        assert!(!deep_equal(&XdmAtomicValue::Double(f64::NAN), &XdmAtomicValue::Double(1.0)));
    }

    #[rstest]
    fn shortest_decimal_conversion() {
        assert_eq!(decimal_from_f64(0.1).unwrap().to_string(), "0.1");
        assert_eq!(decimal_from_f64(f64::NAN), None);
        assert_eq!(decimal_from_f64(1e300), None);
    }
}
