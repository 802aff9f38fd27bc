//! `cast as` evaluation over the atomic type lattice.
//!
//! [`cast`] dispatches on the pair (source dynamic type, target type).
//! Pairs the casting table forbids fail with `XPTY0004` before any value is
//! inspected; permitted pairs fail with `FORG0001` (lexical form or facet),
//! `FOCA0001`/`FOCA0003` (out of implementation range) or `FOCA0002`
//! (NaN/INF into a type without them).
//!
//! The `numeric` pseudo-type is handled by [`cast_numeric`]: values that are
//! already numeric come back unchanged, everything else is realised as
//! `xs:double`.
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::error::{Error, ErrorCode};
use crate::model::{NodeKind, XdmNode};
use crate::types::AtomicType;
use crate::xdm::{XdmAtomicValue, XdmItem};

pub mod ebv;
pub mod lexical;
pub(crate) mod numeric;
pub(crate) mod temporal;
pub(crate) mod xml_helpers;

pub use ebv::effective_boolean_value;

use numeric::{NumKind, NumberLexError};
use xml_helpers::{
    collapse_xml_whitespace, decode_hex, is_valid_language, is_valid_name, is_valid_ncname,
    is_valid_nmtoken, replace_xml_whitespace, string_like_value,
};

/// Cast a single atomic value to `target`.
pub fn cast(value: &XdmAtomicValue, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    if target == AtomicType::Numeric {
        return cast_numeric(value);
    }
    if target.is_abstract() {
        return Err(Error::from_code(
            ErrorCode::XPST0080,
            format!("cannot cast to abstract type {target}"),
        ));
    }
    let source = value.atomic_type();
    if !cast_allowed(source, target) {
        return Err(Error::type_mismatch(format!("cannot cast {source} to {target}")));
    }
    if source == target {
        return Ok(value.clone());
    }
    tracing::trace!(%source, %target, "cast");

    let source_is_text = source == AtomicType::UntypedAtomic || source.is_string_derived();
    if source_is_text || target.is_string_derived() || target == AtomicType::UntypedAtomic {
        let text = match string_like_value(value) {
            Some(s) => s.to_string(),
            None => lexical::canonical_string(value),
        };
        return from_lexical(&text, target);
    }

    match target.primitive() {
        AtomicType::Boolean => to_boolean(value, target),
        AtomicType::Decimal => to_decimal_family(value, target),
        AtomicType::Double => to_double(value, target).map(XdmAtomicValue::Double),
        AtomicType::Float => to_double(value, target).map(|d| XdmAtomicValue::Float(d as f32)),
        AtomicType::Duration => duration_to(value, target),
        AtomicType::DateTime
        | AtomicType::Date
        | AtomicType::Time
        | AtomicType::GYear
        | AtomicType::GYearMonth
        | AtomicType::GMonth
        | AtomicType::GMonthDay
        | AtomicType::GDay => temporal_to(value, target),
        AtomicType::Base64Binary | AtomicType::HexBinary => binary_to(value, target),
        _ => Err(Error::type_mismatch(format!("cannot cast {source} to {target}"))),
    }
}

/// Whether [`cast`] would succeed.
pub fn castable(value: &XdmAtomicValue, target: AtomicType) -> bool {
    cast(value, target).is_ok()
}

/// Cast to the `numeric` pseudo-type.
///
/// Numeric sources (including every integer subtype) are returned unchanged,
/// so nesting the cast is idempotent. String and untyped sources are
/// validated against the decimal lexical space, falling back to the double
/// lexical space for exponent forms and special values, and are realised as
/// `xs:double`. Booleans become `1.0`/`0.0`.
pub fn cast_numeric(value: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    if numeric::classify(value).is_some() {
        return Ok(value.clone());
    }
    let source = value.atomic_type();
    if source == AtomicType::UntypedAtomic || source.is_string_derived() {
        let raw = string_like_value(value).unwrap_or_default();
        let text = collapse_xml_whitespace(raw);
        let parsed = if numeric::is_decimal_lexical(&text) && !numeric::has_exponent(&text) {
            numeric::parse_decimal_lexical(&text)
                .ok()
                .and_then(|d| d.to_f64())
                .or_else(|| numeric::parse_double_lexical(&text))
        } else {
            numeric::parse_double_lexical(&text)
        };
        return parsed
            .map(XdmAtomicValue::Double)
            .ok_or_else(|| Error::lexical(AtomicType::Numeric, raw));
    }
    if let XdmAtomicValue::Boolean(b) = value {
        return Ok(XdmAtomicValue::Double(if *b { 1.0 } else { 0.0 }));
    }
    Err(Error::type_mismatch(format!("cannot cast {source} to {}", AtomicType::Numeric)))
}

/// Atomize a sequence: nodes contribute their typed value, which for untyped
/// trees is `xs:untypedAtomic` (comments and processing instructions give
/// `xs:string`).
pub fn atomize<N: XdmNode>(items: &[XdmItem<N>]) -> Vec<XdmAtomicValue> {
    items
        .iter()
        .map(|item| match item {
            XdmItem::Atomic(a) => a.clone(),
            XdmItem::Node(n) => {
                let n = n.dereference();
                match n.kind() {
                    NodeKind::Comment | NodeKind::ProcessingInstruction | NodeKind::Namespace => {
                        XdmAtomicValue::String(n.string_value())
                    }
                    _ => XdmAtomicValue::UntypedAtomic(n.string_value()),
                }
            }
        })
        .collect()
}

/// Cast one item. Nodes must be atomized first.
pub fn cast_item<N: XdmNode>(item: &XdmItem<N>, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    match item {
        XdmItem::Atomic(a) => cast(a, target),
        XdmItem::Node(_) => Err(Error::type_mismatch(format!(
            "cannot cast a node to {target} without atomization"
        ))),
    }
}

/// `$seq cast as T` / `$seq cast as T?`.
///
/// The operand is atomized; an empty result is only permitted when
/// `allow_empty` is set, more than one value is always a type error.
pub fn cast_sequence<N: XdmNode>(
    items: &[XdmItem<N>],
    target: AtomicType,
    allow_empty: bool,
) -> Result<Option<XdmAtomicValue>, Error> {
    let atoms = atomize(items);
    match atoms.as_slice() {
        [] if allow_empty => Ok(None),
        [] => Err(Error::type_mismatch(format!("empty sequence cannot be cast to {target}"))),
        [single] => cast(single, target).map(Some),
        _ => Err(Error::type_mismatch(format!(
            "sequence of {} items cannot be cast to {target}",
            atoms.len()
        ))),
    }
}

/// The casting table on primitive types.
fn cast_allowed(source: AtomicType, target: AtomicType) -> bool {
    use AtomicType as T;
    let s = source.primitive();
    let t = target.primitive();
    if t == T::String || target == T::UntypedAtomic {
        return true;
    }
    if s == T::String || source == T::UntypedAtomic {
        return true;
    }
    let numeric_or_bool = |p: T| matches!(p, T::Decimal | T::Double | T::Float | T::Boolean);
    match s {
        T::Decimal | T::Double | T::Float | T::Boolean => numeric_or_bool(t),
        T::Duration => t == T::Duration,
        T::DateTime => matches!(
            t,
            T::DateTime | T::Date | T::Time | T::GYear | T::GYearMonth | T::GMonth | T::GMonthDay | T::GDay
        ),
        T::Date => matches!(
            t,
            T::DateTime | T::Date | T::GYear | T::GYearMonth | T::GMonth | T::GMonthDay | T::GDay
        ),
        T::Base64Binary | T::HexBinary => matches!(t, T::Base64Binary | T::HexBinary),
        _ => s == t,
    }
}

fn whitespace_facet(text: &str, target: AtomicType) -> String {
    match target {
        AtomicType::String | AtomicType::UntypedAtomic => text.to_string(),
        AtomicType::NormalizedString => replace_xml_whitespace(text),
        _ => collapse_xml_whitespace(text),
    }
}

/// Cast from a lexical form.
fn from_lexical(raw: &str, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    use AtomicType as T;
    use XdmAtomicValue as V;
    let text = whitespace_facet(raw, target);
    let lexical_err = || Error::lexical(target, raw);
    match target {
        T::String => Ok(V::String(text)),
        T::UntypedAtomic => Ok(V::UntypedAtomic(text)),
        T::NormalizedString => Ok(V::NormalizedString(text)),
        T::Token => Ok(V::Token(text)),
        T::Language => checked(is_valid_language(&text), text, V::Language, raw, target),
        T::Name => checked(is_valid_name(&text, true), text, V::Name, raw, target),
        T::NCName => checked(is_valid_ncname(&text), text, V::NCName, raw, target),
        T::Id => checked(is_valid_ncname(&text), text, V::Id, raw, target),
        T::IdRef => checked(is_valid_ncname(&text), text, V::IdRef, raw, target),
        T::Entity => checked(is_valid_ncname(&text), text, V::Entity, raw, target),
        T::NMTOKEN => checked(is_valid_nmtoken(&text), text, V::NMTOKEN, raw, target),
        T::AnyUri => Ok(V::AnyUri(text)),
        T::Boolean => match text.as_str() {
            "true" | "1" => Ok(V::Boolean(true)),
            "false" | "0" => Ok(V::Boolean(false)),
            _ => Err(lexical_err()),
        },
        T::Decimal => match numeric::parse_decimal_lexical(&text) {
            Ok(d) => Ok(V::Decimal(d)),
            Err(NumberLexError::Malformed) => Err(lexical_err()),
            Err(NumberLexError::Overflow) => {
                Err(Error::from_code(ErrorCode::FOCA0001, format!("value too large for {target}")))
            }
        },
        T::Double => numeric::parse_double_lexical(&text).map(V::Double).ok_or_else(lexical_err),
        T::Float => numeric::parse_double_lexical(&text)
            .map(|d| V::Float(d as f32))
            .ok_or_else(lexical_err),
        t if t.is_integer_derived() => {
            let i = match numeric::parse_integer_lexical(&text) {
                Ok(i) => i,
                Err(NumberLexError::Malformed) => return Err(lexical_err()),
                Err(NumberLexError::Overflow) => return Err(integer_overflow(&text, target)),
            };
            make_integer(i, target)
        }
        T::Duration => {
            let d = temporal::parse_duration(&text).ok_or_else(lexical_err)?;
            Ok(V::Duration { months: d.months, millis: d.millis })
        }
        T::YearMonthDuration => match temporal::parse_duration(&text) {
            Some(d) if !d.has_day_time => Ok(V::YearMonthDuration(d.months)),
            _ => Err(lexical_err()),
        },
        T::DayTimeDuration => match temporal::parse_duration(&text) {
            Some(d) if !d.has_year_month => Ok(V::DayTimeDuration(d.millis)),
            _ => Err(lexical_err()),
        },
        T::DateTime => temporal::parse_date_time(&text)
            .map(|(value, tz)| V::DateTime { value, tz })
            .ok_or_else(lexical_err),
        T::DateTimeStamp => {
            let (value, tz) = temporal::parse_date_time(&text).ok_or_else(lexical_err)?;
            let tz = tz.ok_or_else(|| Error::constraint(target, "timezone required"))?;
            Ok(V::DateTimeStamp { value, tz })
        }
        T::Date => temporal::parse_date(&text).map(|(date, tz)| V::Date { date, tz }).ok_or_else(lexical_err),
        T::Time => temporal::parse_time(&text).map(|(time, tz)| V::Time { time, tz }).ok_or_else(lexical_err),
        T::GYear => temporal::parse_g_year(&text).map(|(year, tz)| V::GYear { year, tz }).ok_or_else(lexical_err),
        T::GYearMonth => temporal::parse_g_year_month(&text)
            .map(|(year, month, tz)| V::GYearMonth { year, month, tz })
            .ok_or_else(lexical_err),
        T::GMonth => temporal::parse_g_month(&text).map(|(month, tz)| V::GMonth { month, tz }).ok_or_else(lexical_err),
        T::GMonthDay => temporal::parse_g_month_day(&text)
            .map(|(month, day, tz)| V::GMonthDay { month, day, tz })
            .ok_or_else(lexical_err),
        T::GDay => temporal::parse_g_day(&text).map(|(day, tz)| V::GDay { day, tz }).ok_or_else(lexical_err),
        T::Base64Binary => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            BASE64_STANDARD
                .decode(compact.as_bytes())
                .map(V::Base64Binary)
                .map_err(|e| {
                    lexical_err().with_source(Some(
                        std::sync::Arc::new(e) as std::sync::Arc<dyn std::error::Error + Send + Sync>
                    ))
                })
        }
        T::HexBinary => decode_hex(&text).map(V::HexBinary).ok_or_else(lexical_err),
        T::QName => qname_from_lexical(&text).ok_or_else(lexical_err)?,
        T::AnyAtomic | T::Numeric | T::Notation => Err(Error::from_code(
            ErrorCode::XPST0080,
            format!("cannot cast to abstract type {target}"),
        )),
        _ => Err(lexical_err()),
    }
}

fn checked(
    ok: bool,
    text: String,
    make: fn(String) -> XdmAtomicValue,
    raw: &str,
    target: AtomicType,
) -> Result<XdmAtomicValue, Error> {
    if ok { Ok(make(text)) } else { Err(Error::lexical(target, raw)) }
}

/// Casting a string to `xs:QName` needs in-scope namespaces; without a
/// static context only unprefixed names and `Q{uri}local` are accepted.
fn qname_from_lexical(text: &str) -> Option<Result<XdmAtomicValue, Error>> {
    if let Some(body) = text.strip_prefix("Q{") {
        let (uri, local) = body.split_once('}')?;
        if !is_valid_ncname(local) {
            return None;
        }
        return Some(Ok(XdmAtomicValue::QName {
            ns_uri: Some(uri.to_string()).filter(|u| !u.is_empty()),
            prefix: None,
            local: local.to_string(),
        }));
    }
    if let Some((prefix, local)) = text.split_once(':') {
        if !is_valid_ncname(prefix) || !is_valid_ncname(local) {
            return None;
        }
        return Some(Err(Error::from_code(
            ErrorCode::XPST0081,
            format!("prefix '{prefix}' has no namespace binding in this context"),
        )));
    }
    if !is_valid_ncname(text) {
        return None;
    }
    Some(Ok(XdmAtomicValue::QName { ns_uri: None, prefix: None, local: text.to_string() }))
}

/// Build an integer-derived value, enforcing the subtype's value space.
fn make_integer(i: i128, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    use AtomicType as T;
    use XdmAtomicValue as V;
    let out_of_range = || Error::constraint(target, format!("value {i} out of range"));
    let too_large = || Error::from_code(ErrorCode::FOCA0003, format!("value {i} too large for {target}"));
    let signed = |lo: i128, hi: i128| -> Result<i64, Error> {
        if i < lo || i > hi {
            return Err(out_of_range());
        }
        i64::try_from(i).map_err(|_| too_large())
    };
    let unsigned = |lo: i128| -> Result<u64, Error> {
        if i < lo {
            return Err(out_of_range());
        }
        u64::try_from(i).map_err(|_| too_large())
    };
    Ok(match target {
        T::Integer => V::Integer(i64::try_from(i).map_err(|_| too_large())?),
        T::NonPositiveInteger => V::NonPositiveInteger(signed(i128::MIN, 0)?),
        T::NegativeInteger => V::NegativeInteger(signed(i128::MIN, -1)?),
        T::Long => V::Long(signed(i64::MIN.into(), i64::MAX.into())?),
        T::Int => V::Int(i32::try_from(i).map_err(|_| out_of_range())?),
        T::Short => V::Short(i16::try_from(i).map_err(|_| out_of_range())?),
        T::Byte => V::Byte(i8::try_from(i).map_err(|_| out_of_range())?),
        T::NonNegativeInteger => V::NonNegativeInteger(unsigned(0)?),
        T::PositiveInteger => V::PositiveInteger(unsigned(1)?),
        T::UnsignedLong => {
            if i < 0 || i > i128::from(u64::MAX) {
                return Err(out_of_range());
            }
            V::UnsignedLong(unsigned(0)?)
        }
        T::UnsignedInt => V::UnsignedInt(u32::try_from(i).map_err(|_| out_of_range())?),
        T::UnsignedShort => V::UnsignedShort(u16::try_from(i).map_err(|_| out_of_range())?),
        T::UnsignedByte => V::UnsignedByte(u8::try_from(i).map_err(|_| out_of_range())?),
        _ => return Err(Error::type_mismatch(format!("{target} is not an integer type"))),
    })
}

/// Lexically valid integer beyond `i128`. Unbounded types in the value's
/// direction report `FOCA0003`; every other subtype reports its facet.
fn integer_overflow(text: &str, target: AtomicType) -> Error {
    use AtomicType as T;
    let negative = text.starts_with('-');
    match target {
        T::Integer => {}
        T::NonPositiveInteger | T::NegativeInteger if negative => {}
        T::NonNegativeInteger | T::PositiveInteger if !negative => {}
        _ => return Error::constraint(target, format!("value {text} out of range")),
    }
    Error::from_code(ErrorCode::FOCA0003, format!("value {text} too large for {target}"))
}

fn bool_as_number(value: &XdmAtomicValue) -> Option<i128> {
    match value {
        XdmAtomicValue::Boolean(b) => Some(i128::from(*b)),
        _ => None,
    }
}

fn to_boolean(value: &XdmAtomicValue, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    let b = match value {
        XdmAtomicValue::Boolean(b) => *b,
        XdmAtomicValue::Decimal(d) => !d.is_zero(),
        XdmAtomicValue::Double(d) => *d != 0.0 && !d.is_nan(),
        XdmAtomicValue::Float(f) => *f != 0.0 && !f.is_nan(),
        other => match numeric::integer_value(other) {
            Some(i) => i != 0,
            None => return Err(Error::type_mismatch(format!("cannot cast {} to {target}", other.atomic_type()))),
        },
    };
    Ok(XdmAtomicValue::Boolean(b))
}

fn non_finite(target: AtomicType) -> Error {
    Error::from_code(ErrorCode::FOCA0002, format!("NaN or INF cannot be cast to {target}"))
}

/// Decimal and every integer subtype. Fractions truncate toward zero.
fn to_decimal_family(value: &XdmAtomicValue, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    let kind = numeric::classify(value);
    if target == AtomicType::Decimal {
        let d = match (kind, value) {
            (_, XdmAtomicValue::Double(d)) => {
                if !d.is_finite() {
                    return Err(non_finite(target));
                }
                numeric::decimal_from_f64(*d)
            }
            (_, XdmAtomicValue::Float(f)) => {
                if !f.is_finite() {
                    return Err(non_finite(target));
                }
                numeric::decimal_from_f32(*f)
            }
            (Some(_), v) => numeric::to_decimal(v),
            (None, v) => bool_as_number(v).and_then(Decimal::from_i128),
        };
        return d
            .map(XdmAtomicValue::Decimal)
            .ok_or_else(|| Error::from_code(ErrorCode::FOCA0001, format!("value too large for {target}")));
    }

    let i = match (kind, value) {
        (Some(NumKind::Integer), v) => numeric::integer_value(v),
        (Some(NumKind::Decimal), XdmAtomicValue::Decimal(d)) => d.trunc().to_i128(),
        (Some(_), v) => {
            let f = numeric::to_f64(v).unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err(non_finite(target));
            }
            let t = f.trunc();
            if t.abs() >= 1.7e38 {
                None
            } else {
                t.to_i128()
            }
        }
        (None, v) => bool_as_number(v),
    };
    let i = i.ok_or_else(|| Error::from_code(ErrorCode::FOCA0003, format!("value too large for {target}")))?;
    make_integer(i, target)
}

fn to_double(value: &XdmAtomicValue, target: AtomicType) -> Result<f64, Error> {
    numeric::to_f64(value)
        .or_else(|| bool_as_number(value).and_then(f64::from_i128))
        .ok_or_else(|| Error::type_mismatch(format!("cannot cast {} to {target}", value.atomic_type())))
}

fn duration_to(value: &XdmAtomicValue, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    let (months, millis) = match value {
        V::Duration { months, millis } => (*months, *millis),
        V::YearMonthDuration(m) => (*m, 0),
        V::DayTimeDuration(ms) => (0, *ms),
        other => return Err(Error::type_mismatch(format!("cannot cast {} to {target}", other.atomic_type()))),
    };
    Ok(match target {
        AtomicType::YearMonthDuration => V::YearMonthDuration(months),
        AtomicType::DayTimeDuration => V::DayTimeDuration(millis),
        _ => V::Duration { months, millis },
    })
}

fn temporal_to(value: &XdmAtomicValue, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    use chrono::Datelike;
    use XdmAtomicValue as V;
    let (date, time, tz) = match value {
        V::DateTime { value, tz } => (value.date(), Some(value.time()), *tz),
        V::DateTimeStamp { value, tz } => (value.date(), Some(value.time()), Some(*tz)),
        V::Date { date, tz } => (*date, None, *tz),
        other => return Err(Error::type_mismatch(format!("cannot cast {} to {target}", other.atomic_type()))),
    };
    let month = u8::try_from(date.month()).unwrap_or_default();
    let day = u8::try_from(date.day()).unwrap_or_default();
    Ok(match target {
        AtomicType::DateTime => V::DateTime {
            value: date.and_time(time.unwrap_or(chrono::NaiveTime::MIN)),
            tz,
        },
        AtomicType::DateTimeStamp => V::DateTimeStamp {
            value: date.and_time(time.unwrap_or(chrono::NaiveTime::MIN)),
            tz: tz.ok_or_else(|| Error::constraint(target, "timezone required"))?,
        },
        AtomicType::Date => V::Date { date, tz },
        AtomicType::Time => match time {
            Some(time) => V::Time { time, tz },
            None => return Err(Error::type_mismatch(format!("cannot cast xs:date to {target}"))),
        },
        AtomicType::GYear => V::GYear { year: date.year(), tz },
        AtomicType::GYearMonth => V::GYearMonth { year: date.year(), month, tz },
        AtomicType::GMonth => V::GMonth { month, tz },
        AtomicType::GMonthDay => V::GMonthDay { month, day, tz },
        AtomicType::GDay => V::GDay { day, tz },
        _ => return Err(Error::type_mismatch(format!("cannot cast {} to {target}", value.atomic_type()))),
    })
}

fn binary_to(value: &XdmAtomicValue, target: AtomicType) -> Result<XdmAtomicValue, Error> {
    let bytes = match value {
        XdmAtomicValue::Base64Binary(b) | XdmAtomicValue::HexBinary(b) => b.clone(),
        other => return Err(Error::type_mismatch(format!("cannot cast {} to {target}", other.atomic_type()))),
    };
    Ok(if target == AtomicType::HexBinary {
        XdmAtomicValue::HexBinary(bytes)
    } else {
        XdmAtomicValue::Base64Binary(bytes)
    })
}
