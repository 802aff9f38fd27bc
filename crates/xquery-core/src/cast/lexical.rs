//! Canonical lexical forms, as produced by casting to `xs:string`.
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::Write;

use super::xml_helpers::encode_hex_upper;
use crate::xdm::XdmAtomicValue;

pub fn canonical_string(v: &XdmAtomicValue) -> String {
    use XdmAtomicValue as V;
    match v {
        V::UntypedAtomic(s)
        | V::String(s)
        | V::NormalizedString(s)
        | V::Token(s)
        | V::Language(s)
        | V::Name(s)
        | V::NCName(s)
        | V::NMTOKEN(s)
        | V::Id(s)
        | V::IdRef(s)
        | V::Entity(s)
        | V::AnyUri(s)
        | V::Notation(s) => s.clone(),
        V::Boolean(b) => b.to_string(),
        V::Decimal(d) => {
            if d.is_zero() {
                "0".to_string()
            } else {
                d.normalize().to_string()
            }
        }
        V::Integer(i) | V::Long(i) | V::NonPositiveInteger(i) | V::NegativeInteger(i) => i.to_string(),
        V::Int(i) => i.to_string(),
        V::Short(i) => i.to_string(),
        V::Byte(i) => i.to_string(),
        V::NonNegativeInteger(u) | V::UnsignedLong(u) | V::PositiveInteger(u) => u.to_string(),
        V::UnsignedInt(u) => u.to_string(),
        V::UnsignedShort(u) => u.to_string(),
        V::UnsignedByte(u) => u.to_string(),
        V::Double(d) => format_double(*d),
        V::Float(f) => format_float(*f),
        V::Duration { months, millis } => format_duration(*months, *millis, true),
        V::YearMonthDuration(m) => format_duration(*m, 0, false),
        V::DayTimeDuration(ms) => format_duration(0, *ms, true),
        V::DateTime { value, tz } => format_date_time(*value, *tz),
        V::DateTimeStamp { value, tz } => format_date_time(*value, Some(*tz)),
        V::Date { date, tz } => {
            let mut s = format_date(*date);
            push_tz(&mut s, *tz);
            s
        }
        V::Time { time, tz } => {
            let mut s = format_time(*time);
            push_tz(&mut s, *tz);
            s
        }
        V::GYear { year, tz } => {
            let mut s = format_year(*year);
            push_tz(&mut s, *tz);
            s
        }
        V::GYearMonth { year, month, tz } => {
            let mut s = format!("{}-{month:02}", format_year(*year));
            push_tz(&mut s, *tz);
            s
        }
        V::GMonth { month, tz } => {
            let mut s = format!("--{month:02}");
            push_tz(&mut s, *tz);
            s
        }
        V::GMonthDay { month, day, tz } => {
            let mut s = format!("--{month:02}-{day:02}");
            push_tz(&mut s, *tz);
            s
        }
        V::GDay { day, tz } => {
            let mut s = format!("---{day:02}");
            push_tz(&mut s, *tz);
            s
        }
        V::QName { prefix, local, .. } => match prefix {
            Some(p) if !p.is_empty() => format!("{p}:{local}"),
            _ => local.clone(),
        },
        V::Base64Binary(bytes) => BASE64_STANDARD.encode(bytes),
        V::HexBinary(bytes) => encode_hex_upper(bytes),
    }
}

fn special(d: f64) -> Option<&'static str> {
    if d.is_nan() {
        Some("NaN")
    } else if d == f64::INFINITY {
        Some("INF")
    } else if d == f64::NEG_INFINITY {
        Some("-INF")
    } else if d == 0.0 {
        Some(if d.is_sign_negative() { "-0" } else { "0" })
    } else {
        None
    }
}

/// Exponent notation gets a mantissa with at least one fractional digit.
fn with_fraction(exp_form: &str) -> String {
    match exp_form.split_once('E') {
        Some((m, e)) if !m.contains('.') => format!("{m}.0E{e}"),
        _ => exp_form.to_string(),
    }
}

pub(crate) fn format_double(d: f64) -> String {
    if let Some(s) = special(d) {
        return s.to_string();
    }
    let abs = d.abs();
    if (1e-6..1e6).contains(&abs) {
        format!("{d}")
    } else {
        with_fraction(&format!("{d:E}"))
    }
}

pub(crate) fn format_float(f: f32) -> String {
    if let Some(s) = special(f64::from(f)) {
        return s.to_string();
    }
    let abs = f.abs();
    if (1e-6..1e6).contains(&abs) {
        format!("{f}")
    } else {
        with_fraction(&format!("{f:E}"))
    }
}

fn format_duration(months: i32, millis: i64, day_time: bool) -> String {
    if months == 0 && millis == 0 {
        return if day_time { "PT0S" } else { "P0M" }.to_string();
    }
    let negative = months < 0 || millis < 0;
    let months = months.unsigned_abs();
    let millis = millis.unsigned_abs();
    let mut s = String::new();
    if negative {
        s.push('-');
    }
    s.push('P');
    let (y, m) = (months / 12, months % 12);
    if y > 0 {
        let _ = write!(s, "{y}Y");
    }
    if m > 0 {
        let _ = write!(s, "{m}M");
    }
    let days = millis / 86_400_000;
    let rem = millis % 86_400_000;
    if days > 0 {
        let _ = write!(s, "{days}D");
    }
    if rem > 0 {
        s.push('T');
        let (h, rem) = (rem / 3_600_000, rem % 3_600_000);
        let (mi, rem) = (rem / 60_000, rem % 60_000);
        let (sec, ms) = (rem / 1000, rem % 1000);
        if h > 0 {
            let _ = write!(s, "{h}H");
        }
        if mi > 0 {
            let _ = write!(s, "{mi}M");
        }
        if sec > 0 || ms > 0 {
            let _ = write!(s, "{sec}");
            if ms > 0 {
                let frac = format!("{ms:03}");
                let _ = write!(s, ".{}", frac.trim_end_matches('0'));
            }
            s.push('S');
        }
    }
    s
}

fn format_year(year: i32) -> String {
    if year < 0 {
        format!("-{:04}", year.unsigned_abs())
    } else {
        format!("{year:04}")
    }
}

fn format_date(d: NaiveDate) -> String {
    format!("{}-{:02}-{:02}", format_year(d.year()), d.month(), d.day())
}

fn format_date_time(value: NaiveDateTime, tz: Option<FixedOffset>) -> String {
    let mut s = format_date(value.date());
    s.push('T');
    s.push_str(&format_time(value.time()));
    push_tz(&mut s, tz);
    s
}

fn format_time(t: NaiveTime) -> String {
    let mut s = format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second());
    let nanos = t.nanosecond() % 1_000_000_000;
    if nanos > 0 {
        let frac = format!("{nanos:09}");
        s.push('.');
        s.push_str(frac.trim_end_matches('0'));
    }
    s
}

fn push_tz(s: &mut String, tz: Option<FixedOffset>) {
    let Some(tz) = tz else { return };
    let secs = tz.local_minus_utc();
    if secs == 0 {
        s.push('Z');
        return;
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let mins = secs.unsigned_abs() / 60;
    let _ = write!(s, "{sign}{:02}:{:02}", mins / 60, mins % 60);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[rstest]
    #[case(1.0, "1")]
    #[case(0.5, "0.5")]
    #[case(1e6, "1.0E6")]
    #[case(1.5e-7, "1.5E-7")]
    #[case(-0.0, "-0")]
    #[case(f64::NAN, "NaN")]
    #[case(f64::NEG_INFINITY, "-INF")]
    fn doubles(#[case] d: f64, #[case] expected: &str) {
        assert_eq!(format_double(d), expected);
    }

    #[rstest]
    fn decimals_drop_trailing_zeros() {
        let d = Decimal::from_str("10.500").unwrap();
        assert_eq!(canonical_string(&XdmAtomicValue::Decimal(d)), "10.5");
        let d = Decimal::from_str("3.000").unwrap();
        assert_eq!(canonical_string(&XdmAtomicValue::Decimal(d)), "3");
    }

    #[rstest]
    #[case(XdmAtomicValue::YearMonthDuration(14), "P1Y2M")]
    #[case(XdmAtomicValue::YearMonthDuration(0), "P0M")]
    #[case(XdmAtomicValue::DayTimeDuration(90_061_500), "P1DT1H1M1.5S")]
    #[case(XdmAtomicValue::DayTimeDuration(-3_600_000), "-PT1H")]
    #[case(XdmAtomicValue::Duration { months: 0, millis: 0 }, "PT0S")]
    fn durations(#[case] v: XdmAtomicValue, #[case] expected: &str) {
        assert_eq!(canonical_string(&v), expected);
    }

    #[rstest]
    fn dates_with_timezones() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let v = XdmAtomicValue::Date { date, tz: FixedOffset::west_opt(5 * 3600) };
        assert_eq!(canonical_string(&v), "2024-03-09-05:00");
        let v = XdmAtomicValue::GMonthDay { month: 2, day: 29, tz: FixedOffset::east_opt(0) };
        assert_eq!(canonical_string(&v), "--02-29Z");
    }
}
