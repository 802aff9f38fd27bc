//! Lexical parsing of date, time and duration values.
//!
//! Parsers return `None` on malformed input; the caster turns that into a
//! `FORG0001` naming the target type.
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const MAX_TZ_MINUTES: i32 = 14 * 60;

/// Split an optional timezone suffix (`Z`, `+hh:mm`, `-hh:mm`).
pub(crate) fn split_timezone(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(rest) = s.strip_suffix('Z') {
        return Some((rest, FixedOffset::east_opt(0)));
    }
    let bytes = s.as_bytes();
    if bytes.len() >= 6 {
        let sign_at = bytes.len() - 6;
        let sign = bytes[sign_at];
        if (sign == b'+' || sign == b'-') && bytes[bytes.len() - 3] == b':' {
            let hh: i32 = parse_fixed_digits(&s[sign_at + 1..sign_at + 3])?;
            let mm: i32 = parse_fixed_digits(&s[sign_at + 4..])?;
            if mm > 59 {
                return None;
            }
            let total = hh * 60 + mm;
            if total > MAX_TZ_MINUTES {
                return None;
            }
            let secs = if sign == b'-' { -total * 60 } else { total * 60 };
            return Some((&s[..sign_at], Some(FixedOffset::east_opt(secs)?)));
        }
    }
    Some((s, None))
}

fn parse_fixed_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `-?YYYY` with at least four digits; leading zeros only for four-digit years.
fn parse_year(s: &str) -> Option<i32> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, s),
    };
    if digits.len() < 4 || (digits.len() > 4 && digits.starts_with('0')) {
        return None;
    }
    let y: i32 = parse_fixed_digits(digits)?;
    if y == 0 {
        return None;
    }
    Some(if neg { -y } else { y })
}

fn parse_two(s: &str) -> Option<u32> {
    if s.len() != 2 {
        return None;
    }
    parse_fixed_digits(s)
}

fn parse_ymd(s: &str) -> Option<NaiveDate> {
    let (rest, day) = s.rsplit_once('-')?;
    let (year, month) = rest.rsplit_once('-')?;
    NaiveDate::from_ymd_opt(parse_year(year)?, parse_two(month)?, parse_two(day)?)
}

pub(crate) fn parse_date(s: &str) -> Option<(NaiveDate, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    Some((parse_ymd(body)?, tz))
}

/// Returns the time and whether it was written as `24:00:00`.
fn parse_hms(s: &str) -> Option<(NaiveTime, bool)> {
    let mut parts = s.splitn(3, ':');
    let h = parse_two(parts.next()?)?;
    let m = parse_two(parts.next()?)?;
    let sec_part = parts.next()?;
    let (whole, frac) = match sec_part.split_once('.') {
        Some((w, f)) if !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()) => (w, f),
        Some(_) => return None,
        None => (sec_part, ""),
    };
    let sec = parse_two(whole)?;
    let mut nanos_str = frac.chars().take(9).collect::<String>();
    while nanos_str.len() < 9 {
        nanos_str.push('0');
    }
    let nanos: u32 = nanos_str.parse().ok()?;
    if h == 24 {
        return (m == 0 && sec == 0 && nanos == 0).then(|| (NaiveTime::MIN, true));
    }
    NaiveTime::from_hms_nano_opt(h, m, sec, nanos).map(|t| (t, false))
}

pub(crate) fn parse_time(s: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    Some((parse_hms(body)?.0, tz))
}

pub(crate) fn parse_date_time(s: &str) -> Option<(NaiveDateTime, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    let (d, t) = body.split_once('T')?;
    let date = parse_ymd(d)?;
    let (time, end_of_day) = parse_hms(t)?;
    let value = if end_of_day {
        date.succ_opt()?.and_time(time)
    } else {
        date.and_time(time)
    };
    Some((value, tz))
}

pub(crate) fn parse_g_year(s: &str) -> Option<(i32, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    Some((parse_year(body)?, tz))
}

pub(crate) fn parse_g_year_month(s: &str) -> Option<(i32, u8, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    let (y, m) = body.rsplit_once('-')?;
    let month = month_in_range(parse_two(m)?)?;
    Some((parse_year(y)?, month, tz))
}

pub(crate) fn parse_g_month(s: &str) -> Option<(u8, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    let m = body.strip_prefix("--")?;
    Some((month_in_range(parse_two(m)?)?, tz))
}

pub(crate) fn parse_g_month_day(s: &str) -> Option<(u8, u8, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    let (m, d) = body.strip_prefix("--")?.split_once('-')?;
    let month = month_in_range(parse_two(m)?)?;
    let day = parse_two(d)?;
    // validate against a leap year so --02-29 is accepted
    NaiveDate::from_ymd_opt(2000, u32::from(month), day)?;
    Some((month, u8::try_from(day).ok()?, tz))
}

pub(crate) fn parse_g_day(s: &str) -> Option<(u8, Option<FixedOffset>)> {
    let (body, tz) = split_timezone(s)?;
    let d = parse_two(body.strip_prefix("---")?)?;
    if !(1..=31).contains(&d) {
        return None;
    }
    Some((u8::try_from(d).ok()?, tz))
}

fn month_in_range(m: u32) -> Option<u8> {
    if (1..=12).contains(&m) { u8::try_from(m).ok() } else { None }
}

/// Components of a parsed `xs:duration` lexical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DurationParts {
    pub months: i32,
    pub millis: i64,
    pub has_year_month: bool,
    pub has_day_time: bool,
}

pub(crate) fn parse_duration(s: &str) -> Option<DurationParts> {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s),
    };
    let body = rest.strip_prefix('P')?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) if !t.is_empty() => (d, Some(t)),
        Some(_) => return None,
        None => (body, None),
    };

    let mut months: i64 = 0;
    let mut millis: i64 = 0;
    let mut has_ym = false;
    let mut has_dt = false;

    let mut order = 0;
    for (num, designator) in designators(date_part)? {
        let n: i64 = parse_fixed_digits(num)?;
        let rank = match designator {
            'Y' => {
                months = months.checked_add(n.checked_mul(12)?)?;
                has_ym = true;
                1
            }
            'M' => {
                months = months.checked_add(n)?;
                has_ym = true;
                2
            }
            'D' => {
                millis = millis.checked_add(n.checked_mul(86_400_000)?)?;
                has_dt = true;
                3
            }
            _ => return None,
        };
        if rank <= order {
            return None;
        }
        order = rank;
    }

    if let Some(tp) = time_part {
        let mut order = 0;
        let comps = designators(tp)?;
        if comps.is_empty() {
            return None;
        }
        for (num, designator) in comps {
            let rank = match designator {
                'H' => {
                    let n: i64 = parse_fixed_digits(num)?;
                    millis = millis.checked_add(n.checked_mul(3_600_000)?)?;
                    1
                }
                'M' => {
                    let n: i64 = parse_fixed_digits(num)?;
                    millis = millis.checked_add(n.checked_mul(60_000)?)?;
                    2
                }
                'S' => {
                    millis = millis.checked_add(parse_seconds_millis(num)?)?;
                    3
                }
                _ => return None,
            };
            if rank <= order {
                return None;
            }
            order = rank;
            has_dt = true;
        }
    }

    if !has_ym && !has_dt {
        return None;
    }
    let months = i32::try_from(months).ok()?;
    Some(DurationParts {
        months: if neg { -months } else { months },
        millis: if neg { -millis } else { millis },
        has_year_month: has_ym,
        has_day_time: has_dt,
    })
}

/// Split `12Y3M` into `[("12", 'Y'), ("3", 'M')]`.
fn designators(s: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        if ch.is_ascii_alphabetic() {
            if i == start {
                return None;
            }
            out.push((&s[start..i], ch));
            start = i + ch.len_utf8();
        }
    }
    if start != s.len() {
        return None;
    }
    Some(out)
}

/// Seconds with an optional fraction, truncated to milliseconds.
fn parse_seconds_millis(s: &str) -> Option<i64> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) if !f.is_empty() => (w, f),
        Some(_) => return None,
        None => (s, ""),
    };
    let w: i64 = parse_fixed_digits(whole)?;
    let mut ms = 0i64;
    if !frac.is_empty() {
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut digits: String = frac.chars().take(3).collect();
        while digits.len() < 3 {
            digits.push('0');
        }
        ms = digits.parse().ok()?;
    }
    w.checked_mul(1000)?.checked_add(ms)
}

/// Milliseconds of a time-of-day, used when comparing times and durations.
pub(crate) fn time_millis(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) * 1000 + i64::from(t.nanosecond() / 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024-02-29", true)]
    #[case("2023-02-29", false)]
    #[case("0000-01-01", false)]
    #[case("12024-01-01", true)]
    #[case("02024-01-01", false)]
    #[case("2024-1-01", false)]
    fn dates(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(parse_date(input).is_some(), ok, "{input}");
    }

    #[rstest]
    fn timezone_suffixes() {
        let (_, tz) = parse_date("2024-01-01+05:30").unwrap();
        assert_eq!(tz.unwrap().local_minus_utc(), 5 * 3600 + 30 * 60);
        let (_, tz) = parse_time("10:00:00Z").unwrap();
        assert_eq!(tz.unwrap().local_minus_utc(), 0);
        assert!(parse_date("2024-01-01+15:00").is_none());
    }

    #[rstest]
    fn end_of_day_rolls_over() {
        let (dt, _) = parse_date_time("2024-12-31T24:00:00").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[rstest]
    #[case("P1Y2M", 14, 0)]
    #[case("PT1.5S", 0, 1500)]
    #[case("-P1DT1H", 0, -90_000_000)]
    #[case("P1Y1D", 12, 86_400_000)]
    fn durations(#[case] input: &str, #[case] months: i32, #[case] millis: i64) {
        let d = parse_duration(input).unwrap();
        assert_eq!((d.months, d.millis), (months, millis));
    }

    #[rstest]
    #[case("P")]
    #[case("PT")]
    #[case("P1M1Y")]
    #[case("1Y")]
    #[case("P1.5Y")]
    fn bad_durations(#[case] input: &str) {
        assert!(parse_duration(input).is_none(), "{input}");
    }

    #[rstest]
    fn g_types() {
        assert_eq!(parse_g_month("--12").map(|x| x.0), Some(12));
        assert_eq!(parse_g_month_day("--02-29").map(|x| (x.0, x.1)), Some((2, 29)));
        assert!(parse_g_month_day("--02-30").is_none());
        assert_eq!(parse_g_day("---31").map(|x| x.0), Some(31));
        assert_eq!(parse_g_year_month("2024-07").map(|x| (x.0, x.1)), Some((2024, 7)));
    }
}
