use chrono::{FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use itertools::Itertools;

use crate::cast::numeric;
use crate::cast::temporal::time_millis;
use crate::model::{NodeKind, XdmNode};
use crate::types::AtomicType;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem};

/// `fn:deep-equal` over two sequences. Total: incomparable values are simply
/// not equal.
pub fn deep_equal<N: XdmNode>(a: &[XdmItem<N>], b: &[XdmItem<N>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal_items(x, y))
}

pub fn deep_equal_items<N: XdmNode>(a: &XdmItem<N>, b: &XdmItem<N>) -> bool {
    match (a, b) {
        (XdmItem::Atomic(x), XdmItem::Atomic(y)) => atomic_deep_equal(x, y),
        (XdmItem::Node(x), XdmItem::Node(y)) => node_deep_equal(x, y),
        _ => false,
    }
}

#[derive(PartialEq, Eq)]
enum Family {
    Numeric,
    Text,
    Boolean,
    Duration,
    Other(AtomicType),
}

fn family(v: &XdmAtomicValue) -> Family {
    let t = v.atomic_type();
    if t.is_numeric() {
        Family::Numeric
    } else if t.is_string_derived() || t == AtomicType::UntypedAtomic || t == AtomicType::AnyUri {
        Family::Text
    } else if t == AtomicType::Boolean {
        Family::Boolean
    } else if t.is_duration() {
        Family::Duration
    } else {
        Family::Other(t.primitive())
    }
}

fn duration_parts(v: &XdmAtomicValue) -> Option<(i32, i64)> {
    match v {
        XdmAtomicValue::Duration { months, millis } => Some((*months, *millis)),
        XdmAtomicValue::YearMonthDuration(m) => Some((*m, 0)),
        XdmAtomicValue::DayTimeDuration(ms) => Some((0, *ms)),
        _ => None,
    }
}

fn date_time_parts(v: &XdmAtomicValue) -> Option<(NaiveDateTime, Option<FixedOffset>)> {
    match v {
        XdmAtomicValue::DateTime { value, tz } => Some((*value, *tz)),
        XdmAtomicValue::DateTimeStamp { value, tz } => Some((*value, Some(*tz))),
        _ => None,
    }
}

fn offset_secs(tz: Option<FixedOffset>) -> i64 {
    tz.map_or(0, |t| i64::from(t.local_minus_utc()))
}

/// Instant on the UTC timeline; values without a timezone are taken as UTC.
fn instant(value: NaiveDateTime, tz: Option<FixedOffset>) -> Option<NaiveDateTime> {
    value.checked_sub_signed(TimeDelta::try_seconds(offset_secs(tz))?)
}

/// Equality of two atomic values as `fn:deep-equal` sees it.
pub fn atomic_deep_equal(a: &XdmAtomicValue, b: &XdmAtomicValue) -> bool {
    use XdmAtomicValue as V;
    let fa = family(a);
    if fa != family(b) {
        return false;
    }
    match fa {
        Family::Numeric => numeric::deep_equal(a, b),
        Family::Text => crate::cast::lexical::canonical_string(a) == crate::cast::lexical::canonical_string(b),
        Family::Boolean => a == b,
        Family::Duration => duration_parts(a) == duration_parts(b),
        Family::Other(_) => match (a, b) {
            (x, y) if date_time_parts(x).is_some() => match (date_time_parts(x), date_time_parts(y)) {
                (Some((x, tx)), Some((y, ty))) => instant(x, tx) == instant(y, ty),
                _ => false,
            },
            (V::Date { date: x, tz: tx }, V::Date { date: y, tz: ty }) => {
                instant(x.and_time(chrono::NaiveTime::MIN), *tx)
                    == instant(y.and_time(chrono::NaiveTime::MIN), *ty)
            }
            (V::Time { time: x, tz: tx }, V::Time { time: y, tz: ty }) => {
                let reference = NaiveDate::from_ymd_opt(1972, 12, 31).map(|d| (d.and_time(*x), d.and_time(*y)));
                match reference {
                    Some((dx, dy)) => instant(dx, *tx) == instant(dy, *ty),
                    None => time_millis(*x) == time_millis(*y) && offset_secs(*tx) == offset_secs(*ty),
                }
            }
            (V::GYear { year: x, tz: tx }, V::GYear { year: y, tz: ty }) => {
                x == y && offset_secs(*tx) == offset_secs(*ty)
            }
            (V::GYearMonth { year: x, month: mx, tz: tx }, V::GYearMonth { year: y, month: my, tz: ty }) => {
                (x, mx) == (y, my) && offset_secs(*tx) == offset_secs(*ty)
            }
            (V::GMonth { month: x, tz: tx }, V::GMonth { month: y, tz: ty }) => {
                x == y && offset_secs(*tx) == offset_secs(*ty)
            }
            (V::GMonthDay { month: mx, day: x, tz: tx }, V::GMonthDay { month: my, day: y, tz: ty }) => {
                (mx, x) == (my, y) && offset_secs(*tx) == offset_secs(*ty)
            }
            (V::GDay { day: x, tz: tx }, V::GDay { day: y, tz: ty }) => {
                x == y && offset_secs(*tx) == offset_secs(*ty)
            }
            (V::QName { ns_uri: ux, local: lx, .. }, V::QName { ns_uri: uy, local: ly, .. }) => {
                ux == uy && lx == ly
            }
            (V::Base64Binary(x), V::Base64Binary(y)) | (V::HexBinary(x), V::HexBinary(y)) => x == y,
            (V::Notation(x), V::Notation(y)) => x == y,
            _ => false,
        },
    }
}

fn expanded(n: &impl XdmNode) -> Option<ExpandedName> {
    n.name().map(|q| q.expanded())
}

/// Child content after dropping comments and processing instructions and
/// merging runs of adjacent text.
enum Content<N> {
    Text(String),
    Node(N),
}

fn normalized_children<N: XdmNode>(n: &N) -> Vec<Content<N>> {
    let mut out = Vec::new();
    let mut pending = String::new();
    for child in n.children() {
        let child = child.dereference();
        match child.kind() {
            NodeKind::Comment | NodeKind::ProcessingInstruction => {}
            NodeKind::Text => pending.push_str(&child.string_value()),
            _ => {
                if !pending.is_empty() {
                    out.push(Content::Text(std::mem::take(&mut pending)));
                }
                out.push(Content::Node(child));
            }
        }
    }
    if !pending.is_empty() {
        out.push(Content::Text(pending));
    }
    out
}

fn children_equal<N: XdmNode>(a: &N, b: &N) -> bool {
    let ca = normalized_children(a);
    let cb = normalized_children(b);
    ca.len() == cb.len()
        && ca.iter().zip(&cb).all(|pair| match pair {
            (Content::Text(x), Content::Text(y)) => x == y,
            (Content::Node(x), Content::Node(y)) => node_deep_equal(x, y),
            _ => false,
        })
}

fn attributes_equal<N: XdmNode>(a: &N, b: &N) -> bool {
    let collect = |n: &N| {
        n.attributes()
            .iter()
            .map(|at| (expanded(&at.dereference()), at.string_value()))
            .sorted()
            .collect::<Vec<_>>()
    };
    collect(a) == collect(b)
}

/// Structural equality of two nodes. Reference nodes are resolved first.
pub fn node_deep_equal<N: XdmNode>(a: &N, b: &N) -> bool {
    let a = a.dereference();
    let b = b.dereference();
    if a.is_same_node(&b) {
        return true;
    }
    if a.kind() != b.kind() {
        return false;
    }
    match a.kind() {
        NodeKind::Document => children_equal(&a, &b),
        NodeKind::Element => {
            expanded(&a) == expanded(&b) && attributes_equal(&a, &b) && children_equal(&a, &b)
        }
        NodeKind::Attribute => expanded(&a) == expanded(&b) && a.string_value() == b.string_value(),
        NodeKind::ProcessingInstruction => {
            a.name().map(|q| q.local) == b.name().map(|q| q.local) && a.string_value() == b.string_value()
        }
        NodeKind::Namespace => {
            a.name().and_then(|q| q.prefix) == b.name().and_then(|q| q.prefix)
                && a.string_value() == b.string_value()
        }
        NodeKind::Text | NodeKind::Comment => a.string_value() == b.string_value(),
    }
}
