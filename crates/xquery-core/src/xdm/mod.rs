use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use core::fmt;
use rust_decimal::Decimal;

/// Namespace-qualified name with the prefix already resolved away.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri: ns_uri.filter(|u| !u.is_empty()),
            local: local.into(),
        }
    }

    pub fn ns(uri: &str, local: &str) -> Self {
        Self::new(Some(uri.to_string()), local)
    }

    pub fn local(local: &str) -> Self {
        Self::new(None, local)
    }
}

impl From<&str> for ExpandedName {
    fn from(local: &str) -> Self {
        ExpandedName::local(local)
    }
}

/// Clark notation: `{uri}local`, or just `local` without a namespace.
impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Atomic values of the XDM type universe.
///
/// Every variant maps to exactly one [`crate::types::AtomicType`]; derived
/// integer and string types are stored as their own variants so the dynamic
/// type survives casts and comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    UntypedAtomic(String),
    String(String),
    NormalizedString(String),
    Token(String),
    Language(String),
    Name(String),
    NCName(String),
    NMTOKEN(String),
    Id(String),
    IdRef(String),
    Entity(String),
    Boolean(bool),
    Decimal(Decimal),
    Integer(i64),
    NonPositiveInteger(i64),
    NegativeInteger(i64),
    Long(i64),
    Int(i32),
    Short(i16),
    Byte(i8),
    NonNegativeInteger(u64),
    UnsignedLong(u64),
    UnsignedInt(u32),
    UnsignedShort(u16),
    UnsignedByte(u8),
    PositiveInteger(u64),
    Double(f64),
    Float(f32),
    /// `xs:duration`; seconds part kept in milliseconds.
    Duration {
        months: i32,
        millis: i64,
    },
    /// Total months.
    YearMonthDuration(i32),
    /// Total milliseconds.
    DayTimeDuration(i64),
    DateTime {
        value: NaiveDateTime,
        tz: Option<FixedOffset>,
    },
    /// `xs:dateTimeStamp`: a dateTime whose timezone is required.
    DateTimeStamp {
        value: NaiveDateTime,
        tz: FixedOffset,
    },
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    GYear {
        year: i32,
        tz: Option<FixedOffset>,
    },
    GYearMonth {
        year: i32,
        month: u8,
        tz: Option<FixedOffset>,
    },
    GMonth {
        month: u8,
        tz: Option<FixedOffset>,
    },
    GMonthDay {
        month: u8,
        day: u8,
        tz: Option<FixedOffset>,
    },
    GDay {
        day: u8,
        tz: Option<FixedOffset>,
    },
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    AnyUri(String),
    /// Decoded bytes.
    Base64Binary(Vec<u8>),
    /// Decoded bytes.
    HexBinary(Vec<u8>),
    Notation(String),
}

pub type XdmSequence<N> = Vec<XdmItem<N>>;

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
}

impl<N> XdmItem<N> {
    pub fn as_atomic(&self) -> Option<&XdmAtomicValue> {
        match self {
            XdmItem::Atomic(a) => Some(a),
            XdmItem::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&N> {
        match self {
            XdmItem::Node(n) => Some(n),
            XdmItem::Atomic(_) => None,
        }
    }
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(n) => write!(f, "{n:?}"),
            XdmItem::Atomic(a) => write!(f, "{a}"),
        }
    }
}

/// Canonical lexical form, as produced by a cast to `xs:string`.
impl fmt::Display for XdmAtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::cast::lexical::canonical_string(self))
    }
}
