//! The atomic type lattice.
//!
//! `AnyAtomic` is the root; `Numeric` is the pseudo-type standing for the union
//! of decimal, float and double. Neither is ever the dynamic type of a value.
use core::fmt;
use std::str::FromStr;

use crate::consts::XS;
use crate::error::{Error, ErrorCode};
use crate::xdm::{ExpandedName, XdmAtomicValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomicType {
    AnyAtomic,
    Numeric,
    UntypedAtomic,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NCName,
    NMTOKEN,
    Id,
    IdRef,
    Entity,
    Boolean,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    Double,
    Float,
    Duration,
    YearMonthDuration,
    DayTimeDuration,
    DateTime,
    DateTimeStamp,
    Date,
    Time,
    GYear,
    GYearMonth,
    GMonth,
    GMonthDay,
    GDay,
    QName,
    AnyUri,
    Base64Binary,
    HexBinary,
    Notation,
}

impl AtomicType {
    pub const ALL: &'static [AtomicType] = &[
        AtomicType::AnyAtomic,
        AtomicType::Numeric,
        AtomicType::UntypedAtomic,
        AtomicType::String,
        AtomicType::NormalizedString,
        AtomicType::Token,
        AtomicType::Language,
        AtomicType::Name,
        AtomicType::NCName,
        AtomicType::NMTOKEN,
        AtomicType::Id,
        AtomicType::IdRef,
        AtomicType::Entity,
        AtomicType::Boolean,
        AtomicType::Decimal,
        AtomicType::Integer,
        AtomicType::NonPositiveInteger,
        AtomicType::NegativeInteger,
        AtomicType::Long,
        AtomicType::Int,
        AtomicType::Short,
        AtomicType::Byte,
        AtomicType::NonNegativeInteger,
        AtomicType::UnsignedLong,
        AtomicType::UnsignedInt,
        AtomicType::UnsignedShort,
        AtomicType::UnsignedByte,
        AtomicType::PositiveInteger,
        AtomicType::Double,
        AtomicType::Float,
        AtomicType::Duration,
        AtomicType::YearMonthDuration,
        AtomicType::DayTimeDuration,
        AtomicType::DateTime,
        AtomicType::DateTimeStamp,
        AtomicType::Date,
        AtomicType::Time,
        AtomicType::GYear,
        AtomicType::GYearMonth,
        AtomicType::GMonth,
        AtomicType::GMonthDay,
        AtomicType::GDay,
        AtomicType::QName,
        AtomicType::AnyUri,
        AtomicType::Base64Binary,
        AtomicType::HexBinary,
        AtomicType::Notation,
    ];

    /// Local name in the XML Schema namespace.
    pub fn local_name(self) -> &'static str {
        match self {
            AtomicType::AnyAtomic => "anyAtomicType",
            AtomicType::Numeric => "numeric",
            AtomicType::UntypedAtomic => "untypedAtomic",
            AtomicType::String => "string",
            AtomicType::NormalizedString => "normalizedString",
            AtomicType::Token => "token",
            AtomicType::Language => "language",
            AtomicType::Name => "Name",
            AtomicType::NCName => "NCName",
            AtomicType::NMTOKEN => "NMTOKEN",
            AtomicType::Id => "ID",
            AtomicType::IdRef => "IDREF",
            AtomicType::Entity => "ENTITY",
            AtomicType::Boolean => "boolean",
            AtomicType::Decimal => "decimal",
            AtomicType::Integer => "integer",
            AtomicType::NonPositiveInteger => "nonPositiveInteger",
            AtomicType::NegativeInteger => "negativeInteger",
            AtomicType::Long => "long",
            AtomicType::Int => "int",
            AtomicType::Short => "short",
            AtomicType::Byte => "byte",
            AtomicType::NonNegativeInteger => "nonNegativeInteger",
            AtomicType::UnsignedLong => "unsignedLong",
            AtomicType::UnsignedInt => "unsignedInt",
            AtomicType::UnsignedShort => "unsignedShort",
            AtomicType::UnsignedByte => "unsignedByte",
            AtomicType::PositiveInteger => "positiveInteger",
            AtomicType::Double => "double",
            AtomicType::Float => "float",
            AtomicType::Duration => "duration",
            AtomicType::YearMonthDuration => "yearMonthDuration",
            AtomicType::DayTimeDuration => "dayTimeDuration",
            AtomicType::DateTime => "dateTime",
            AtomicType::DateTimeStamp => "dateTimeStamp",
            AtomicType::Date => "date",
            AtomicType::Time => "time",
            AtomicType::GYear => "gYear",
            AtomicType::GYearMonth => "gYearMonth",
            AtomicType::GMonth => "gMonth",
            AtomicType::GMonthDay => "gMonthDay",
            AtomicType::GDay => "gDay",
            AtomicType::QName => "QName",
            AtomicType::AnyUri => "anyURI",
            AtomicType::Base64Binary => "base64Binary",
            AtomicType::HexBinary => "hexBinary",
            AtomicType::Notation => "NOTATION",
        }
    }

    pub fn expanded_name(self) -> ExpandedName {
        ExpandedName::ns(XS, self.local_name())
    }

    /// Look up a type by expanded name; only the XML Schema namespace is known.
    pub fn from_expanded(name: &ExpandedName) -> Option<Self> {
        if name.ns_uri.as_deref() != Some(XS) {
            return None;
        }
        Self::ALL.iter().copied().find(|t| t.local_name() == name.local)
    }

    /// Immediate supertype; `None` only for `AnyAtomic`.
    pub fn parent(self) -> Option<Self> {
        use AtomicType as T;
        Some(match self {
            T::AnyAtomic => return None,
            T::NormalizedString => T::String,
            T::Token => T::NormalizedString,
            T::Language | T::Name | T::NMTOKEN => T::Token,
            T::NCName => T::Name,
            T::Id | T::IdRef | T::Entity => T::NCName,
            T::Integer => T::Decimal,
            T::NonPositiveInteger | T::Long | T::NonNegativeInteger => T::Integer,
            T::NegativeInteger => T::NonPositiveInteger,
            T::Int => T::Long,
            T::Short => T::Int,
            T::Byte => T::Short,
            T::UnsignedLong | T::PositiveInteger => T::NonNegativeInteger,
            T::UnsignedInt => T::UnsignedLong,
            T::UnsignedShort => T::UnsignedInt,
            T::UnsignedByte => T::UnsignedShort,
            T::YearMonthDuration | T::DayTimeDuration => T::Duration,
            T::DateTimeStamp => T::DateTime,
            T::Numeric
            | T::UntypedAtomic
            | T::String
            | T::Boolean
            | T::Decimal
            | T::Double
            | T::Float
            | T::Duration
            | T::DateTime
            | T::Date
            | T::Time
            | T::GYear
            | T::GYearMonth
            | T::GMonth
            | T::GMonthDay
            | T::GDay
            | T::QName
            | T::AnyUri
            | T::Base64Binary
            | T::HexBinary
            | T::Notation => T::AnyAtomic,
        })
    }

    /// `self` is `other` or derives from it. Every numeric type derives from
    /// `Numeric`.
    pub fn derives_from(self, other: AtomicType) -> bool {
        if other == AtomicType::Numeric {
            return self.is_numeric();
        }
        let mut cur = Some(self);
        while let Some(t) = cur {
            if t == other {
                return true;
            }
            cur = t.parent();
        }
        false
    }

    /// The primitive type this type is derived from (itself for primitives).
    pub fn primitive(self) -> AtomicType {
        let mut cur = self;
        while let Some(p) = cur.parent() {
            if p == AtomicType::AnyAtomic {
                break;
            }
            cur = p;
        }
        cur
    }

    pub fn is_abstract(self) -> bool {
        matches!(self, AtomicType::AnyAtomic | AtomicType::Numeric | AtomicType::Notation)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self.primitive(), AtomicType::Decimal | AtomicType::Double | AtomicType::Float)
            || self == AtomicType::Numeric
    }

    pub fn is_integer_derived(self) -> bool {
        self != AtomicType::Decimal && self.derives_from(AtomicType::Decimal)
    }

    pub fn is_string_derived(self) -> bool {
        self.derives_from(AtomicType::String)
    }

    pub fn is_duration(self) -> bool {
        self.derives_from(AtomicType::Duration)
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.local_name())
    }
}

/// Parses `xs:integer`, `integer`, or `Q{http://www.w3.org/2001/XMLSchema}integer`.
impl FromStr for AtomicType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let local = if let Some(rest) = s.strip_prefix("xs:") {
            rest
        } else if let Some(rest) = s.strip_prefix('Q').and_then(|t| t.strip_prefix('{')) {
            match rest.split_once('}') {
                Some((ns, local)) if ns == XS => local,
                _ => return Err(unknown_type(s)),
            }
        } else {
            s
        };
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.local_name() == local)
            .ok_or_else(|| unknown_type(s))
    }
}

fn unknown_type(s: &str) -> Error {
    Error::from_code(ErrorCode::XPST0081, format!("unknown atomic type '{s}'"))
}

impl XdmAtomicValue {
    /// Dynamic type of the value.
    pub fn atomic_type(&self) -> AtomicType {
        use XdmAtomicValue as V;
        match self {
            V::UntypedAtomic(_) => AtomicType::UntypedAtomic,
            V::String(_) => AtomicType::String,
            V::NormalizedString(_) => AtomicType::NormalizedString,
            V::Token(_) => AtomicType::Token,
            V::Language(_) => AtomicType::Language,
            V::Name(_) => AtomicType::Name,
            V::NCName(_) => AtomicType::NCName,
            V::NMTOKEN(_) => AtomicType::NMTOKEN,
            V::Id(_) => AtomicType::Id,
            V::IdRef(_) => AtomicType::IdRef,
            V::Entity(_) => AtomicType::Entity,
            V::Boolean(_) => AtomicType::Boolean,
            V::Decimal(_) => AtomicType::Decimal,
            V::Integer(_) => AtomicType::Integer,
            V::NonPositiveInteger(_) => AtomicType::NonPositiveInteger,
            V::NegativeInteger(_) => AtomicType::NegativeInteger,
            V::Long(_) => AtomicType::Long,
            V::Int(_) => AtomicType::Int,
            V::Short(_) => AtomicType::Short,
            V::Byte(_) => AtomicType::Byte,
            V::NonNegativeInteger(_) => AtomicType::NonNegativeInteger,
            V::UnsignedLong(_) => AtomicType::UnsignedLong,
            V::UnsignedInt(_) => AtomicType::UnsignedInt,
            V::UnsignedShort(_) => AtomicType::UnsignedShort,
            V::UnsignedByte(_) => AtomicType::UnsignedByte,
            V::PositiveInteger(_) => AtomicType::PositiveInteger,
            V::Double(_) => AtomicType::Double,
            V::Float(_) => AtomicType::Float,
            V::Duration { .. } => AtomicType::Duration,
            V::YearMonthDuration(_) => AtomicType::YearMonthDuration,
            V::DayTimeDuration(_) => AtomicType::DayTimeDuration,
            V::DateTime { .. } => AtomicType::DateTime,
            V::DateTimeStamp { .. } => AtomicType::DateTimeStamp,
            V::Date { .. } => AtomicType::Date,
            V::Time { .. } => AtomicType::Time,
            V::GYear { .. } => AtomicType::GYear,
            V::GYearMonth { .. } => AtomicType::GYearMonth,
            V::GMonth { .. } => AtomicType::GMonth,
            V::GMonthDay { .. } => AtomicType::GMonthDay,
            V::GDay { .. } => AtomicType::GDay,
            V::QName { .. } => AtomicType::QName,
            V::AnyUri(_) => AtomicType::AnyUri,
            V::Base64Binary(_) => AtomicType::Base64Binary,
            V::HexBinary(_) => AtomicType::HexBinary,
            V::Notation(_) => AtomicType::Notation,
        }
    }

    pub fn instance_of(&self, t: AtomicType) -> bool {
        self.atomic_type().derives_from(t)
    }
}
