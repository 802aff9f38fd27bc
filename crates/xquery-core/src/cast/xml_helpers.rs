//! Whitespace facets and XML name validation used by string-derived casts.

use crate::xdm::XdmAtomicValue;

/// Text of string-like values (string, untypedAtomic, anyURI and the
/// string-derived types).
pub(crate) fn string_like_value(atom: &XdmAtomicValue) -> Option<&str> {
    match atom {
        XdmAtomicValue::String(s)
        | XdmAtomicValue::UntypedAtomic(s)
        | XdmAtomicValue::NormalizedString(s)
        | XdmAtomicValue::Token(s)
        | XdmAtomicValue::Language(s)
        | XdmAtomicValue::Name(s)
        | XdmAtomicValue::NCName(s)
        | XdmAtomicValue::NMTOKEN(s)
        | XdmAtomicValue::Id(s)
        | XdmAtomicValue::IdRef(s)
        | XdmAtomicValue::Entity(s)
        | XdmAtomicValue::AnyUri(s) => Some(s),
        _ => None,
    }
}

pub(crate) fn replace_xml_whitespace(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

pub(crate) fn collapse_xml_whitespace(input: &str) -> String {
    input
        .split([' ', '\t', '\n', '\r'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn is_valid_language(s: &str) -> bool {
    let mut parts = s.split('-');
    match parts.next() {
        Some(first) if (1..=8).contains(&first.len()) && first.chars().all(|c| c.is_ascii_alphabetic()) => {}
        _ => return false,
    }
    parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn is_name_start_char(ch: char, allow_colon: bool) -> bool {
    (allow_colon && ch == ':') || ch == '_' || ch.is_alphabetic()
}

fn is_name_char(ch: char, allow_colon: bool) -> bool {
    is_name_start_char(ch, allow_colon)
        || ch.is_ascii_digit()
        || ch == '-'
        || ch == '.'
        || ch == '\u{B7}'
        || ch.is_numeric()
}

pub(crate) fn is_valid_name(s: &str, allow_colon: bool) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first, allow_colon) => chars.all(|c| is_name_char(c, allow_colon)),
        _ => false,
    }
}

pub(crate) fn is_valid_ncname(s: &str) -> bool {
    is_valid_name(s, false)
}

pub(crate) fn is_valid_nmtoken(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|ch| is_name_char(ch, true))
}

pub(crate) fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(input.len() / 2);
    let mut chars = input.chars();
    while let (Some(high_ch), Some(low_ch)) = (chars.next(), chars.next()) {
        let high = high_ch.to_digit(16)?;
        let low = low_ch.to_digit(16)?;
        bytes.push(u8::try_from((high << 4) | low).ok()?);
    }
    Some(bytes)
}

pub(crate) fn encode_hex_upper(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}
