use core::fmt;
use std::sync::Arc;

use crate::consts::ERR_NS;
use crate::xdm::ExpandedName;

/// W3C error codes raised by the semantic core.
///
/// Codes are stable diagnostics: callers match on them, messages are for humans.
/// `Unknown` is the fallback for codes outside the `err:` namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Static errors raised while building the module binding table
    XQST0033, // multiple bindings for one prefix
    XQST0034, // duplicate function name + arity
    XQST0045, // function declared in a reserved namespace
    XQST0047, // namespace imported twice under different prefixes
    XQST0048, // library symbol outside the module namespace
    XQST0049, // duplicate variable name
    XQST0059, // module cannot be located
    XQST0070, // xml/xmlns prefix or XML namespace misuse
    XQST0088, // empty target namespace in an import
    XQST0093, // cyclic module import
    XQST0103, // duplicate window variable
    XPST0003, // prolog does not scan
    XPST0080, // cast to an abstract type
    XPST0081, // undeclared prefix in a QName
    // Type and dynamic errors
    XPTY0004, // structurally incompatible types / cardinality
    XPTY0019, // path step applied to a non-node
    XPDY0002, // value of an external variable missing
    FORG0001, // invalid lexical form or facet violation
    FORG0006, // effective boolean value undefined
    FOCA0001, // value too large for xs:decimal
    FOCA0002, // NaN/INF where a finite value is required
    FOCA0003, // value too large for xs:integer
    FOER0000, // unidentified error
    Unknown,
}

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::XQST0033,
        ErrorCode::XQST0034,
        ErrorCode::XQST0045,
        ErrorCode::XQST0047,
        ErrorCode::XQST0048,
        ErrorCode::XQST0049,
        ErrorCode::XQST0059,
        ErrorCode::XQST0070,
        ErrorCode::XQST0088,
        ErrorCode::XQST0093,
        ErrorCode::XQST0103,
        ErrorCode::XPST0003,
        ErrorCode::XPST0080,
        ErrorCode::XPST0081,
        ErrorCode::XPTY0004,
        ErrorCode::XPTY0019,
        ErrorCode::XPDY0002,
        ErrorCode::FORG0001,
        ErrorCode::FORG0006,
        ErrorCode::FOCA0001,
        ErrorCode::FOCA0002,
        ErrorCode::FOCA0003,
        ErrorCode::FOER0000,
    ];

    /// Local part of the code, e.g. `XQST0034`.
    pub fn local(self) -> &'static str {
        match self {
            ErrorCode::XQST0033 => "XQST0033",
            ErrorCode::XQST0034 => "XQST0034",
            ErrorCode::XQST0045 => "XQST0045",
            ErrorCode::XQST0047 => "XQST0047",
            ErrorCode::XQST0048 => "XQST0048",
            ErrorCode::XQST0049 => "XQST0049",
            ErrorCode::XQST0059 => "XQST0059",
            ErrorCode::XQST0070 => "XQST0070",
            ErrorCode::XQST0088 => "XQST0088",
            ErrorCode::XQST0093 => "XQST0093",
            ErrorCode::XQST0103 => "XQST0103",
            ErrorCode::XPST0003 => "XPST0003",
            ErrorCode::XPST0080 => "XPST0080",
            ErrorCode::XPST0081 => "XPST0081",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPTY0019 => "XPTY0019",
            ErrorCode::XPDY0002 => "XPDY0002",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FOCA0001 => "FOCA0001",
            ErrorCode::FOCA0002 => "FOCA0002",
            ErrorCode::FOCA0003 => "FOCA0003",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Prefixed form, e.g. `err:XQST0034`.
    pub fn as_str(self) -> String {
        format!("err:{}", self.local())
    }

    /// The code as an expanded name in the xqt-errors namespace.
    pub fn qname(self) -> ExpandedName {
        ExpandedName::new(Some(ERR_NS.to_string()), self.local())
    }

    pub fn from_code(s: &str) -> Self {
        let local = s.strip_prefix("err:").unwrap_or(s);
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.local() == local)
            .unwrap_or(ErrorCode::Unknown)
    }

    pub fn is_static(self) -> bool {
        self.local().starts_with("XQST") || self.local().starts_with("XPST")
    }
}

/// Semantic classification of a failure.
///
/// Several kinds share a code (lexical and facet failures are both
/// `FORG0001`), so the kind is carried next to the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPrefix,
    EmptyNamespace,
    PrefixConflict,
    NamespaceConflict,
    ModuleNotFound,
    DuplicateSymbol,
    CyclicImport,
    InvalidDeclaration,
    Syntax,
    UnboundExternalVariable,
    LexicalError,
    ConstraintViolation,
    InvalidCastValue,
    EBVUndefined,
    TypeMismatch,
    Other,
}

impl ErrorKind {
    fn for_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::XQST0070 => ErrorKind::InvalidPrefix,
            ErrorCode::XQST0088 => ErrorKind::EmptyNamespace,
            ErrorCode::XQST0033 => ErrorKind::PrefixConflict,
            ErrorCode::XQST0047 => ErrorKind::NamespaceConflict,
            ErrorCode::XQST0059 => ErrorKind::ModuleNotFound,
            ErrorCode::XQST0034 | ErrorCode::XQST0049 | ErrorCode::XQST0103 => {
                ErrorKind::DuplicateSymbol
            }
            ErrorCode::XQST0093 => ErrorKind::CyclicImport,
            ErrorCode::XQST0045 | ErrorCode::XQST0048 | ErrorCode::XPST0081 => {
                ErrorKind::InvalidDeclaration
            }
            ErrorCode::XPST0003 => ErrorKind::Syntax,
            ErrorCode::XPDY0002 => ErrorKind::UnboundExternalVariable,
            ErrorCode::FORG0001 => ErrorKind::LexicalError,
            ErrorCode::FOCA0001 | ErrorCode::FOCA0002 | ErrorCode::FOCA0003 => {
                ErrorKind::InvalidCastValue
            }
            ErrorCode::FORG0006 => ErrorKind::EBVUndefined,
            ErrorCode::XPTY0004 | ErrorCode::XPTY0019 | ErrorCode::XPST0080 => {
                ErrorKind::TypeMismatch
            }
            ErrorCode::FOER0000 | ErrorCode::Unknown => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        let kind = if code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorKind::for_code(ErrorCode::from_code(&code.local))
        } else {
            ErrorKind::Other
        };
        Self { code, kind, message: msg.into(), source: None }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code: code.qname(),
            kind: ErrorKind::for_code(code),
            message: msg.into(),
            source: None,
        }
    }

    fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    /// `err:LOCAL` for W3C codes, `Q{ns}local` otherwise.
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    pub fn invalid_prefix(prefix: &str) -> Self {
        Self::from_code(
            ErrorCode::XQST0070,
            format!("the prefix '{prefix}' is reserved and cannot be declared"),
        )
    }

    pub fn empty_namespace(prefix: &str) -> Self {
        Self::from_code(
            ErrorCode::XQST0088,
            format!("module import for prefix '{prefix}' has an empty target namespace"),
        )
    }

    pub fn prefix_conflict(prefix: &str, bound: &str, requested: &str) -> Self {
        Self::from_code(
            ErrorCode::XQST0033,
            format!("prefix '{prefix}' is already bound to '{bound}', cannot rebind to '{requested}'"),
        )
    }

    pub fn namespace_conflict(uri: &str, existing_prefix: &str, prefix: &str) -> Self {
        Self::from_code(
            ErrorCode::XQST0047,
            format!(
                "namespace '{uri}' is already imported as '{existing_prefix}', cannot import it again as '{prefix}'"
            ),
        )
    }

    pub fn module_not_found(uri: &str, detail: impl fmt::Display) -> Self {
        Self::from_code(
            ErrorCode::XQST0059,
            format!("cannot load module for namespace '{uri}': {detail}"),
        )
    }

    pub fn duplicate_function(name: &ExpandedName, arity: usize) -> Self {
        Self::from_code(
            ErrorCode::XQST0034,
            format!("function {name}#{arity} is already declared"),
        )
    }

    pub fn duplicate_variable(name: &ExpandedName) -> Self {
        Self::from_code(
            ErrorCode::XQST0049,
            format!("variable ${name} is already declared"),
        )
    }

    pub fn cyclic_import(chain: &[String]) -> Self {
        Self::from_code(
            ErrorCode::XQST0093,
            format!("cyclic module import: {}", chain.join(" -> ")),
        )
    }

    pub fn unbound_external(name: &ExpandedName) -> Self {
        Self::from_code(
            ErrorCode::XPDY0002,
            format!("no value supplied for external variable ${name}"),
        )
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::XPST0003, msg)
    }

    /// Lexical form does not match the target type.
    pub fn lexical(target: impl fmt::Display, text: &str) -> Self {
        Self::from_code(
            ErrorCode::FORG0001,
            format!("invalid lexical form for {target}: '{text}'"),
        )
    }

    /// Value is lexically valid but violates a facet of the target type.
    pub fn constraint(target: impl fmt::Display, detail: impl fmt::Display) -> Self {
        Self::from_code(ErrorCode::FORG0001, format!("{detail} for {target}"))
            .with_kind(ErrorKind::ConstraintViolation)
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::XPTY0004, msg)
    }

    pub fn ebv_undefined(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::FORG0006, msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn codes_round_trip_through_strings() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(&code.as_str()), *code);
        }
        assert_eq!(ErrorCode::from_code("err:NOPE0000"), ErrorCode::Unknown);
    }

    #[rstest]
    #[case(ErrorCode::XQST0070, ErrorKind::InvalidPrefix)]
    #[case(ErrorCode::XQST0034, ErrorKind::DuplicateSymbol)]
    #[case(ErrorCode::XQST0049, ErrorKind::DuplicateSymbol)]
    #[case(ErrorCode::XPDY0002, ErrorKind::UnboundExternalVariable)]
    #[case(ErrorCode::FORG0006, ErrorKind::EBVUndefined)]
    fn kind_follows_code(#[case] code: ErrorCode, #[case] kind: ErrorKind) {
        assert_eq!(Error::from_code(code, "x").kind, kind);
    }

    #[rstest]
    fn constraint_keeps_forg0001() {
        let e = Error::constraint("xs:byte", "value out of range");
        assert_eq!(e.code_enum(), ErrorCode::FORG0001);
        assert_eq!(e.kind, ErrorKind::ConstraintViolation);
    }

    #[rstest]
    fn display_shows_message_and_code() {
        let name = ExpandedName::new(Some("http://example.com/impl".into()), "f1");
        let e = Error::duplicate_function(&name, 1);
        let text = e.to_string();
        assert!(text.contains("{http://example.com/impl}f1#1"), "{text}");
        assert!(text.ends_with("(err:XQST0034)"), "{text}");
    }

    #[rstest]
    fn foreign_codes_use_clark_notation() {
        let e = Error::new_qname(ExpandedName::new(Some("urn:x".into()), "E1"), "boom");
        assert_eq!(e.format_code(), "Q{urn:x}E1");
        assert_eq!(e.code_enum(), ErrorCode::Unknown);
        assert_eq!(e.kind, ErrorKind::Other);
    }
}
