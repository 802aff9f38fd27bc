//! Well-known namespace URIs.

pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
pub const MATH: &str = "http://www.w3.org/2005/xpath-functions/math";
pub const LOCAL: &str = "http://www.w3.org/2005/xquery-local-functions";
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";

/// Prefixes bound in every static context. Apart from `xml` they may be
/// redeclared once by a module prolog.
pub const PREDECLARED: &[(&str, &str)] = &[
    ("xml", XML_URI),
    ("xs", XS),
    ("xsi", XSI),
    ("fn", FNS),
    ("local", LOCAL),
    ("math", MATH),
    ("err", ERR_NS),
];

/// Namespaces in which user code may not declare functions.
pub const RESERVED_FUNCTION_NAMESPACES: &[&str] = &[XML_URI, XS, XSI, FNS, MATH];

/// Namespace of unprefixed annotations such as `%private`.
pub const ANNOTATIONS_NS: &str = "http://www.w3.org/2012/xquery";
