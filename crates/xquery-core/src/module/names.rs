use crate::error::{Error, ErrorCode};
use crate::xdm::ExpandedName;

/// Expand a lexical QName. Unprefixed names take `default_ns`.
pub(crate) fn resolve_lexical(
    lexical: &str,
    default_ns: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ExpandedName, Error> {
    if let Some(rest) = lexical.strip_prefix("Q{") {
        return match rest.split_once('}') {
            Some((uri, local)) => Ok(ExpandedName::new(Some(uri.to_string()), local)),
            None => Err(Error::syntax(format!("malformed URI-qualified name '{lexical}'"))),
        };
    }
    match lexical.split_once(':') {
        Some((prefix, local)) => match lookup(prefix) {
            Some(uri) => Ok(ExpandedName::new(Some(uri), local)),
            None => Err(Error::from_code(
                ErrorCode::XPST0081,
                format!("no namespace is bound to prefix '{prefix}' in '{lexical}'"),
            )),
        },
        None => Ok(ExpandedName::new(default_ns.map(str::to_string), lexical)),
    }
}

pub(crate) fn prefix_of(lexical: &str) -> Option<&str> {
    if lexical.starts_with("Q{") {
        return None;
    }
    lexical.split_once(':').map(|(p, _)| p)
}
