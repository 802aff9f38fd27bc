use core::fmt;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{Error, ErrorCode};

const XMLDB_SCHEME: &str = "xmldb:";

/// Physical address of a module source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    /// Absolute path inside the database, e.g. `/db/modules/util.xqm`.
    Db(String),
    File(PathBuf),
    Uri(Url),
}

impl Location {
    /// Resolve a location hint against the location of the importing module.
    ///
    /// `xmldb:` hints become database paths, `file:` URIs and absolute paths
    /// become file paths (or database paths when the base is in the
    /// database), other absolute URIs stay URIs, and relative hints are
    /// joined onto the base with `.` and `..` segments collapsed.
    pub fn resolve(hint: &str, base: Option<&Location>) -> Result<Location, Error> {
        let hint = hint.trim();
        if hint.is_empty() {
            return Err(Error::from_code(ErrorCode::XQST0059, "empty location hint"));
        }
        if let Some(rest) = hint.strip_prefix(XMLDB_SCHEME) {
            return Ok(Location::Db(normalize_db_path(xmldb_path(rest))));
        }
        if has_scheme(hint) {
            let url = Url::parse(hint).map_err(|e| {
                Error::from_code(ErrorCode::XQST0059, format!("invalid location hint '{hint}': {e}"))
                    .with_source(std::sync::Arc::new(e) as std::sync::Arc<dyn std::error::Error + Send + Sync>)
            })?;
            return Ok(Location::from_url(url));
        }
        if hint.starts_with('/') {
            return Ok(match base {
                Some(Location::Db(_)) => Location::Db(normalize_db_path(hint)),
                Some(Location::Uri(u)) => Location::from_url(join_url(u, hint)?),
                _ => Location::File(normalize_path(Path::new(hint))),
            });
        }
        Ok(match base {
            Some(Location::Db(p)) => {
                let dir = p.rsplit_once('/').map_or("", |(d, _)| d);
                Location::Db(normalize_db_path(&format!("{dir}/{hint}")))
            }
            Some(Location::File(p)) => {
                let dir = p.parent().unwrap_or_else(|| Path::new(""));
                Location::File(normalize_path(&dir.join(hint)))
            }
            Some(Location::Uri(u)) => Location::from_url(join_url(u, hint)?),
            None => Location::File(normalize_path(Path::new(hint))),
        })
    }

    fn from_url(url: Url) -> Location {
        if url.scheme() == "file" {
            if let Ok(path) = url.to_file_path() {
                return Location::File(normalize_path(&path));
            }
        }
        Location::Uri(url)
    }

    pub fn is_db(&self) -> bool {
        matches!(self, Location::Db(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Db(p) => write!(f, "xmldb:exist://{p}"),
            Location::File(p) => write!(f, "{}", p.display()),
            Location::Uri(u) => write!(f, "{u}"),
        }
    }
}

fn join_url(base: &Url, hint: &str) -> Result<Url, Error> {
    base.join(hint).map_err(|e| {
        Error::from_code(
            ErrorCode::XQST0059,
            format!("cannot resolve '{hint}' against '{base}': {e}"),
        )
    })
}

/// A scheme needs at least two characters so `C:\x` stays a path.
fn has_scheme(s: &str) -> bool {
    match s.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Path part of `exist:///db/x`, `exist://host:port/db/x` or `/db/x`.
fn xmldb_path(rest: &str) -> &str {
    match rest.find("://") {
        Some(idx) => {
            let after = &rest[idx + 3..];
            after.find('/').map_or("/", |slash| &after[slash..])
        }
        None => rest,
    }
}

fn normalize_db_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
