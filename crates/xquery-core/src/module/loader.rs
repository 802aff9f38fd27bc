use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, ErrorCode};

use super::location::Location;

/// Bytes of a module source together with where they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub location: Location,
    pub content: Arc<[u8]>,
}

/// Access to module sources.
///
/// Implementations only need [`SourceLoader::fetch`]; hint resolution is
/// shared. `Ok(None)` means not found, `Err` a failure while reading.
pub trait SourceLoader: Send + Sync {
    fn fetch(&self, location: &Location) -> Result<Option<Arc<[u8]>>, Error>;

    fn resolve(&self, hint: &str, base: Option<&Location>) -> Result<Option<LoadedSource>, Error> {
        let location = Location::resolve(hint, base)?;
        Ok(self
            .fetch(&location)?
            .map(|content| LoadedSource { location, content }))
    }
}

impl<L: SourceLoader + ?Sized> SourceLoader for Arc<L> {
    fn fetch(&self, location: &Location) -> Result<Option<Arc<[u8]>>, Error> {
        (**self).fetch(location)
    }
}

/// In-memory sources keyed by location. Stands in for the database in
/// embedded use and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<Location, Arc<[u8]>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` under `location`, given in hint syntax
    /// (`xmldb:exist:///db/x.xqm`, a path or a URI).
    pub fn insert(&mut self, location: &str, content: impl AsRef<[u8]>) -> Result<Location, Error> {
        let loc = Location::resolve(location, None)?;
        self.sources.insert(loc.clone(), Arc::from(content.as_ref()));
        Ok(loc)
    }

    pub fn with_source(mut self, location: &str, content: impl AsRef<[u8]>) -> Result<Self, Error> {
        self.insert(location, content)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceLoader for MemoryLoader {
    fn fetch(&self, location: &Location) -> Result<Option<Arc<[u8]>>, Error> {
        Ok(self.sources.get(location).cloned())
    }
}

/// Filesystem loader. Database paths are served from `db_root` when set.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    db_root: Option<PathBuf>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `xmldb:` paths onto a directory: `/db/a.xqm` is read from
    /// `<root>/db/a.xqm`.
    pub fn with_db_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.db_root = Some(root.into());
        self
    }

    fn path_for(&self, location: &Location) -> Option<PathBuf> {
        match location {
            Location::File(p) => Some(p.clone()),
            Location::Db(p) => self
                .db_root
                .as_ref()
                .map(|root| root.join(p.trim_start_matches('/'))),
            Location::Uri(_) => None,
        }
    }
}

impl SourceLoader for FsLoader {
    fn fetch(&self, location: &Location) -> Result<Option<Arc<[u8]>>, Error> {
        let Some(path) = self.path_for(location) else {
            tracing::debug!(%location, "location not served by filesystem loader");
            return Ok(None);
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Arc::from(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from_code(
                ErrorCode::XQST0059,
                format!("cannot read '{}': {e}", path.display()),
            )
            .with_source(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>)),
        }
    }
}
