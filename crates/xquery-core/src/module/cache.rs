use std::hash::{DefaultHasher, Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use crate::error::Error;

use super::location::Location;
use super::prolog::{Prolog, parse_prolog};

type Key = (Location, u64);

/// Parsed prologs keyed by location and content digest. Changed content at
/// the same location misses.
pub(crate) struct PrologCache {
    entries: Option<Mutex<LruCache<Key, Arc<Prolog>>>>,
}

impl PrologCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub(crate) fn get_or_parse(&self, location: &Location, text: &str) -> Result<Arc<Prolog>, Error> {
        let Some(entries) = &self.entries else {
            return parse_prolog(text).map(Arc::new);
        };
        let key = (location.clone(), digest(text));
        if let Some(hit) = entries.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            tracing::debug!(%location, "module cache hit");
            return Ok(Arc::clone(hit));
        }
        let prolog = Arc::new(parse_prolog(text)?);
        entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, Arc::clone(&prolog));
        Ok(prolog)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |e| e.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    pub(crate) fn clear(&self) {
        if let Some(e) = &self.entries {
            e.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

fn digest(text: &str) -> u64 {
    let mut h = DefaultHasher::new();
    text.hash(&mut h);
    h.finish()
}
