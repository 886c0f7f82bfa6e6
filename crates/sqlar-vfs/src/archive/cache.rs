//! Directory metadata cache.
//!
//! Directory entries are looked up on every traversal through them, so each
//! resolved directory is memoized for the lifetime of the filesystem handle.
//! There is no eviction: the archive is assumed not to change underneath an
//! open handle. If it does, cached entries go stale.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::entry::Entry;

/// Map from normalized directory path to its entry.
///
/// Writes are first-writer-wins: once a path is cached, later stores return
/// the cached instance and drop their own, so every caller observing a path
/// shares one `Arc<Entry>`.
#[derive(Debug, Default)]
pub struct DirCache {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
}

impl DirCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `path`, if any.
    pub fn load(&self, path: &str) -> Option<Arc<Entry>> {
        self.entries.read().get(path).cloned()
    }

    /// Cache `entry` under `path` unless another entry got there first.
    ///
    /// Returns whichever entry is cached after the call.
    pub fn store(&self, path: &str, entry: Arc<Entry>) -> Arc<Entry> {
        // Fast path: already cached
        if let Some(existing) = self.load(path) {
            return existing;
        }

        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(path.to_string())
                .or_insert_with(|| {
                    tracing::trace!(path, "caching directory entry");
                    entry
                }),
        )
    }

    /// Number of cached directories.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
