//! Path resolution (stat).
//!
//! Resolution walks from the root down, checking the traverse bit of every
//! ancestor. Ancestors are directories, so after the first walk each level is
//! a cache hit and only the leaf costs store round trips.

use std::sync::Arc;

use super::entry::Entry;
use super::path::{self, ROOT};
use super::SqlarFs;
use crate::store::{Row, ROOT_NAME};
use crate::vfs::{VfsError, VfsResult};

/// How a path with no cached entry came to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Backed by its own row.
    Explicit(Row),
    /// A directory implied by deeper rows.
    Synthesized,
}

impl Resolution {
    /// Apply the precedence rule: an explicit row always wins, and the
    /// descendant probe only runs when there is none.
    pub fn reconcile<E>(
        explicit: Option<Row>,
        has_descendants: impl FnOnce() -> Result<bool, E>,
    ) -> Result<Option<Self>, E> {
        match explicit {
            Some(row) => Ok(Some(Resolution::Explicit(row))),
            None => Ok(has_descendants()?.then_some(Resolution::Synthesized)),
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, Resolution::Synthesized)
    }

    /// Materialize the entry under its base name.
    pub fn into_entry(self, name: &str) -> Entry {
        match self {
            Resolution::Explicit(row) => Entry::from_row(name, &row),
            Resolution::Synthesized => Entry::synthesized_dir(name),
        }
    }
}

impl SqlarFs {
    /// Resolve the archive top level, from its `.` row if there is one.
    pub(crate) fn resolve_root(&self) -> VfsResult<Arc<Entry>> {
        if let Some(root) = self.dirs.load(ROOT) {
            return Ok(root);
        }

        let row = self
            .store
            .lookup(ROOT_NAME)
            .map_err(|e| VfsError::store(ROOT, e))?;
        let entry = match row {
            Some(row) if row.mode.is_dir() => Entry::from_row(ROOT, &row),
            Some(row) => {
                tracing::warn!(mode = %row.mode, "root row is not a directory, ignoring it");
                Entry::synthesized_root()
            }
            None => Entry::synthesized_root(),
        };
        Ok(self.dirs.store(ROOT, Arc::new(entry)))
    }

    /// Resolve a grammatically valid path.
    ///
    /// Errors name the path component that failed: the ancestor for a missing
    /// traverse bit, the requested path otherwise.
    pub(crate) fn resolve(&self, path: &str) -> VfsResult<Arc<Entry>> {
        if path == ROOT {
            return self.resolve_root();
        }

        let (parent, name) = path::split(path);
        let dir = self.resolve(parent)?;
        if !dir.is_dir() {
            return Err(VfsError::not_found(path));
        }
        if !self.perm_mask.can_traverse(dir.perm()) {
            return Err(VfsError::permission_denied(parent));
        }

        if let Some(cached) = self.dirs.load(path) {
            return Ok(cached);
        }

        let explicit = self
            .store
            .lookup(path)
            .map_err(|e| VfsError::store(path, e))?;
        let resolution = Resolution::reconcile(explicit, || {
            self.store
                .has_descendants(&path::child_prefix(path))
                .map_err(|e| VfsError::store(path, e))
        })?
        .ok_or_else(|| VfsError::not_found(path))?;

        if resolution.is_synthesized() {
            tracing::debug!(path, "synthesized directory from descendants");
        }

        let entry = Arc::new(resolution.into_entry(name));
        if entry.is_dir() {
            Ok(self.dirs.store(path, entry))
        } else {
            Ok(entry)
        }
    }
}
