//! Filesystem configuration.
//!
//! Configuration is plain serde data so it can be embedded in a host's own
//! config file or loaded standalone from RON:
//!
//! ```ron
//! (
//!     perm_mask: owner,
//!     sqlite: (immutable: true),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::archive::perm::PermMask;
use crate::vfs::{VfsError, VfsResult};

/// Default capacity of the per-connection prepared statement cache.
pub const DEFAULT_STATEMENT_CACHE: usize = 16;

/// Options fixed at construction time of a filesystem handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Which permission triads are honored for read/traverse checks.
    pub perm_mask: PermMask,
    /// How the archive file is opened.
    pub sqlite: SqliteConfig,
}

/// SQLite connection options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Open with `immutable=1`: no locking, no change detection. Only safe
    /// when nothing writes to the file while it is open.
    pub immutable: bool,
    /// Prepared statement cache capacity.
    pub statement_cache: usize,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            immutable: false,
            statement_cache: DEFAULT_STATEMENT_CACHE,
        }
    }
}

impl FsConfig {
    /// Parse a RON document.
    pub fn from_ron(source: &str) -> VfsResult<Self> {
        ron::from_str(source).map_err(|e| VfsError::Config(e.to_string()))
    }

    /// Set the permission mask.
    pub fn with_perm_mask(mut self, perm_mask: PermMask) -> Self {
        self.perm_mask = perm_mask;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FsConfig::default();
        assert_eq!(config.perm_mask, PermMask::Any);
        assert!(!config.sqlite.immutable);
        assert_eq!(config.sqlite.statement_cache, DEFAULT_STATEMENT_CACHE);
    }

    #[test]
    fn test_from_ron() {
        let config = FsConfig::from_ron("(perm_mask: owner, sqlite: (immutable: true))").unwrap();
        assert_eq!(config.perm_mask, PermMask::Owner);
        assert!(config.sqlite.immutable);
        assert_eq!(config.sqlite.statement_cache, DEFAULT_STATEMENT_CACHE);

        let empty = FsConfig::from_ron("()").unwrap();
        assert_eq!(empty, FsConfig::default());
    }

    #[test]
    fn test_from_ron_rejects_unknown_mask() {
        let err = FsConfig::from_ron("(perm_mask: world)").unwrap_err();
        assert!(matches!(err, VfsError::Config(_)));
    }
}
