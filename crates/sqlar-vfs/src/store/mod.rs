//! Store collaborator contract.
//!
//! The filesystem core never issues ad-hoc queries; everything it needs from
//! the archive table goes through [`ArchiveStore`]. Implementations must filter
//! broken rows at the source so they never reach the core:
//!
//! - rows whose mode is not exactly one of regular file / directory;
//! - regular-file rows shadowed by deeper rows (`a` is a file but `a/b`
//!   exists). Such a path is a directory, inferred from its descendants.

mod memory;
mod row;
mod sqlite;

use thiserror::Error;

pub use memory::MemoryStore;
pub use row::{Row, RowDefect, RowId, ROW_ARITY};
pub use sqlite::{SqliteStore, SQLAR_SCHEMA};

/// Row name of an explicit root entry.
pub const ROOT_NAME: &str = ".";

/// Error reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Other store failure.
    #[error("{0}")]
    Other(String),
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;

/// Rows one level below a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    /// Explicit rows at depth exactly one.
    pub rows: Vec<Row>,
    /// Distinct first path segments of rows at depth two or more.
    pub subdirs: Vec<String>,
}

/// Logical queries over a sqlar table.
///
/// Directory prefixes passed to [`has_descendants`](Self::has_descendants)
/// and [`children`](Self::children) are either empty (the archive top level)
/// or end with `/`.
pub trait ArchiveStore: Send + Sync {
    /// Point lookup by exact row name, excluding broken rows.
    fn lookup(&self, name: &str) -> StoreResult<Option<Row>>;

    /// Whether any valid row's name starts with `prefix`.
    fn has_descendants(&self, prefix: &str) -> StoreResult<bool>;

    /// Depth-bounded listing below `prefix`.
    ///
    /// The root row ([`ROOT_NAME`]) is never reported as a child of the top level.
    fn children(&self, prefix: &str) -> StoreResult<Children>;

    /// Raw payload of a regular-file row. `None` if the row no longer exists
    /// or is not a regular file; a `NULL` payload is returned as empty.
    fn fetch_blob(&self, id: RowId) -> StoreResult<Option<Vec<u8>>>;
}

/// Exclusive upper bound of the name range covered by `prefix`.
///
/// `prefix` ends with `/`; swapping it for the next byte (`0`) bounds every
/// name that starts with `prefix` under binary collation.
pub(crate) fn prefix_upper_bound(prefix: &str) -> Option<String> {
    prefix
        .strip_suffix('/')
        .map(|stem| format!("{stem}0"))
}
