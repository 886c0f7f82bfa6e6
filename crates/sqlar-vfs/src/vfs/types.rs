//! Wire-friendly metadata types.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::archive::Entry;

pub use crate::archive::FileType;

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Uncompressed size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o644).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Number of hard links.
    pub nlink: u32,
}

impl FileAttr {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

impl From<&Entry> for FileAttr {
    fn from(entry: &Entry) -> Self {
        Self {
            size: entry.size(),
            kind: entry.kind(),
            perm: entry.perm(),
            mtime: entry.mtime(),
            nlink: if entry.is_dir() { 2 } else { 1 }, // . and ..
        }
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl From<&Entry> for DirEntry {
    fn from(entry: &Entry) -> Self {
        Self::new(entry.name(), entry.kind())
    }
}
