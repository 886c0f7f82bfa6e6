//! Filesystem entries.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::mode::{FileMode, FileType};
use super::path::ROOT;
use crate::store::{Row, RowId};

/// Metadata of one node of the virtual tree.
///
/// Content is not part of an entry; it is fetched on demand through
/// [`File`](super::File).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    mode: FileMode,
    mtime: i64,
    size: u64,
    id: Option<RowId>,
}

impl Entry {
    /// Entry for an explicit row, named by its base name.
    pub fn from_row(name: impl Into<String>, row: &Row) -> Self {
        Self {
            name: name.into(),
            mode: row.mode,
            mtime: row.mtime,
            size: row.size,
            id: Some(row.id),
        }
    }

    /// A directory with no backing row.
    pub fn synthesized_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: FileMode::SYNTHESIZED_DIR,
            mtime: 0,
            size: 0,
            id: None,
        }
    }

    /// The synthesized top level, used when the archive has no root row.
    pub fn synthesized_root() -> Self {
        Self::synthesized_dir(ROOT)
    }

    /// Base name (last path segment), or `.` for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn kind(&self) -> FileType {
        self.mode.kind()
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.mode.is_file()
    }

    /// Permission triad.
    pub fn perm(&self) -> u32 {
        self.mode.perm()
    }

    /// Modification time in seconds since the epoch.
    pub fn mtime_secs(&self) -> i64 {
        self.mtime
    }

    /// Modification time.
    pub fn mtime(&self) -> SystemTime {
        let secs = Duration::from_secs(self.mtime.unsigned_abs());
        if self.mtime >= 0 {
            UNIX_EPOCH + secs
        } else {
            UNIX_EPOCH - secs
        }
    }

    /// Uncompressed size in bytes; 0 for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Backing row, `None` for synthesized directories.
    pub fn row_id(&self) -> Option<RowId> {
        self.id
    }

    pub fn is_synthesized(&self) -> bool {
        self.id.is_none()
    }
}

/// `ls -l` style line: mode, size, mtime and name.
impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>10} {:>12} {}",
            self.mode, self.size, self.mtime, self.name
        )?;
        if self.is_dir() {
            f.write_str("/")?;
        }
        Ok(())
    }
}
