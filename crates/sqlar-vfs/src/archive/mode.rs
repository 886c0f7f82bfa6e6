//! Mode bit decoding.
//!
//! The `mode` column of a sqlar table holds the raw `st_mode` of the archived
//! file: Unix `S_IF*` node type bits combined with the permission triad. Only
//! regular files and directories are meaningful here; anything else is a
//! broken row and never leaves the store layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mask of the node type bits.
pub const S_IFMT: u32 = 0o170000;
/// Directory node type.
pub const S_IFDIR: u32 = 0o040000;
/// Regular file node type.
pub const S_IFREG: u32 = 0o100000;

/// Permission triad bits (owner/group/other x read/write/execute).
pub const PERM_BITS: u32 = 0o777;

/// Mode of every synthesized directory: read + traverse for everyone, no write.
pub const SYNTHESIZED_DIR_MODE: u32 = S_IFDIR | 0o555;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    fn type_bits(self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }
}

/// A validated mode word.
///
/// Construction goes through [`FileMode::from_raw`], which guarantees the type
/// bits name exactly one of regular file or directory, so the type is fixed
/// for the lifetime of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMode(u32);

impl FileMode {
    /// Mode for a synthesized directory (`S_IFDIR | 0555`).
    pub const SYNTHESIZED_DIR: FileMode = FileMode(SYNTHESIZED_DIR_MODE);

    /// Validate raw bits as stored in the archive.
    ///
    /// Returns `None` for values outside the `u32` range and for type bits
    /// that are neither `S_IFREG` nor `S_IFDIR` (no type, both, or another
    /// node kind such as a symlink).
    pub fn from_raw(raw: i64) -> Option<Self> {
        let bits = u32::try_from(raw).ok()?;
        match bits & S_IFMT {
            S_IFDIR | S_IFREG => Some(FileMode(bits)),
            _ => None,
        }
    }

    /// Build a mode from a type and permission bits.
    pub fn new(kind: FileType, perm: u32) -> Self {
        FileMode(kind.type_bits() | (perm & PERM_BITS))
    }

    /// The raw bits, unmodified.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// The node type.
    pub fn kind(&self) -> FileType {
        if self.0 & S_IFMT == S_IFDIR {
            FileType::Directory
        } else {
            FileType::File
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind().is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.kind().is_file()
    }

    /// Permission triad, with every bit outside `0o777` dropped.
    pub fn perm(&self) -> u32 {
        self.0 & PERM_BITS
    }
}

/// `ls -l` style rendering, e.g. `drwxr-xr-x` or `-rw-r--r--`.
impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RWX: &[u8; 3] = b"rwx";
        let mut out = String::with_capacity(10);
        out.push(if self.is_dir() { 'd' } else { '-' });
        let perm = self.perm();
        for bit in (0..9).rev() {
            if perm & (1 << bit) != 0 {
                out.push(RWX[2 - bit % 3] as char);
            } else {
                out.push('-');
            }
        }
        f.write_str(&out)
    }
}
