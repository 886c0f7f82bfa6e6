//! VFS operations trait.

use async_trait::async_trait;
use std::path::Path;

use super::types::{DirEntry, FileAttr};
use super::VfsResult;

/// Largest single [`VfsOps::read`] issued by [`VfsOps::read_all`].
pub const READ_ALL_CHUNK: u32 = 1 << 20;

/// Read-only VFS operations.
///
/// All operations are path-based (no inode numbers). Paths are relative to
/// the backend's root.
#[async_trait]
pub trait VfsOps: Send + Sync {
    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries, sorted by name.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read file contents.
    ///
    /// Reads up to `size` bytes starting at `offset`.
    /// Returns fewer bytes if EOF is reached.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool {
        true
    }

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Read entire file contents, in [`READ_ALL_CHUNK`] pieces.
    async fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let attr = self.getattr(path).await?;
        let mut data = Vec::with_capacity(usize::try_from(attr.size).unwrap_or(0));
        while (data.len() as u64) < attr.size {
            let chunk = self.read(path, data.len() as u64, READ_ALL_CHUNK).await?;
            if chunk.is_empty() {
                break;
            }
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}
