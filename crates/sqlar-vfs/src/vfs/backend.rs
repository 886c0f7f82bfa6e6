//! [`VfsOps`] over an archive filesystem.

use async_trait::async_trait;
use std::io::{self, Read};
use std::path::Path;

use super::ops::VfsOps;
use super::types::{DirEntry, FileAttr};
use super::{VfsError, VfsResult};
use crate::archive::{path::ROOT, SqlarFs};

/// Serves a [`SqlarFs`] to async callers.
///
/// Every call runs on tokio's blocking pool, since the store may block on disk.
#[derive(Debug, Clone)]
pub struct ArchiveBackend {
    fs: SqlarFs,
}

impl ArchiveBackend {
    pub fn new(fs: SqlarFs) -> Self {
        Self { fs }
    }

    /// The wrapped filesystem.
    pub fn fs(&self) -> &SqlarFs {
        &self.fs
    }

    async fn blocking<T, F>(&self, path: &Path, f: F) -> VfsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SqlarFs, String) -> VfsResult<T> + Send + 'static,
    {
        let path = archive_path(path)?;
        let fs = self.fs.clone();
        tokio::task::spawn_blocking(move || f(fs, path))
            .await
            .map_err(|e| VfsError::other(format!("spawn_blocking: {e}")))?
    }
}

/// Convert a host path to archive path syntax.
fn archive_path(path: &Path) -> VfsResult<String> {
    let s = path
        .to_str()
        .ok_or_else(|| VfsError::invalid_path(path.to_string_lossy()))?;
    let s = s.trim_start_matches('/');
    if s.is_empty() {
        Ok(ROOT.to_string())
    } else {
        Ok(s.to_string())
    }
}

#[async_trait]
impl VfsOps for ArchiveBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        self.blocking(path, |fs, path| {
            fs.stat(&path).map(|entry| FileAttr::from(entry.as_ref()))
        })
        .await
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        self.blocking(path, |fs, path| {
            let entries = fs.list(&path)?;
            Ok(entries.iter().map(|e| DirEntry::from(e.as_ref())).collect())
        })
        .await
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        self.blocking(path, move |fs, path| {
            let mut file = fs.open(&path)?.into_file()?;
            if offset >= file.stat().size() {
                return Ok(Vec::new());
            }

            // decoders are forward-only
            io::copy(&mut file.by_ref().take(offset), &mut io::sink())
                .map_err(VfsError::from_io)?;
            let mut buf = Vec::with_capacity(size as usize);
            file.by_ref()
                .take(u64::from(size))
                .read_to_end(&mut buf)
                .map_err(VfsError::from_io)?;
            file.close();
            Ok(buf)
        })
        .await
    }

    /// One decode pass; chunked reads would re-inflate from the start each time.
    async fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        self.blocking(path, |fs, path| fs.read_file(&path)).await
    }
}
