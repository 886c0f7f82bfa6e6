//! Open handles.
//!
//! A [`File`] fetches its payload on the first read, by row id, and picks a
//! decoder once: payloads whose length matches the declared size are stored
//! raw, anything else is inflated. Reads are forward-only.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use super::entry::Entry;
use super::SqlarFs;
use crate::store::ArchiveStore;
use crate::vfs::{VfsError, VfsResult};

type Payload = Box<dyn Read + Send>;

enum ReadState {
    /// Payload not fetched yet.
    Unread,
    Streaming(Payload),
    /// Payload fully consumed; reads return EOF.
    Drained,
    Closed,
}

/// A regular file opened for reading.
///
/// Not meant to be shared between callers; each `open` gets its own handle.
pub struct File {
    store: Arc<dyn ArchiveStore>,
    path: String,
    entry: Arc<Entry>,
    state: ReadState,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            ReadState::Unread => "unread",
            ReadState::Streaming(_) => "streaming",
            ReadState::Drained => "drained",
            ReadState::Closed => "closed",
        };
        f.debug_struct("File")
            .field("path", &self.path)
            .field("entry", &self.entry)
            .field("state", &state)
            .finish()
    }
}

impl File {
    pub(crate) fn new(store: Arc<dyn ArchiveStore>, path: &str, entry: Arc<Entry>) -> Self {
        Self {
            store,
            path: path.to_string(),
            entry,
            state: ReadState::Unread,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Metadata the file was opened with.
    pub fn stat(&self) -> Arc<Entry> {
        Arc::clone(&self.entry)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ReadState::Closed)
    }

    /// Release the decoder. Safe to call repeatedly, or before any read.
    pub fn close(&mut self) {
        self.state = ReadState::Closed;
    }

    fn fetch(&self) -> VfsResult<Payload> {
        let id = self
            .entry
            .row_id()
            .ok_or_else(|| VfsError::not_found(&self.path))?;
        let blob = self
            .store
            .fetch_blob(id)
            .map_err(|e| VfsError::store(&self.path, e))?
            .ok_or_else(|| VfsError::not_found(&self.path))?;
        Ok(decoder(&self.path, blob, self.entry.size()))
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match &mut self.state {
                ReadState::Closed => return Err(VfsError::closed(&self.path).into()),
                ReadState::Drained => return Ok(0),
                ReadState::Unread => {
                    let payload = self.fetch()?;
                    self.state = ReadState::Streaming(payload);
                }
                ReadState::Streaming(payload) => {
                    let n = payload.read(buf)?;
                    if n == 0 && !buf.is_empty() {
                        self.state = ReadState::Drained;
                    }
                    return Ok(n);
                }
            }
        }
    }
}

/// Select the decoder for a fetched payload.
pub(crate) fn decoder(path: &str, blob: Vec<u8>, size: u64) -> Payload {
    if blob.len() as u64 == size {
        tracing::debug!(path, size, "payload stored raw");
        return Box::new(Cursor::new(blob));
    }

    tracing::debug!(path, stored = blob.len(), size, "inflating payload");
    if has_zlib_header(&blob) {
        Box::new(Exact::new(path, ZlibDecoder::new(Cursor::new(blob)), size))
    } else {
        Box::new(Exact::new(path, DeflateDecoder::new(Cursor::new(blob)), size))
    }
}

/// RFC 1950 header: deflate method, window <= 32K, check bits valid.
fn has_zlib_header(blob: &[u8]) -> bool {
    match blob {
        [cmf, flg, ..] => {
            cmf & 0x0f == 8 && cmf >> 4 <= 7 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}

/// Fails the stream unless it yields exactly the declared number of bytes.
struct Exact<R> {
    path: String,
    inner: R,
    remaining: u64,
}

impl<R: Read> Exact<R> {
    fn new(path: &str, inner: R, size: u64) -> Self {
        Self {
            path: path.to_string(),
            inner,
            remaining: size,
        }
    }

    fn corrupt(&self, reason: String) -> io::Error {
        VfsError::corrupt(&self.path, reason).into()
    }
}

impl<R: Read> Read for Exact<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self
            .inner
            .read(buf)
            .map_err(|e| self.corrupt(format!("inflate: {e}")))?;
        if n == 0 && self.remaining > 0 {
            return Err(self.corrupt(format!("{} bytes short of declared size", self.remaining)));
        }
        if n as u64 > self.remaining {
            return Err(self.corrupt("longer than declared size".to_string()));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// A directory opened for enumeration.
#[derive(Debug)]
pub struct Dir {
    fs: SqlarFs,
    path: String,
    entry: Arc<Entry>,
    /// Entries not yet returned; `None` until the first read.
    pending: Option<VecDeque<Arc<Entry>>>,
    closed: bool,
}

impl Dir {
    pub(crate) fn new(fs: SqlarFs, path: &str, entry: Arc<Entry>) -> Self {
        Self {
            fs,
            path: path.to_string(),
            entry,
            pending: None,
            closed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stat(&self) -> Arc<Entry> {
        Arc::clone(&self.entry)
    }

    /// Return up to `n` further entries in name order (`n == 0`: all that
    /// remain). An empty batch means the listing is exhausted.
    pub fn read_dir(&mut self, n: usize) -> VfsResult<Vec<Arc<Entry>>> {
        if self.closed {
            return Err(VfsError::closed(&self.path));
        }
        let pending = match &mut self.pending {
            Some(pending) => pending,
            None => {
                let listed = self.fs.list_resolved(&self.path, &self.entry)?;
                self.pending.insert(listed.into())
            }
        };
        let take = if n == 0 { pending.len() } else { n.min(pending.len()) };
        Ok(pending.drain(..take).collect())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.pending = None;
    }
}

/// Result of [`SqlarFs::open`].
#[derive(Debug)]
pub enum Handle {
    File(File),
    Dir(Dir),
}

impl Handle {
    pub fn stat(&self) -> Arc<Entry> {
        match self {
            Handle::File(f) => f.stat(),
            Handle::Dir(d) => d.stat(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    pub fn close(&mut self) {
        match self {
            Handle::File(f) => f.close(),
            Handle::Dir(d) => d.close(),
        }
    }

    /// The file handle, or `IsADirectory`.
    pub fn into_file(self) -> VfsResult<File> {
        match self {
            Handle::File(f) => Ok(f),
            Handle::Dir(d) => Err(VfsError::is_a_directory(d.path)),
        }
    }

    /// The directory handle, or `NotADirectory`.
    pub fn into_dir(self) -> VfsResult<Dir> {
        match self {
            Handle::Dir(d) => Ok(d),
            Handle::File(f) => Err(VfsError::not_a_directory(f.path)),
        }
    }
}
