//! In-memory archive table.
//!
//! Used for testing and for building small archives programmatically. Rows
//! keep their raw column values, so broken modes can be inserted on purpose.

use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Bound;
use std::sync::atomic::{AtomicI64, Ordering};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::RwLock;

use super::{ArchiveStore, Children, Row, RowId, StoreError, StoreResult, ROOT_NAME};
use crate::archive::mode::{S_IFDIR, S_IFMT, S_IFREG};

#[derive(Debug, Clone)]
struct RawRow {
    id: i64,
    mode: i64,
    mtime: i64,
    sz: i64,
    data: Option<Vec<u8>>,
}

impl RawRow {
    fn valid_type(&self) -> bool {
        let kind = self.mode & i64::from(S_IFMT);
        kind == i64::from(S_IFDIR) || kind == i64::from(S_IFREG)
    }

    fn is_file(&self) -> bool {
        self.mode & i64::from(S_IFMT) == i64::from(S_IFREG)
    }
}

/// In-memory sqlar table keyed by row name.
///
/// Thread-safe via internal `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<String, RawRow>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row with raw column values. Replaces any row with the same name.
    pub fn insert_raw(
        &self,
        name: impl Into<String>,
        mode: i64,
        mtime: i64,
        sz: i64,
        data: Option<Vec<u8>>,
    ) -> RowId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.rows.write().insert(
            name.into(),
            RawRow {
                id,
                mode,
                mtime,
                sz,
                data,
            },
        );
        RowId(id)
    }

    /// Insert a regular file stored uncompressed.
    pub fn insert_file(&self, name: impl Into<String>, perm: u32, mtime: i64, data: &[u8]) -> RowId {
        self.insert_raw(
            name,
            i64::from(S_IFREG | perm),
            mtime,
            data.len() as i64,
            Some(data.to_vec()),
        )
    }

    /// Insert a regular file stored zlib-compressed, the way `sqlite3 -A` does.
    pub fn insert_compressed(
        &self,
        name: impl Into<String>,
        perm: u32,
        mtime: i64,
        data: &[u8],
    ) -> StoreResult<RowId> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| StoreError::Other(format!("compress: {e}")))?;
        let packed = encoder
            .finish()
            .map_err(|e| StoreError::Other(format!("compress: {e}")))?;
        Ok(self.insert_raw(
            name,
            i64::from(S_IFREG | perm),
            mtime,
            data.len() as i64,
            Some(packed),
        ))
    }

    /// Insert an explicit directory row.
    pub fn insert_dir(&self, name: impl Into<String>, perm: u32, mtime: i64) -> RowId {
        self.insert_raw(name, i64::from(S_IFDIR | perm), mtime, 0, None)
    }

    /// Number of rows, broken ones included.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Rows whose name starts with `prefix`, in name order.
    fn scan<'a>(
        rows: &'a BTreeMap<String, RawRow>,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a RawRow)> + 'a {
        rows.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(name, _)| name.starts_with(prefix))
    }

    fn shadowed(rows: &BTreeMap<String, RawRow>, name: &str, raw: &RawRow) -> bool {
        if !raw.is_file() {
            return false;
        }
        let prefix = format!("{name}/");
        Self::scan(rows, &prefix).any(|(_, r)| r.valid_type())
    }

    fn decode(name: &str, raw: &RawRow) -> Option<Row> {
        match Row::decode(raw.id, name.to_string(), raw.mode, raw.mtime, raw.sz) {
            Ok(row) => Some(row),
            Err(defect) => {
                tracing::warn!(name = %name, %defect, "skipping malformed sqlar row");
                None
            }
        }
    }
}

impl ArchiveStore for MemoryStore {
    fn lookup(&self, name: &str) -> StoreResult<Option<Row>> {
        let rows = self.rows.read();
        Ok(rows
            .get(name)
            .filter(|raw| raw.valid_type() && !Self::shadowed(&rows, name, raw))
            .and_then(|raw| Self::decode(name, raw)))
    }

    fn has_descendants(&self, prefix: &str) -> StoreResult<bool> {
        let rows = self.rows.read();
        Ok(Self::scan(&rows, prefix).any(|(name, raw)| name != ROOT_NAME && raw.valid_type()))
    }

    fn children(&self, prefix: &str) -> StoreResult<Children> {
        let rows = self.rows.read();
        let mut children = Children::default();
        for (name, raw) in Self::scan(&rows, prefix) {
            if !raw.valid_type() || name == ROOT_NAME {
                continue;
            }
            let rest = &name[prefix.len()..];
            match rest.find('/') {
                None if rest.is_empty() => {}
                None => {
                    if !Self::shadowed(&rows, name, raw) {
                        children.rows.extend(Self::decode(name, raw));
                    }
                }
                Some(0) => {}
                Some(end) => {
                    let segment = &rest[..end];
                    if children.subdirs.last().map(String::as_str) != Some(segment) {
                        children.subdirs.push(segment.to_string());
                    }
                }
            }
        }
        Ok(children)
    }

    fn fetch_blob(&self, id: RowId) -> StoreResult<Option<Vec<u8>>> {
        let rows = self.rows.read();
        Ok(rows
            .values()
            .find(|raw| raw.id == id.0 && raw.is_file())
            .map(|raw| raw.data.clone().unwrap_or_default()))
    }
}
