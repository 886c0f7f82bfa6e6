//! The archive filesystem.
//!
//! [`SqlarFs`] presents a flat sqlar table as a directory tree:
//!
//! - [`SqlarFs::stat`] resolves a path, checking the traverse bit of every
//!   ancestor and synthesizing directories that only exist as path prefixes.
//! - [`SqlarFs::list`] returns a directory's children, sorted by name.
//! - [`SqlarFs::open`] returns a lazily decoded [`File`] or a [`Dir`] handle.
//!
//! Paths are unrooted and `/`-separated; the top level is `.`.
//!
//! ## Caching
//!
//! Resolved directories are memoized for the lifetime of the handle and
//! shared by every clone of it. Files are not cached. The backing table is
//! assumed immutable while the handle is open.

pub mod cache;
pub mod entry;
mod file;
pub mod mode;
pub mod path;
pub mod perm;
mod readdir;
mod resolve;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

pub use cache::DirCache;
pub use entry::Entry;
pub use file::{Dir, File, Handle};
pub use mode::{FileMode, FileType};
pub use perm::PermMask;
pub use resolve::Resolution;

use crate::config::FsConfig;
use crate::store::{ArchiveStore, SqliteStore};
use crate::vfs::{VfsError, VfsResult};

/// Read-only filesystem handle over an archive store.
///
/// Cheap to clone; clones share the store and the directory cache.
#[derive(Clone)]
pub struct SqlarFs {
    store: Arc<dyn ArchiveStore>,
    perm_mask: PermMask,
    dirs: Arc<DirCache>,
}

impl std::fmt::Debug for SqlarFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlarFs")
            .field("perm_mask", &self.perm_mask)
            .field("cached_dirs", &self.dirs.len())
            .finish_non_exhaustive()
    }
}

impl SqlarFs {
    /// Filesystem over `store` honoring every permission triad.
    pub fn new(store: impl ArchiveStore + 'static) -> Self {
        Self::with_perm_mask(store, PermMask::default())
    }

    pub fn with_perm_mask(store: impl ArchiveStore + 'static, perm_mask: PermMask) -> Self {
        Self::from_store(Arc::new(store), perm_mask)
    }

    /// Filesystem over a shared store.
    pub fn from_store(store: Arc<dyn ArchiveStore>, perm_mask: PermMask) -> Self {
        Self {
            store,
            perm_mask,
            dirs: Arc::new(DirCache::new()),
        }
    }

    pub fn with_config(store: impl ArchiveStore + 'static, config: &FsConfig) -> Self {
        Self::with_perm_mask(store, config.perm_mask)
    }

    /// Open a sqlar file on disk, read-only.
    pub fn from_path<P: AsRef<Path>>(path: P, config: &FsConfig) -> VfsResult<Self> {
        let path = path.as_ref();
        let store = SqliteStore::open(path, &config.sqlite)
            .map_err(|e| VfsError::store(path.display().to_string(), e))?;
        tracing::debug!(path = %path.display(), perm_mask = %config.perm_mask, "opened archive");
        Ok(Self::with_config(store, config))
    }

    pub fn perm_mask(&self) -> PermMask {
        self.perm_mask
    }

    /// Number of directories resolved so far.
    pub fn cached_dirs(&self) -> usize {
        self.dirs.len()
    }

    /// Metadata for `path`.
    ///
    /// Requires the traverse bit on every ancestor, but nothing on the leaf.
    #[tracing::instrument(skip(self), name = "sqlar.stat", level = "debug")]
    pub fn stat(&self, path: &str) -> VfsResult<Arc<Entry>> {
        validate(path)?;
        self.resolve(path)
    }

    /// Children of the directory at `path`, sorted by name.
    #[tracing::instrument(skip(self), name = "sqlar.list", level = "debug")]
    pub fn list(&self, path: &str) -> VfsResult<Vec<Arc<Entry>>> {
        validate(path)?;
        let dir = self.resolve(path)?;
        self.list_resolved(path, &dir)
    }

    /// Open `path` for reading.
    ///
    /// Regular files need their own read bit. Directories are checked when
    /// first enumerated.
    #[tracing::instrument(skip(self), name = "sqlar.open", level = "debug")]
    pub fn open(&self, path: &str) -> VfsResult<Handle> {
        validate(path)?;
        let entry = self.resolve(path)?;
        if entry.is_dir() {
            return Ok(Handle::Dir(Dir::new(self.clone(), path, entry)));
        }
        if !self.perm_mask.can_read(entry.perm()) {
            return Err(VfsError::permission_denied(path));
        }
        Ok(Handle::File(File::new(Arc::clone(&self.store), path, entry)))
    }

    /// Whole decoded content of the regular file at `path`.
    pub fn read_file(&self, path: &str) -> VfsResult<Vec<u8>> {
        let mut file = self.open(path)?.into_file()?;
        let mut buf = Vec::with_capacity(usize::try_from(file.stat().size()).unwrap_or(0));
        file.read_to_end(&mut buf).map_err(VfsError::from_io)?;
        file.close();
        Ok(buf)
    }
}

fn validate(path: &str) -> VfsResult<()> {
    if path::is_valid(path) {
        Ok(())
    } else {
        Err(VfsError::invalid_path(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Barrier;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    fn names(entries: &[Arc<Entry>]) -> Vec<String> {
        entries.iter().map(|e| e.name().to_string()).collect()
    }

    fn sample() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_file("a.txt", 0o644, 1_700_000_000, b"aaaa");
        store.insert_file("sub/b.txt", 0o644, 1_700_000_001, b"bbbb");
        store
    }

    #[test]
    fn test_list_and_stat_synthesized() {
        init_tracing();
        let fs = SqlarFs::new(sample());

        assert_eq!(names(&fs.list(".").unwrap()), vec!["a.txt", "sub"]);

        let sub = fs.stat("sub").unwrap();
        assert!(sub.is_dir());
        assert!(sub.is_synthesized());
        assert_eq!(sub.perm(), 0o555);
        assert_eq!(sub.size(), 0);
        assert_eq!(sub.mtime_secs(), 0);

        assert_eq!(names(&fs.list("sub").unwrap()), vec!["b.txt"]);
    }

    #[test]
    fn test_stat_twice_consistent() {
        let fs = SqlarFs::new(sample());
        for p in [".", "a.txt", "sub", "sub/b.txt"] {
            let first = fs.stat(p).unwrap();
            let second = fs.stat(p).unwrap();
            assert_eq!(first, second, "{p}");
        }
    }

    #[test]
    fn test_invalid_paths() {
        let fs = SqlarFs::new(sample());
        for p in ["", "/a.txt", "sub/", "a//b", "sub/../a.txt", "./a.txt"] {
            assert!(matches!(fs.stat(p), Err(VfsError::InvalidPath(_))), "{p:?}");
        }
    }

    #[test]
    fn test_not_found() {
        let fs = SqlarFs::new(sample());
        assert!(fs.stat("nope").unwrap_err().is_not_found());
        assert!(fs.stat("sub/nope").unwrap_err().is_not_found());
        // parent is a file
        assert!(matches!(fs.stat("a.txt/x"), Err(VfsError::NotFound(p)) if p == "a.txt/x"));
    }

    #[test]
    fn test_list_file_is_not_a_directory() {
        let fs = SqlarFs::new(sample());
        assert!(matches!(fs.list("a.txt"), Err(VfsError::NotADirectory(_))));
    }

    #[test]
    fn test_explicit_dir_listed_once() {
        let store = sample();
        store.insert_dir("sub", 0o750, 42);
        let fs = SqlarFs::new(store);

        let root = fs.list(".").unwrap();
        assert_eq!(names(&root), vec!["a.txt", "sub"]);
        assert_eq!(root[1].perm(), 0o750);
        assert_eq!(root[1].mtime_secs(), 42);
        assert!(Arc::ptr_eq(&root[1], &fs.stat("sub").unwrap()));
    }

    #[test]
    fn test_empty_archive_root() {
        let fs = SqlarFs::new(MemoryStore::new());
        let root = fs.stat(".").unwrap();
        assert!(root.is_dir());
        assert_eq!(root.name(), ".");
        assert!(fs.list(".").unwrap().is_empty());
    }

    #[test]
    fn test_empty_explicit_dir() {
        let store = MemoryStore::new();
        store.insert_dir("empty", 0o755, 0);
        let fs = SqlarFs::new(store);
        assert!(fs.list("empty").unwrap().is_empty());
    }

    #[test]
    fn test_explicit_root_row() {
        let store = sample();
        store.insert_dir(".", 0o700, 7);
        let fs = SqlarFs::new(store);

        let root = fs.stat(".").unwrap();
        assert_eq!(root.perm(), 0o700);
        assert!(!root.is_synthesized());
        assert_eq!(names(&fs.list(".").unwrap()), vec!["a.txt", "sub"]);
    }

    #[test]
    fn test_shadowed_file_becomes_directory() {
        let store = MemoryStore::new();
        store.insert_file("a", 0o644, 0, b"file");
        store.insert_file("a/b", 0o644, 0, b"deeper");
        let fs = SqlarFs::new(store);

        let a = fs.stat("a").unwrap();
        assert!(a.is_dir());
        let root = fs.list(".").unwrap();
        assert_eq!(root.len(), 1);
        assert!(root[0].is_dir());
    }

    #[test]
    fn test_permission_round_trip() {
        let build = || {
            let store = MemoryStore::new();
            store.insert_dir("private", 0o700, 0);
            store.insert_file("private/x.txt", 0o600, 0, b"x");
            store.insert_file("mine.txt", 0o600, 0, b"m");
            store
        };

        let fs = SqlarFs::with_perm_mask(build(), PermMask::Other);
        // traverse denied at the ancestor
        match fs.stat("private/x.txt") {
            Err(VfsError::PermissionDenied(p)) => assert_eq!(p, "private"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(fs.list("private").unwrap_err().is_permission_denied());
        // stat needs nothing on the leaf, reading does
        assert!(fs.stat("mine.txt").is_ok());
        assert!(fs.open("mine.txt").unwrap_err().is_permission_denied());

        let fs = SqlarFs::with_perm_mask(build(), PermMask::Any);
        assert_eq!(fs.read_file("private/x.txt").unwrap(), b"x");
        assert_eq!(fs.read_file("mine.txt").unwrap(), b"m");
        assert_eq!(names(&fs.list("private").unwrap()), vec!["x.txt"]);
    }

    #[test]
    fn test_owner_mask_on_group_only_bits() {
        let store = MemoryStore::new();
        store.insert_dir("shared", 0o070, 0);
        store.insert_file("shared/f", 0o040, 0, b"f");
        let fs = SqlarFs::with_perm_mask(store, PermMask::Owner);
        assert!(fs.stat("shared/f").unwrap_err().is_permission_denied());

        let store = MemoryStore::new();
        store.insert_dir("shared", 0o070, 0);
        store.insert_file("shared/f", 0o040, 0, b"f");
        let fs = SqlarFs::with_perm_mask(store, PermMask::Group);
        assert_eq!(fs.read_file("shared/f").unwrap(), b"f");
    }

    #[test]
    fn test_read_raw_and_compressed() {
        let store = sample();
        let text = b"compressible ".repeat(64);
        store.insert_compressed("sub/big.txt", 0o644, 0, &text).unwrap();
        store.insert_raw("sub/null", 0o100644, 0, 0, None);
        let fs = SqlarFs::new(store);

        assert_eq!(fs.read_file("a.txt").unwrap(), b"aaaa");
        assert_eq!(fs.read_file("sub/big.txt").unwrap(), text);
        assert!(fs.read_file("sub/null").unwrap().is_empty());
        assert!(matches!(fs.read_file("sub"), Err(VfsError::IsADirectory(_))));
    }

    #[test]
    fn test_corrupt_payload() {
        let store = MemoryStore::new();
        store.insert_raw("bad", 0o100644, 0, 100, Some(vec![0xde, 0xad, 0xbe, 0xef]));
        let fs = SqlarFs::new(store);
        assert!(matches!(fs.read_file("bad"), Err(VfsError::Corrupt { .. })));
    }

    #[test]
    fn test_file_handle_lifecycle() {
        let fs = SqlarFs::new(sample());
        let mut file = fs.open("sub/b.txt").unwrap().into_file().unwrap();
        assert_eq!(file.stat().size(), 4);

        let mut buf = [0u8; 2];
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"bb");
        let mut rest = Vec::new();
        file.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"bb");
        assert_eq!(file.read(&mut buf).unwrap(), 0);

        file.close();
        file.close();
        assert!(file.is_closed());
        let err = file.read(&mut buf).unwrap_err();
        let inner = err.get_ref().unwrap().downcast_ref::<VfsError>().unwrap();
        assert!(matches!(inner, VfsError::Closed(p) if p == "sub/b.txt"));
    }

    #[test]
    fn test_close_unread_file() {
        let fs = SqlarFs::new(sample());
        let mut handle = fs.open("a.txt").unwrap();
        handle.close();
        let mut file = handle.into_file().unwrap();
        assert!(file.read(&mut [0u8; 4]).is_err());
    }

    #[test]
    fn test_dir_handle_batches() {
        let store = MemoryStore::new();
        for name in ["d/e", "d/a", "d/c", "d/b/x"] {
            store.insert_file(name, 0o644, 0, b"");
        }
        let fs = SqlarFs::new(store);
        let mut dir = fs.open("d").unwrap().into_dir().unwrap();
        assert_eq!(dir.stat().name(), "d");

        assert_eq!(names(&dir.read_dir(3).unwrap()), vec!["a", "b", "c"]);
        assert_eq!(names(&dir.read_dir(0).unwrap()), vec!["e"]);
        assert!(dir.read_dir(2).unwrap().is_empty());

        dir.close();
        assert!(matches!(dir.read_dir(1), Err(VfsError::Closed(_))));
        assert!(matches!(
            fs.open("d/a").unwrap().into_dir(),
            Err(VfsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_concurrent_stat_shares_entry() {
        let store = MemoryStore::new();
        store.insert_file("deep/tree/leaf.txt", 0o644, 0, b"leaf");
        let fs = SqlarFs::new(store);
        let threads = 8;
        let barrier = Barrier::new(threads);

        let results: Vec<Arc<Entry>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let fs = fs.clone();
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        fs.stat("deep/tree").unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for r in &results {
            assert!(Arc::ptr_eq(r, &results[0]));
        }
        assert!(Arc::ptr_eq(&results[0], &fs.stat("deep/tree").unwrap()));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("test.sqlar");
        {
            let conn = rusqlite::Connection::open(&db).unwrap();
            conn.execute_batch(crate::store::SQLAR_SCHEMA).unwrap();
            conn.execute(
                "INSERT INTO sqlar(name, mode, mtime, sz, data) VALUES ('docs/readme', 33188, 0, 4, X'74657374')",
                rusqlite::params![],
            )
            .unwrap();
        }

        let config = FsConfig::from_ron("(perm_mask: owner, sqlite: (immutable: true))").unwrap();
        let fs = SqlarFs::from_path(&db, &config).unwrap();
        assert_eq!(fs.perm_mask(), PermMask::Owner);
        assert_eq!(fs.read_file("docs/readme").unwrap(), b"test");
        assert_eq!(fs.cached_dirs(), 2);

        let missing = SqlarFs::from_path(dir.path().join("missing.sqlar"), &FsConfig::default());
        assert!(matches!(missing, Err(VfsError::Store { .. })));
    }

    #[test]
    fn test_sqlite_archive_end_to_end() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        init_tracing();
        // zlib output of a 4 byte file is longer than 4 bytes, so it reads as compressed
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"aaaa").unwrap();
        let packed = enc.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("site.sqlar");
        {
            let conn = rusqlite::Connection::open(&db).unwrap();
            conn.execute_batch(crate::store::SQLAR_SCHEMA).unwrap();
            let insert = "INSERT INTO sqlar(name, mode, mtime, sz, data) VALUES (?1, 33188, 1700000000, ?2, ?3)";
            conn.execute(insert, rusqlite::params!["a.txt", 4, packed]).unwrap();
            conn.execute(insert, rusqlite::params!["sub/b.txt", 4, b"bbbb".to_vec()]).unwrap();
            // a row whose name is not UTF-8 must not break its siblings
            conn.execute(
                "INSERT INTO sqlar VALUES (CAST(X'7375622FFF' AS TEXT), 33188, 0, 1, X'41')",
                rusqlite::params![],
            )
            .unwrap();
        }

        let fs = SqlarFs::from_path(&db, &FsConfig::default()).unwrap();
        assert_eq!(names(&fs.list(".").unwrap()), vec!["a.txt", "sub"]);

        let sub = fs.stat("sub").unwrap();
        assert!(sub.is_dir());
        assert!(sub.is_synthesized());
        assert_eq!(sub.perm(), 0o555);

        assert_eq!(names(&fs.list("sub").unwrap()), vec!["b.txt"]);
        assert_eq!(fs.read_file("sub/b.txt").unwrap(), b"bbbb");
        assert_eq!(fs.read_file("a.txt").unwrap(), b"aaaa");
        assert_eq!(fs.stat("a.txt").unwrap().size(), 4);
    }
}
