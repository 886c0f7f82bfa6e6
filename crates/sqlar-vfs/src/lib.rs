//! # sqlar-vfs
//!
//! Read-only virtual filesystem over SQLite Archive (`sqlar`) tables.
//!
//! A sqlar table is flat: one row per archived file, keyed by its full path.
//! Directories only exist when the archiver happened to write a row for them.
//! This crate recovers the tree:
//!
//! - [`SqlarFs`] - stat, list and open with permission-checked traversal,
//!   directories synthesized from path prefixes, and lazily inflated content
//! - [`store`] - the queries the filesystem needs, over SQLite or in memory
//! - [`vfs`] - async path-based interface for services
//! - [`config`] - construction options, loadable from RON
//!
//! ```no_run
//! use std::io::Read;
//! use sqlar_vfs::{FsConfig, SqlarFs};
//!
//! # fn main() -> sqlar_vfs::VfsResult<()> {
//! let fs = SqlarFs::from_path("site.sqlar", &FsConfig::default())?;
//! for entry in fs.list(".")? {
//!     println!("{entry}");
//! }
//! let mut file = fs.open("index.html")?.into_file()?;
//! let mut html = String::new();
//! file.read_to_string(&mut html)?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod store;
pub mod vfs;

pub use archive::{Dir, Entry, File, FileMode, FileType, Handle, PermMask, SqlarFs};
pub use config::{FsConfig, SqliteConfig};
pub use store::{ArchiveStore, MemoryStore, SqliteStore, StoreError};
pub use vfs::{ArchiveBackend, VfsError, VfsOps, VfsResult};
