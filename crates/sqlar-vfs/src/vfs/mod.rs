//! Async, path-based filesystem interface.
//!
//! - [`VfsOps`] - read-only filesystem operations for async callers
//! - [`ArchiveBackend`] - [`VfsOps`] over a [`SqlarFs`](crate::archive::SqlarFs)
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: operations take paths. A leading `/` is
//!   accepted and the empty path or `/` means the archive top level.
//! - **Explicit offset/size**: reads are stateless, so no handle crosses the
//!   async boundary. Compressed payloads are forward-only, so a read at a
//!   nonzero offset decodes and discards the bytes before it.
//! - **Blocking store**: SQLite calls run on the blocking pool.

mod backend;
mod error;
mod ops;
mod types;

pub use backend::ArchiveBackend;
pub use error::{VfsError, VfsResult};
pub use ops::{VfsOps, READ_ALL_CHUNK};
pub use types::{DirEntry, FileAttr, FileType};
