//! VFS error types.

use std::io;
use thiserror::Error;

use crate::store::StoreError;

/// VFS error type.
///
/// Every request-level failure carries the path it concerns.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path does not follow the archive path grammar.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Read or traverse bit excluded by the permission mask.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Operation on a closed handle.
    #[error("file already closed: {0}")]
    Closed(String),

    /// Stored payload does not decode to the declared content.
    #[error("corrupt payload for {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// The store reported an error.
    #[error("store error on {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a Closed error.
    pub fn closed(path: impl Into<String>) -> Self {
        Self::Closed(path.into())
    }

    /// Create a Corrupt error.
    pub fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a store failure with the path being resolved.
    pub fn store(path: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            path: path.into(),
            source,
        }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Recover a VfsError that was converted into an `io::Error`, e.g. by a
    /// [`File`](crate::archive::File) read. Other I/O errors are wrapped as-is.
    pub fn from_io(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<VfsError>()) {
            return Self::Io(e);
        }
        match e.into_inner().map(|inner| inner.downcast::<VfsError>()) {
            Some(Ok(vfs)) => *vfs,
            _ => Self::other("lost error while unwrapping I/O error"),
        }
    }

    /// Whether this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this is a PermissionDenied error.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// Convert VfsError to std::io::Error for compatibility.
///
/// The original error stays reachable through `get_ref`/`into_inner`.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        let kind = match &e {
            VfsError::InvalidPath(_) => io::ErrorKind::InvalidInput,
            VfsError::NotFound(_) => io::ErrorKind::NotFound,
            VfsError::PermissionDenied(_) => io::ErrorKind::PermissionDenied,
            VfsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            VfsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            VfsError::Corrupt { .. } => io::ErrorKind::InvalidData,
            VfsError::Config(_) => io::ErrorKind::InvalidInput,
            VfsError::Io(_) => return into_io(e),
            VfsError::Closed(_) | VfsError::Store { .. } | VfsError::Other(_) => {
                io::ErrorKind::Other
            }
        };
        io::Error::new(kind, e)
    }
}

fn into_io(e: VfsError) -> io::Error {
    match e {
        VfsError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
