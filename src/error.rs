//! Error types for `index-copier`.

use std::path::PathBuf;

/// Result type for directory and cache operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors returned by the `index-copier` crate.
#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not supported (e.g. writes against a read-only directory).
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Lock acquisition failed (concurrent access conflict).
    #[error("lock failed on {resource}: {reason}")]
    LockFailed {
        /// What we were trying to lock (file path, in-memory map, etc.).
        resource: String,
        /// Human-readable reason (poisoned lock, OS error, etc.).
        reason: String,
    },

    /// File not found in a directory backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// Requested path does not exist.
    #[error("missing path: {0}")]
    MissingPath(PathBuf),

    /// The local cache directory for an index could not be created.
    ///
    /// Fatal for the factory: no wrapper is constructed.
    #[error("cannot create cache directory {path:?}: {source}")]
    CacheDir {
        /// Directory we tried to create.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl DirectoryError {
    /// Whether this is the read-only contract violation raised by caching wrappers.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, DirectoryError::NotSupported(_))
    }
}
