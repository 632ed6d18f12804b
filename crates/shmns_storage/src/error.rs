//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while creating, mapping or locking shared objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred outside a named OS call.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The OS refused to create, size, map or remove a named object.
    #[error("{op} failed for `{name}`: {source}")]
    Os {
        /// The failing operation (`shm_open`, `ftruncate`, `mmap`, ...).
        op: &'static str,
        /// Name of the object involved.
        name: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A name cannot be used as an OS object name.
    #[error("invalid name `{name}`: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl StorageError {
    /// Creates an OS error for the named object.
    pub fn os(op: &'static str, name: impl Into<String>, source: io::Error) -> Self {
        Self::Os {
            op,
            name: name.into(),
            source,
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Returns the kind of the underlying I/O error, if any.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io(err) => Some(err.kind()),
            Self::Os { source, .. } => Some(source.kind()),
            Self::InvalidName { .. } => None,
        }
    }
}
