//! Error types for shmns core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in namespace operations.
///
/// A full namespace and a missing entry are not errors: `add`/`set` report
/// the former as `Ok(false)`, lookups report the latter as `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A segment or lock could not be created, mapped, locked or removed.
    #[error("storage error: {0}")]
    Storage(#[from] shmns_storage::StorageError),

    /// A namespace or entry name was rejected.
    #[error("invalid name `{name}`: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An argument is out of range.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The shared directory does not hold a valid namespace table.
    #[error("invalid namespace directory: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The directory lists an entry whose value segment no longer exists.
    #[error("value segment for entry `{entry}` is missing")]
    MissingValue {
        /// The entry name.
        entry: String,
    },

    /// Every lock acquired during open had already been retired by a
    /// closing process.
    #[error("namespace `{name}` was torn down during open {attempts} times")]
    StaleLock {
        /// The namespace name.
        name: String,
        /// How many times open was attempted.
        attempts: u32,
    },

    /// The container handle has been closed.
    #[error("container is closed")]
    Closed,
}

impl CoreError {
    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if the OS failed to provide a segment or lock.
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
