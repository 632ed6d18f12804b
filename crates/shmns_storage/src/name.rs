//! Validated names for OS-visible shared objects.

use crate::error::{StorageError, StorageResult};
use std::fmt;

/// Longest name, in bytes, accepted for a segment or lock.
///
/// Matches `NAME_MAX` on Linux, which bounds the object created under
/// `/dev/shm`. Names are rejected, never truncated.
pub const MAX_NAME_LEN: usize = 255;

/// Returns why `name` cannot be used as an OS object name, or `None` if it can.
///
/// The same rules apply to namespace names, entry names and the value
/// segment names derived from them.
#[must_use]
pub fn invalid_name_reason(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("name must not be empty")
    } else if name.len() > MAX_NAME_LEN {
        Some("name must be at most 255 bytes")
    } else if name.contains('/') {
        Some("name must not contain '/'")
    } else if name.contains('\0') {
        Some("name must not contain NUL bytes")
    } else if name == "." || name == ".." {
        Some("name must not be '.' or '..'")
    } else {
        None
    }
}

/// A length-checked name for a shared memory segment or lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentName(String);

impl SegmentName {
    /// Validates `name` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if the name is empty, longer than
    /// [`MAX_NAME_LEN`] bytes, or contains characters the OS reserves.
    pub fn new(name: impl Into<String>) -> StorageResult<Self> {
        let name = name.into();
        match invalid_name_reason(&name) {
            Some(reason) => Err(StorageError::invalid_name(name, reason)),
            None => Ok(Self(name)),
        }
    }

    /// Returns the name as given by the caller.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name passed to `shm_open`/`shm_unlink`.
    #[cfg(unix)]
    pub(crate) fn os_name(&self) -> String {
        format!("/{}", self.0)
    }

    /// File name of the object on targets without POSIX shared memory.
    #[cfg(not(unix))]
    pub(crate) fn file_stem(&self) -> String {
        let mut stem = String::with_capacity(self.0.len());
        for c in self.0.chars() {
            match c {
                '<' | '>' | ':' | '"' | '\\' | '|' | '?' | '*' | '%' => {
                    stem.push_str(&format!("%{:02X}", c as u32));
                }
                _ => stem.push(c),
            }
        }
        stem
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SegmentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
