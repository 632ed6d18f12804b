//! Namespace and entry names.
//!
//! Every OS object of a namespace is named after it:
//!
//! ```text
//! <namespace>           directory segment
//! <namespace>|          lock
//! <namespace>|<entry>   value of <entry>
//! ```
//!
//! Namespace names cannot contain `|` and entry names cannot be empty, so
//! these never collide, neither within a namespace nor across namespaces.

use crate::error::{CoreError, CoreResult};
use shmns_storage::{invalid_name_reason, SegmentName, MAX_NAME_LEN};
use std::fmt;

/// Separator between the namespace and entry parts of a value segment name.
pub const SEPARATOR: char = '|';

/// A validated namespace name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceName {
    segment: SegmentName,
}

impl NamespaceName {
    /// Validates a namespace name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidName`] if the name is not a valid segment
    /// name, contains [`SEPARATOR`], or leaves no room for the separator of
    /// the lock name (more than `MAX_NAME_LEN - 1` bytes).
    pub fn new(name: &str) -> CoreResult<Self> {
        if let Some(reason) = invalid_name_reason(name) {
            return Err(CoreError::invalid_name(name, reason));
        }
        if name.contains(SEPARATOR) {
            return Err(CoreError::invalid_name(
                name,
                "namespace name must not contain '|'",
            ));
        }
        if name.len() >= MAX_NAME_LEN {
            return Err(CoreError::invalid_name(
                name,
                "namespace name must be at most 254 bytes",
            ));
        }
        Ok(Self {
            segment: SegmentName::new(name)?,
        })
    }

    /// Returns the name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.segment.as_str()
    }

    /// Name of the directory segment.
    #[must_use]
    pub fn segment_name(&self) -> &SegmentName {
        &self.segment
    }

    /// Name of the lock guarding the directory.
    ///
    /// # Errors
    ///
    /// Never fails for a validated namespace name; the result type comes
    /// from [`SegmentName::new`].
    pub fn lock_name(&self) -> CoreResult<SegmentName> {
        Ok(SegmentName::new(format!("{}{SEPARATOR}", self.as_str()))?)
    }

    /// Name of the segment holding the value of `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidName`] if `entry` is not a valid entry name
    /// or the combined name exceeds [`MAX_NAME_LEN`] bytes.
    pub fn value_segment_name(&self, entry: &str) -> CoreResult<SegmentName> {
        validate_entry_name(entry)?;

        let joined = format!("{}{SEPARATOR}{entry}", self.as_str());
        if joined.len() > MAX_NAME_LEN {
            return Err(CoreError::invalid_name(
                entry,
                "namespace and entry names together exceed 255 bytes",
            ));
        }
        Ok(SegmentName::new(joined)?)
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates an entry name.
///
/// # Errors
///
/// Returns [`CoreError::InvalidName`] if the name is empty, longer than
/// [`MAX_NAME_LEN`] bytes, or contains `/` or NUL.
pub fn validate_entry_name(entry: &str) -> CoreResult<()> {
    match invalid_name_reason(entry) {
        Some(reason) => Err(CoreError::invalid_name(entry, reason)),
        None => Ok(()),
    }
}
