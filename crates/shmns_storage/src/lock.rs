//! Named locks shared by unrelated processes.
//!
//! A [`CrossProcessLock`] is an exclusive advisory lock (`flock(2)`, or
//! `LockFileEx` elsewhere) on a zero-length object in the same name space
//! as the shared memory segments:
//!
//! ```text
//! /dev/shm/<name>      # POSIX shared memory object, never mapped
//! ```
//!
//! Every process that knows the name opens the same object, so the name
//! alone is the rendezvous point; no directory or environment variable has
//! to agree between them. The lock belongs to the open file handle, which
//! means two handles inside one process exclude each other exactly like two
//! processes do. The OS drops the lock when its holder exits, including by
//! crashing.

use crate::backing;
use crate::error::{StorageError, StorageResult};
use crate::name::SegmentName;
use fs2::FileExt;
use std::fs::File;
use std::io;
use tracing::{trace, warn};

/// An exclusive lock identified by a name.
///
/// Locking blocks without a timeout. The lock is not reentrant: a handle
/// that is already locked must not be locked again before its guard is
/// released.
///
/// # Example
///
/// ```no_run
/// use shmns_storage::{CrossProcessLock, SegmentName};
///
/// let name = SegmentName::new("inventory|").unwrap();
/// let lock = CrossProcessLock::create(&name).unwrap();
/// {
///     let _guard = lock.lock().unwrap();
///     // ... mutate shared memory ...
/// }
/// lock.destroy(false).unwrap();
/// ```
#[derive(Debug)]
pub struct CrossProcessLock {
    name: SegmentName,
    file: File,
}

impl CrossProcessLock {
    /// Creates the named lock, or opens it if it exists.
    ///
    /// The lock starts out unlocked for this handle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the lock object cannot be created.
    pub fn create(name: &SegmentName) -> StorageResult<Self> {
        let file = backing::open(name, true)
            .map_err(|e| StorageError::os("shm_open", name.as_str(), e))?;

        Ok(Self {
            name: name.clone(),
            file,
        })
    }

    /// Blocks until the lock is acquired.
    ///
    /// The lock is held until the returned guard is dropped or unlocked.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the OS reports a locking failure.
    pub fn lock(&self) -> StorageResult<LockGuard<'_>> {
        self.file
            .lock_exclusive()
            .map_err(|e| StorageError::os("lock", self.name.as_str(), e))?;
        trace!(lock = %self.name, "acquired");
        Ok(LockGuard {
            lock: self,
            released: false,
        })
    }

    /// Acquires the lock if no other handle holds it.
    ///
    /// Returns `Ok(None)` instead of blocking when the lock is taken.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the OS reports a locking failure other
    /// than contention.
    pub fn try_lock(&self) -> StorageResult<Option<LockGuard<'_>>> {
        match self.file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockGuard {
                lock: self,
                released: false,
            })),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(err) => Err(StorageError::os("try_lock", self.name.as_str(), err)),
        }
    }

    /// Returns whether the object currently registered under the name is
    /// still the one this handle opened.
    ///
    /// A process that tears a namespace down removes the lock's name while
    /// holding it. Anyone who was waiting on the old object then wins a lock
    /// that no future opener will ever contend for, and must start over with
    /// a fresh handle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if either object cannot be inspected.
    #[cfg(unix)]
    pub fn is_current(&self) -> StorageResult<bool> {
        use std::os::unix::fs::MetadataExt;

        let held = self
            .file
            .metadata()
            .map_err(|e| StorageError::os("fstat", self.name.as_str(), e))?;

        let registered = match backing::open(&self.name, false) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(StorageError::os("shm_open", self.name.as_str(), err)),
        };
        let on_disk = registered
            .metadata()
            .map_err(|e| StorageError::os("fstat", self.name.as_str(), e))?;

        Ok(on_disk.dev() == held.dev() && on_disk.ino() == held.ino())
    }

    /// Returns whether the lock object still exists.
    ///
    /// Open files cannot be removed on this platform, so existence is all
    /// that can change underneath a handle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the lock object cannot be inspected.
    #[cfg(not(unix))]
    pub fn is_current(&self) -> StorageResult<bool> {
        match backing::open(&self.name, false) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::os("open", self.name.as_str(), err)),
        }
    }

    /// Removes the OS-visible name of the lock.
    ///
    /// May be called while this handle holds the lock; the lock stays held
    /// until its guard is released. Removing a name that is already gone is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the name exists but cannot be removed.
    pub fn unregister_name(&self) -> StorageResult<()> {
        match backing::unlink(&self.name) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::os("shm_unlink", self.name.as_str(), err)),
        }
    }

    /// Releases this handle, removing the lock's name first if `unregister`
    /// is true.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the name cannot be removed.
    pub fn destroy(self, unregister: bool) -> StorageResult<()> {
        if unregister {
            self.unregister_name()?;
        }
        Ok(())
    }

    /// Returns the lock name.
    #[must_use]
    pub fn name(&self) -> &SegmentName {
        &self.name
    }

    fn release(&self) -> StorageResult<()> {
        FileExt::unlock(&self.file)
            .map_err(|e| StorageError::os("unlock", self.name.as_str(), e))?;
        trace!(lock = %self.name, "released");
        Ok(())
    }
}

/// Proof that a [`CrossProcessLock`] is held.
///
/// Dropping the guard releases the lock; [`LockGuard::unlock`] does the same
/// but reports failures.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    lock: &'a CrossProcessLock,
    released: bool,
}

impl LockGuard<'_> {
    /// Releases the lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the OS reports an unlocking failure.
    pub fn unlock(mut self) -> StorageResult<()> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.lock.release() {
                warn!(lock = %self.lock.name, error = %err, "failed to release lock");
            }
        }
    }
}
