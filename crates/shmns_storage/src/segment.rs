//! Named shared memory segments.

use crate::backing;
use crate::error::{StorageError, StorageResult};
use crate::name::SegmentName;
use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::io;

/// One named shared memory region mapped into this process.
///
/// A segment is created by the first process that opens its name and
/// attached by every later one. All handles map the same bytes, so a write
/// through one handle is visible through every other handle, in any process,
/// immediately.
///
/// # Lifetime
///
/// - [`Segment::close`] unmaps and closes this handle; with `destroy` it also
///   removes the OS-visible name so no later `open` can attach
/// - Dropping a segment without closing it unmaps it but never destroys it
/// - The size is fixed for the life of a mapping; see [`Segment::open_exact`]
///
/// # Backing
///
/// On Unix this is POSIX shared memory (`shm_open`, `ftruncate`, `mmap`,
/// `shm_unlink`). Other targets use a named file in the temp directory,
/// mapped the same way.
///
/// # Synchronization
///
/// The segment performs no locking. Callers serialize access to shared bytes
/// with a [`crate::CrossProcessLock`].
///
/// # Example
///
/// ```no_run
/// use shmns_storage::{Segment, SegmentName};
///
/// let name = SegmentName::new("greeting").unwrap();
/// let mut writer = Segment::open(&name, 5).unwrap();
/// writer.as_mut_slice().copy_from_slice(b"hello");
///
/// let reader = Segment::attach(&name).unwrap().unwrap();
/// assert_eq!(reader.as_slice(), b"hello");
///
/// reader.close(false).unwrap();
/// writer.close(true).unwrap();
/// ```
#[derive(Debug)]
pub struct Segment {
    name: SegmentName,
    // Unmapped before the handle is closed.
    map: Option<MmapMut>,
    _file: File,
}

impl Segment {
    /// Creates the named segment, or attaches to it if it already exists.
    ///
    /// A newly created segment is sized to `size` bytes and zero-filled. An
    /// existing segment keeps its current length, which may differ from
    /// `size`: attaching never resizes memory other processes have mapped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the object cannot be created, sized or
    /// mapped.
    pub fn open(name: &SegmentName, size: usize) -> StorageResult<Self> {
        let file = backing::open(name, true)
            .map_err(|e| StorageError::os("shm_open", name.as_str(), e))?;
        let current = current_len(&file, name)?;

        let len = if current == 0 && size > 0 {
            resize(&file, name, size)?;
            size
        } else {
            current
        };

        Self::map(name, file, len)
    }

    /// Creates or attaches to the named segment and sets its length to
    /// exactly `size` bytes.
    ///
    /// This is how a segment changes size: the object is truncated or
    /// extended and mapped afresh. Other handles still map the old length,
    /// so callers must hold the lock that guards this segment and must not
    /// keep other mappings of it alive across the call.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the object cannot be created, sized or
    /// mapped.
    pub fn open_exact(name: &SegmentName, size: usize) -> StorageResult<Self> {
        let file = backing::open(name, true)
            .map_err(|e| StorageError::os("shm_open", name.as_str(), e))?;

        if current_len(&file, name)? != size {
            resize(&file, name, size)?;
        }

        Self::map(name, file, size)
    }

    /// Attaches to an existing segment without creating one.
    ///
    /// Returns `Ok(None)` if no segment has this name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the object exists but cannot be mapped.
    pub fn attach(name: &SegmentName) -> StorageResult<Option<Self>> {
        let file = match backing::open(name, false) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::os("shm_open", name.as_str(), err)),
        };
        let len = current_len(&file, name)?;
        Self::map(name, file, len).map(Some)
    }

    /// Removes the OS-visible name of a segment without mapping it.
    ///
    /// Existing mappings stay valid until their handles close. Returns
    /// `false` if no segment had this name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the name exists but cannot be removed.
    pub fn unlink(name: &SegmentName) -> StorageResult<bool> {
        match backing::unlink(name) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::os("shm_unlink", name.as_str(), err)),
        }
    }

    /// Unmaps the segment and closes this handle.
    ///
    /// If `destroy` is true the OS-visible name is removed as well; the
    /// memory itself is released once every process has unmapped it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Os`] if the name cannot be removed.
    pub fn close(self, destroy: bool) -> StorageResult<()> {
        let Self { name, map, _file } = self;
        drop(map);
        drop(_file);

        if destroy {
            Self::unlink(&name)?;
        }
        Ok(())
    }

    /// Returns the segment name.
    #[must_use]
    pub fn name(&self) -> &SegmentName {
        &self.name
    }

    /// Returns the mapped length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.as_ref().map_or(0, |map| map.len())
    }

    /// Returns true if the segment holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.map {
            Some(map) => &map[..],
            None => &[],
        }
    }

    /// Returns the mapped bytes for writing.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.map {
            Some(map) => &mut map[..],
            None => &mut [],
        }
    }

    fn map(name: &SegmentName, file: File, len: usize) -> StorageResult<Self> {
        // Zero-length mappings are rejected by the OS; an empty segment simply
        // has nothing mapped.
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the mapping covers exactly the current length of the
            // object, so no page lies past its end. The memory is shared with
            // other processes; callers serialize writes with the namespace lock
            // and only ever copy bytes in and out, never hand out references
            // that outlive a locked section.
            let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }
                .map_err(|e| StorageError::os("mmap", name.as_str(), e))?;
            Some(map)
        };

        Ok(Self {
            name: name.clone(),
            map,
            _file: file,
        })
    }
}

fn current_len(file: &File, name: &SegmentName) -> StorageResult<usize> {
    let len = file
        .metadata()
        .map_err(|e| StorageError::os("fstat", name.as_str(), e))?
        .len();

    usize::try_from(len).map_err(|_| {
        StorageError::os(
            "fstat",
            name.as_str(),
            io::Error::new(io::ErrorKind::InvalidData, "segment larger than address space"),
        )
    })
}

fn resize(file: &File, name: &SegmentName, size: usize) -> StorageResult<()> {
    file.set_len(size as u64)
        .map_err(|e| StorageError::os("ftruncate", name.as_str(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name() -> SegmentName {
        SegmentName::new(format!("shmns-seg-{}", uuid::Uuid::new_v4().simple())).unwrap()
    }

    #[test]
    fn open_creates_zeroed_segment() {
        let name = unique_name();

        let segment = Segment::open(&name, 64).unwrap();
        assert_eq!(segment.len(), 64);
        assert!(segment.as_slice().iter().all(|&b| b == 0));

        segment.close(true).unwrap();
    }

    #[test]
    fn second_handle_sees_writes() {
        let name = unique_name();

        let mut writer = Segment::open(&name, 16).unwrap();
        writer.as_mut_slice()[..5].copy_from_slice(b"hello");

        let reader = Segment::open(&name, 16).unwrap();
        assert_eq!(&reader.as_slice()[..5], b"hello");

        reader.close(false).unwrap();
        writer.close(true).unwrap();
    }

    #[test]
    fn attach_keeps_existing_length() {
        let name = unique_name();

        let first = Segment::open(&name, 32).unwrap();
        let second = Segment::open(&name, 8).unwrap();
        assert_eq!(second.len(), 32);

        second.close(false).unwrap();
        first.close(true).unwrap();
    }

    #[test]
    fn open_exact_changes_length() {
        let name = unique_name();

        let mut segment = Segment::open(&name, 4).unwrap();
        segment.as_mut_slice().copy_from_slice(b"abcd");
        segment.close(false).unwrap();

        let mut segment = Segment::open_exact(&name, 10).unwrap();
        assert_eq!(segment.len(), 10);
        segment.as_mut_slice().copy_from_slice(b"0123456789");
        segment.close(false).unwrap();

        let segment = Segment::open_exact(&name, 2).unwrap();
        assert_eq!(segment.as_slice(), b"01");
        segment.close(true).unwrap();
    }

    #[test]
    fn attach_missing_returns_none() {
        assert!(Segment::attach(&unique_name()).unwrap().is_none());
    }

    #[test]
    fn destroy_removes_name() {
        let name = unique_name();

        let segment = Segment::open(&name, 8).unwrap();
        segment.close(true).unwrap();

        assert!(Segment::attach(&name).unwrap().is_none());
        assert!(!Segment::unlink(&name).unwrap());
    }

    #[test]
    fn close_without_destroy_keeps_contents() {
        let name = unique_name();

        let mut segment = Segment::open(&name, 3).unwrap();
        segment.as_mut_slice().copy_from_slice(b"xyz");
        segment.close(false).unwrap();

        let segment = Segment::attach(&name).unwrap().unwrap();
        assert_eq!(segment.as_slice(), b"xyz");
        segment.close(true).unwrap();
    }

    #[test]
    fn zero_length_segment() {
        let name = unique_name();

        let mut segment = Segment::open_exact(&name, 0).unwrap();
        assert!(segment.is_empty());
        assert!(segment.as_mut_slice().is_empty());
        segment.close(false).unwrap();

        let segment = Segment::attach(&name).unwrap().unwrap();
        assert!(segment.is_empty());
        segment.close(true).unwrap();
    }
}
