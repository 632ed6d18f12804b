//! The namespace directory table.
//!
//! The directory lives at the start of the namespace's segment and is shared
//! by every attached process. It is plain memory: every access below happens
//! while the namespace lock is held.
//!
//! ```text
//! header (32 bytes, little-endian)
//!   0   u32   magic "SHNS"
//!   4   u32   layout version
//!   8   i64   refcount (attached handles)
//!   16  u64   size (occupied slots)
//!   24  u64   capacity
//! slot i at 32 + i * 264
//!   0   [u8; 256]  entry name, NUL padded
//!   256 u64        value length in bytes
//! ```
//!
//! Occupied slots are always `[0, size)`; removal shifts later slots down.

use crate::error::{CoreError, CoreResult};
use shmns_storage::MAX_NAME_LEN;

const MAGIC: u32 = u32::from_le_bytes(*b"SHNS");
const LAYOUT_VERSION: u32 = 1;

const MAGIC_AT: usize = 0;
const VERSION_AT: usize = 4;
const REFCOUNT_AT: usize = 8;
const SIZE_AT: usize = 16;
const CAPACITY_AT: usize = 24;

/// Size of the directory header in bytes.
pub const HEADER_SIZE: usize = 32;

const NAME_FIELD: usize = MAX_NAME_LEN + 1;
const VALUE_LEN_AT: usize = NAME_FIELD;

/// Size of one entry slot in bytes.
pub const SLOT_SIZE: usize = NAME_FIELD + 8;

/// Bytes needed for a directory with `capacity` slots, or `None` on overflow.
#[must_use]
pub fn directory_size(capacity: usize) -> Option<usize> {
    capacity.checked_mul(SLOT_SIZE)?.checked_add(HEADER_SIZE)
}

/// What closing a handle did to the shared namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Other handles are still attached; shared state was left in place.
    StillAttached {
        /// Handles still attached after this one closed.
        remaining: usize,
    },
    /// This was the last handle; the namespace has been destroyed.
    LastClosed,
}

/// A view of the directory table over mapped bytes.
pub(crate) struct Directory<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Directory<'a> {
    /// Wraps bytes that hold at least a header, without validating it.
    pub(crate) fn raw(bytes: &'a mut [u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CoreError::invalid_format(format!(
                "segment holds {} bytes, header needs {HEADER_SIZE}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Wraps bytes holding an initialized, attached directory.
    pub(crate) fn open(bytes: &'a mut [u8]) -> CoreResult<Self> {
        let directory = Self::raw(bytes)?;
        directory.validate(true)?;
        Ok(directory)
    }

    /// Wraps bytes holding a table that no handle is attached to any more,
    /// such as one left by a handle that failed to finish closing.
    pub(crate) fn open_detached(bytes: &'a mut [u8]) -> CoreResult<Self> {
        let directory = Self::raw(bytes)?;
        directory.validate(false)?;
        Ok(directory)
    }

    fn validate(&self, attached: bool) -> CoreResult<()> {
        let magic = self.read_u32(MAGIC_AT);
        if magic != MAGIC {
            return Err(CoreError::invalid_format(format!(
                "bad magic {magic:#010x}"
            )));
        }

        let version = self.read_u32(VERSION_AT);
        if version != LAYOUT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported layout version {version}"
            )));
        }

        let refcount = self.refcount();
        if attached && refcount <= 0 {
            return Err(CoreError::invalid_format(format!(
                "refcount {refcount} with a handle attached"
            )));
        }

        let capacity = self.read_u64(CAPACITY_AT);
        let fits = usize::try_from(capacity)
            .ok()
            .and_then(directory_size)
            .is_some_and(|needed| needed <= self.bytes.len());
        if !fits {
            return Err(CoreError::invalid_format(format!(
                "capacity {capacity} does not fit in {} bytes",
                self.bytes.len()
            )));
        }

        let size = self.read_u64(SIZE_AT);
        if size > capacity {
            return Err(CoreError::invalid_format(format!(
                "size {size} exceeds capacity {capacity}"
            )));
        }

        Ok(())
    }

    /// Writes an empty table with one attached handle.
    pub(crate) fn initialize(&mut self, capacity: usize) -> CoreResult<()> {
        let needed = directory_size(capacity)
            .filter(|&needed| needed <= self.bytes.len())
            .ok_or_else(|| {
                CoreError::invalid_argument(format!(
                    "capacity {capacity} does not fit in {} bytes",
                    self.bytes.len()
                ))
            })?;

        self.bytes[..needed].fill(0);
        self.write_u32(MAGIC_AT, MAGIC);
        self.write_u32(VERSION_AT, LAYOUT_VERSION);
        self.write_i64(REFCOUNT_AT, 1);
        self.write_u64(SIZE_AT, 0);
        self.write_u64(CAPACITY_AT, capacity as u64);
        Ok(())
    }

    /// Number of attached handles. Zero or less means nobody has initialized
    /// the table since its memory was created.
    pub(crate) fn refcount(&self) -> i64 {
        self.read_i64(REFCOUNT_AT)
    }

    /// Registers one more attached handle and returns the new count.
    pub(crate) fn attach(&mut self) -> i64 {
        let refcount = self.refcount() + 1;
        self.write_i64(REFCOUNT_AT, refcount);
        refcount
    }

    /// Unregisters one handle and reports whether it was the last.
    pub(crate) fn detach(&mut self) -> CloseOutcome {
        let refcount = self.refcount() - 1;
        self.write_i64(REFCOUNT_AT, refcount.max(0));

        if refcount <= 0 {
            CloseOutcome::LastClosed
        } else {
            CloseOutcome::StillAttached {
                remaining: refcount as usize,
            }
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.read_u64(SIZE_AT) as usize
    }

    pub(crate) fn capacity(&self) -> usize {
        self.read_u64(CAPACITY_AT) as usize
    }

    pub(crate) fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }

    /// Index of the first occupied slot named `name`.
    pub(crate) fn find(&self, name: &str) -> Option<usize> {
        (0..self.size()).find(|&index| self.name_bytes(index) == name.as_bytes())
    }

    /// Number of occupied slots named `name`.
    pub(crate) fn count(&self, name: &str) -> usize {
        (0..self.size())
            .filter(|&index| self.name_bytes(index) == name.as_bytes())
            .count()
    }

    pub(crate) fn value_len(&self, index: usize) -> usize {
        self.read_u64(slot_offset(index) + VALUE_LEN_AT) as usize
    }

    /// Records a new value length on every slot named `name`.
    ///
    /// Slots with the same name share one value segment, so they must agree
    /// on its length. Returns how many slots were updated.
    pub(crate) fn update_value_len(&mut self, name: &str, len: usize) -> usize {
        let mut updated = 0;
        for index in 0..self.size() {
            if self.name_bytes(index) == name.as_bytes() {
                self.write_u64(slot_offset(index) + VALUE_LEN_AT, len as u64);
                updated += 1;
            }
        }
        updated
    }

    /// Appends an entry at index `size`. Returns `false` if the table is full.
    pub(crate) fn push(&mut self, name: &str, len: usize) -> CoreResult<bool> {
        if name.len() > MAX_NAME_LEN {
            return Err(CoreError::invalid_name(name, "name must be at most 255 bytes"));
        }

        let size = self.size();
        if size >= self.capacity() {
            return Ok(false);
        }

        let at = slot_offset(size);
        let slot = &mut self.bytes[at..at + SLOT_SIZE];
        slot.fill(0);
        slot[..name.len()].copy_from_slice(name.as_bytes());
        slot[VALUE_LEN_AT..].copy_from_slice(&(len as u64).to_le_bytes());

        self.write_u64(SIZE_AT, (size + 1) as u64);
        Ok(true)
    }

    /// Removes the slot at `index`, shifting every later slot down by one.
    pub(crate) fn remove_at(&mut self, index: usize) {
        let size = self.size();
        if index >= size {
            return;
        }

        self.bytes
            .copy_within(slot_offset(index + 1)..slot_offset(size), slot_offset(index));
        let last = slot_offset(size - 1);
        self.bytes[last..last + SLOT_SIZE].fill(0);

        self.write_u64(SIZE_AT, (size - 1) as u64);
    }

    /// Name of the slot at `index`.
    pub(crate) fn name_at(&self, index: usize) -> String {
        String::from_utf8_lossy(self.name_bytes(index)).into_owned()
    }

    /// Names of the occupied slots, in slot order.
    pub(crate) fn names(&self) -> Vec<String> {
        (0..self.size())
            .map(|index| self.name_at(index))
            .collect()
    }

    fn name_bytes(&self, index: usize) -> &[u8] {
        let at = slot_offset(index);
        let field = &self.bytes[at..at + NAME_FIELD];
        let end = field.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD);
        &field[..end]
    }

    fn read_u32(&self, at: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[at..at + 4]);
        u32::from_le_bytes(buf)
    }

    fn read_u64(&self, at: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[at..at + 8]);
        u64::from_le_bytes(buf)
    }

    fn read_i64(&self, at: usize) -> i64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[at..at + 8]);
        i64::from_le_bytes(buf)
    }

    fn write_u32(&mut self, at: usize, value: u32) {
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u64(&mut self, at: usize, value: u64) {
        self.bytes[at..at + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn write_i64(&mut self, at: usize, value: i64) {
        self.bytes[at..at + 8].copy_from_slice(&value.to_le_bytes());
    }
}

const fn slot_offset(index: usize) -> usize {
    HEADER_SIZE + index * SLOT_SIZE
}
