//! # shmns Storage
//!
//! OS-facing primitives for shmns.
//!
//! This crate provides the lowest layer of a shared-memory namespace:
//! named memory regions that unrelated processes can map, and a named lock
//! those processes can use to serialize access. It knows nothing about the
//! directory table stored inside the memory; `shmns_core` owns that layout.
//!
//! ## Design Principles
//!
//! - A name is the only rendezvous point between processes
//! - Segments are never resized in place; a new size means a new mapping
//! - Closing and destroying are separate decisions made by the caller
//! - Handles are consumed by `close`/`destroy`, so each is released once
//!
//! ## Primitives
//!
//! - [`Segment`] - POSIX shared memory (`shm_open` + `mmap`) on Unix, a
//!   mapped temp file elsewhere
//! - [`CrossProcessLock`] - exclusive advisory lock on a named shared
//!   memory object
//! - [`SegmentName`] - length-checked OS object name
//!
//! ## Example
//!
//! ```no_run
//! use shmns_storage::{Segment, SegmentName};
//!
//! let name = SegmentName::new("example-segment").unwrap();
//! let mut segment = Segment::open(&name, 5).unwrap();
//! segment.as_mut_slice().copy_from_slice(b"hello");
//! segment.close(true).unwrap();
//! ```

#![warn(missing_docs)]

mod backing;
mod error;
mod lock;
mod name;
mod segment;

pub use error::{StorageError, StorageResult};
pub use lock::{CrossProcessLock, LockGuard};
pub use name::{invalid_name_reason, SegmentName, MAX_NAME_LEN};
pub use segment::Segment;
