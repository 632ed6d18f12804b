//! # shmns Core
//!
//! Named key/value namespaces shared between processes.
//!
//! This crate provides:
//! - [`Container`], a handle to a namespace any process can open by name
//! - The shared directory table mapping entry names to value segments
//! - Reference-counted lifecycle: the last handle to close destroys the
//!   namespace
//!
//! Values are opaque bytes. Each operation is atomic with respect to every
//! other handle on the same namespace name, in this process or any other.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod container;
mod directory;
mod error;
mod name;

pub use config::Config;
pub use container::{Container, NamespaceInfo};
pub use directory::{directory_size, CloseOutcome, HEADER_SIZE, SLOT_SIZE};
pub use error::{CoreError, CoreResult};
pub use name::{validate_entry_name, NamespaceName, SEPARATOR};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
