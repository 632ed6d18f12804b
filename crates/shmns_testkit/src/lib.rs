//! # shmns Testkit
//!
//! Test utilities for shmns.
//!
//! This crate provides:
//! - Namespace fixtures with unique names
//! - Property-based test generators using proptest
//! - An in-memory reference model of a namespace
//! - Stress testing utilities for concurrent handles
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shmns_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_namespace() {
//!     with_namespace(8, |ns| {
//!         ns.set("key", b"value").unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use stress::*;
