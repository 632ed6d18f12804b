//! Test fixtures and namespace helpers.
//!
//! Every fixture gets a random namespace name, so tests running in parallel
//! never share OS objects by accident.

use shmns_core::{Config, Container};

/// A namespace name plus the configuration needed to open it.
///
/// The fixture itself holds no handle; call [`TestNamespace::open`] once per
/// handle a test needs.
pub struct TestNamespace {
    name: String,
    config: Config,
}

impl TestNamespace {
    /// Creates a fixture with a unique name.
    pub fn new() -> Self {
        Self {
            name: unique_name("shmns-test"),
            config: Config::new(),
        }
    }

    /// Returns the namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration handles should be opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a new handle on the namespace.
    pub fn open(&self, capacity: usize) -> Container {
        Container::open_with_config(&self.name, capacity, self.config.clone())
            .expect("Failed to open namespace")
    }
}

impl Default for TestNamespace {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `prefix` followed by a random suffix.
pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/// Runs a test against a fresh namespace and closes it afterwards.
pub fn with_namespace<F, R>(capacity: usize, f: F) -> R
where
    F: FnOnce(&Container) -> R,
{
    let fixture = TestNamespace::new();
    let ns = fixture.open(capacity);
    let result = f(&ns);
    ns.close().expect("Failed to close namespace");
    result
}

/// Fills `ns` with `count` entries named `key-<i>` holding `value-<i>`.
pub fn populate(ns: &Container, count: usize) {
    for i in 0..count {
        let stored = ns
            .set(&format!("key-{i}"), format!("value-{i}").as_bytes())
            .expect("Failed to set entry");
        assert!(stored, "namespace full after {i} entries");
    }
}
