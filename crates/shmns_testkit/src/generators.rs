//! Property-based test generators using proptest.
//!
//! Entry names are drawn from a small alphabet so that generated operation
//! sequences hit the same keys often enough to exercise updates, duplicates
//! and removal from the middle of the table.

use proptest::prelude::*;

/// One operation against a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceOp {
    /// `add(name, value)`
    Add(String, Vec<u8>),
    /// `set(name, value)`
    Set(String, Vec<u8>),
    /// `get(name)`
    Get(String),
    /// `remove(name)`
    Remove(String),
    /// `clear()`
    Clear,
}

/// Strategy for generating entry names from a small key space.
pub fn entry_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-e]{1,2}").expect("Invalid regex")
}

/// Strategy for generating arbitrary entry names accepted by the namespace.
pub fn any_entry_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_.|-]{1,64}")
        .expect("Invalid regex")
        .prop_filter("`.` and `..` are reserved", |s| s != "." && s != "..")
}

/// Strategy for generating values, including empty ones.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating a single operation.
pub fn op_strategy() -> impl Strategy<Value = NamespaceOp> {
    prop_oneof![
        3 => (entry_name_strategy(), value_strategy())
            .prop_map(|(name, value)| NamespaceOp::Set(name, value)),
        1 => (entry_name_strategy(), value_strategy())
            .prop_map(|(name, value)| NamespaceOp::Add(name, value)),
        3 => entry_name_strategy().prop_map(NamespaceOp::Get),
        2 => entry_name_strategy().prop_map(NamespaceOp::Remove),
        1 => Just(NamespaceOp::Clear),
    ]
}

/// Strategy for generating operation sequences.
pub fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<NamespaceOp>> {
    prop::collection::vec(op_strategy(), 0..max_len)
}

/// Configuration for property-based tests.
///
/// Every case opens real shared memory, so the defaults are lower than
/// proptest's own.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 128,
            max_shrink_iters: 500,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
