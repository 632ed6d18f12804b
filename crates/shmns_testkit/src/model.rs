//! An in-memory reference model of a namespace.
//!
//! The model is what a namespace should behave like, written as plainly as
//! possible: a list of slots in insertion order and one value per name.
//! Tests apply the same operations to a real [`Container`] and to the model
//! and compare what comes back.

use crate::generators::NamespaceOp;
use shmns_core::{Container, CoreResult};
use std::collections::HashMap;

/// What an operation returned, in a form both sides can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// `add`, `set` or `remove` returned this flag.
    Flag(bool),
    /// `get` returned this value.
    Value(Option<Vec<u8>>),
    /// `clear` returned.
    Cleared,
}

/// Reference model of a fixed-capacity namespace.
#[derive(Debug, Clone, Default)]
pub struct NamespaceModel {
    capacity: usize,
    slots: Vec<String>,
    values: HashMap<String, Vec<u8>>,
}

impl NamespaceModel {
    /// Creates an empty model with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Number of occupied slots.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Maximum number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Names in slot order.
    pub fn names(&self) -> &[String] {
        &self.slots
    }

    /// Appends a slot; duplicates share the latest value.
    pub fn add(&mut self, name: &str, value: &[u8]) -> bool {
        if self.slots.len() >= self.capacity {
            return false;
        }
        self.slots.push(name.to_string());
        self.values.insert(name.to_string(), value.to_vec());
        true
    }

    /// Inserts or updates.
    pub fn set(&mut self, name: &str, value: &[u8]) -> bool {
        if !self.values.contains_key(name) {
            return self.add(name, value);
        }
        self.values.insert(name.to_string(), value.to_vec());
        true
    }

    /// Looks up a value.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.values.get(name).cloned()
    }

    /// Removes the first slot named `name`.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(index) = self.slots.iter().position(|slot| slot == name) else {
            return false;
        };
        self.slots.remove(index);
        if !self.slots.iter().any(|slot| slot == name) {
            self.values.remove(name);
        }
        true
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.values.clear();
    }

    /// Applies `op` to the model.
    pub fn apply(&mut self, op: &NamespaceOp) -> OpOutcome {
        match op {
            NamespaceOp::Add(name, value) => OpOutcome::Flag(self.add(name, value)),
            NamespaceOp::Set(name, value) => OpOutcome::Flag(self.set(name, value)),
            NamespaceOp::Get(name) => OpOutcome::Value(self.get(name)),
            NamespaceOp::Remove(name) => OpOutcome::Flag(self.remove(name)),
            NamespaceOp::Clear => {
                self.clear();
                OpOutcome::Cleared
            }
        }
    }
}

/// Applies `op` to a real namespace.
///
/// # Errors
///
/// Returns whatever error the container operation returns.
pub fn apply_to_container(ns: &Container, op: &NamespaceOp) -> CoreResult<OpOutcome> {
    Ok(match op {
        NamespaceOp::Add(name, value) => OpOutcome::Flag(ns.add(name, value)?),
        NamespaceOp::Set(name, value) => OpOutcome::Flag(ns.set(name, value)?),
        NamespaceOp::Get(name) => OpOutcome::Value(ns.get(name)?),
        NamespaceOp::Remove(name) => OpOutcome::Flag(ns.remove(name)?),
        NamespaceOp::Clear => {
            ns.clear()?;
            OpOutcome::Cleared
        }
    })
}
