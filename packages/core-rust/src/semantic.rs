//! Semantic annotations carried by Things and interactions.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::Value;

/// Set of semantic type URIs, rendered as a sorted list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticTypes {
    items: BTreeSet<String>,
}

impl SemanticTypes {
    /// Adds a type URI. Returns `false` if it was already present.
    pub fn add(&mut self, uri: impl Into<String>) -> bool {
        self.items.insert(uri.into())
    }

    /// Removes a type URI. Absent URIs are ignored.
    pub fn remove(&mut self, uri: &str) -> bool {
        self.items.remove(uri)
    }

    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.items.contains(uri)
    }

    /// Returns the types as an ordered list.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        self.items.iter().cloned().collect()
    }
}

/// Key/value semantic metadata merged into external representations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticMetadata {
    items: BTreeMap<String, Value>,
}

impl SemanticMetadata {
    /// Inserts or replaces a metadata item.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.items.insert(key.into(), value.into());
    }

    /// Removes a metadata item, returning its value if it existed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.items.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items.get(key)
    }

    /// Copies every item into `target`, overwriting keys already there.
    pub fn merge_into(&self, target: &mut BTreeMap<String, Value>) {
        for (key, value) in &self.items {
            target.insert(key.clone(), value.clone());
        }
    }
}
