//! Cached worker properties.
//!
//! A proxy keeps the property map from the worker's most recent successful
//! `GetProperties` reply. Readers take an `Arc` snapshot; writers swap the
//! whole map, so a reader never observes a half-applied update.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::protocol::Scalar;

/// Property name to value, as reported by a worker.
pub type Properties = HashMap<String, Scalar>;

/// One immutable version of a worker's properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySnapshot {
    /// Zero until the first successful fetch, then incremented per update.
    pub version: u64,
    pub values: Properties,
}

impl PropertySnapshot {
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.values.get(key)
    }

    pub fn is_populated(&self) -> bool {
        self.version > 0
    }
}

#[derive(Debug, Default)]
pub struct PropertyCache {
    current: RwLock<Arc<PropertySnapshot>>,
}

impl PropertyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<PropertySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the whole map and return the new version.
    pub fn replace(&self, values: Properties) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = current.version + 1;
        *current = Arc::new(PropertySnapshot { version, values });
        version
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }
}
