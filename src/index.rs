use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Equality hash index over one column.
///
/// Maps the canonical key of a value (see [Value::key]) to the ascending
/// list of row positions currently holding it. `NULL` is never indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashIndex {
    entries: HashMap<String, Vec<usize>>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from the values of one column, in row order.
    pub fn build<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut index = Self::new();
        for (position, value) in values.into_iter().enumerate() {
            index.insert(value, position);
        }
        index
    }

    /// Records that `position` holds `value`.
    pub fn insert(&mut self, value: &Value, position: usize) {
        let Some(key) = value.key() else {
            return;
        };
        let positions = self.entries.entry(key).or_default();
        if let Err(at) = positions.binary_search(&position) {
            positions.insert(at, position);
        }
    }

    /// Forgets that `position` holds `value`; empty keys are dropped.
    pub fn remove(&mut self, value: &Value, position: usize) {
        let Some(key) = value.key() else {
            return;
        };
        if let Some(positions) = self.entries.get_mut(&key) {
            positions.retain(|p| *p != position);
            if positions.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Row positions holding `value`, ascending. Empty for `NULL`.
    pub fn lookup(&self, value: &Value) -> &[usize] {
        value
            .key()
            .and_then(|key| self.entries.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct indexed keys.
    pub fn distinct_keys(&self) -> usize {
        self.entries.len()
    }

    /// Number of indexed row positions.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
