//! Registry of declared metric names.
//!
//! Each entry pairs the declared type with the ordered list of buffer
//! positions currently holding observations for that name. The registry does
//! no locking of its own; [`MetricStore`](super::store::MetricStore) guards it
//! together with the buffer.

use crate::core::{MetrologError, Result};
use crate::metrics::types::MetricType;
use ahash::AHashMap;

/// Per-name declared type plus buffer positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    metric_type: MetricType,
    positions: Vec<usize>,
}

impl RegistryEntry {
    fn new(metric_type: MetricType) -> Self {
        Self {
            metric_type,
            positions: Vec::new(),
        }
    }

    /// Declared type
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Buffer positions in append order
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }
}

/// Name to (type, positions) map
#[derive(Debug, Default)]
pub struct MetricRegistry {
    entries: AHashMap<String, RegistryEntry>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with a fixed type.
    pub fn declare(&mut self, name: &str, metric_type: MetricType) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(MetrologError::AlreadyExists(name.to_string()));
        }
        self.entries
            .insert(name.to_string(), RegistryEntry::new(metric_type));
        Ok(())
    }

    /// Remove the entry for `name`, returning it.
    ///
    /// Positions held by the removed entry are left dangling in the buffer;
    /// callers compact the buffer and [`remap`](Self::remap) the survivors.
    pub fn remove(&mut self, name: &str) -> Result<RegistryEntry> {
        self.entries
            .remove(name)
            .ok_or_else(|| MetrologError::NotFound(name.to_string()))
    }

    /// Declared type of `name`
    pub fn type_of(&self, name: &str) -> Result<MetricType> {
        self.entries
            .get(name)
            .map(RegistryEntry::metric_type)
            .ok_or_else(|| MetrologError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Positions recorded for `name`, if declared
    pub fn positions(&self, name: &str) -> Option<&[usize]> {
        self.entries.get(name).map(RegistryEntry::positions)
    }

    /// Append a buffer position to the list for `name`.
    pub fn record(&mut self, name: &str, position: usize) -> Result<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| MetrologError::NotFound(name.to_string()))?;
        entry.positions.push(position);
        Ok(())
    }

    /// Empty every position list (buffer was drained)
    pub fn clear_positions(&mut self) {
        for entry in self.entries.values_mut() {
            entry.positions.clear();
        }
    }

    /// Rewrite every position list through an old-to-new table.
    ///
    /// `table[old]` is the new position of a surviving observation or `None`
    /// when it was removed. Relative order within each list is kept.
    pub fn remap(&mut self, table: &[Option<usize>]) {
        for entry in self.entries.values_mut() {
            entry
                .positions
                .retain_mut(|pos| match table.get(*pos).copied().flatten() {
                    Some(new_pos) => {
                        *pos = new_pos;
                        true
                    },
                    None => false,
                });
        }
    }

    /// Declared names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Iterate over all entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
