//! Registry and buffer as one consistent unit.
//!
//! Every operation here touches both halves, so the collector wraps a single
//! `MetricStore` in one lock. Between calls the following always holds: each
//! registry position indexes a live observation whose name matches the entry
//! and whose value type equals the declared type.

use crate::core::{MetrologError, Result};
use crate::metrics::buffer::MetricBuffer;
use crate::metrics::registry::MetricRegistry;
use crate::metrics::types::{MetricType, MetricValue, Observation};
use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct MetricStore {
    registry: MetricRegistry,
    buffer: MetricBuffer,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with preallocated buffer space
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: MetricRegistry::new(),
            buffer: MetricBuffer::with_capacity(capacity),
        }
    }

    pub fn declare(&mut self, name: &str, metric_type: MetricType) -> Result<()> {
        self.registry.declare(name, metric_type)
    }

    /// Remove `name` and compact its observations out of the buffer.
    ///
    /// Returns how many buffered observations were discarded.
    pub fn undeclare(&mut self, name: &str) -> Result<usize> {
        let entry = self.registry.remove(name)?;
        let discarded = entry.positions().len();
        if discarded > 0 {
            let table = self.buffer.remove_where(|o| o.name == name);
            self.registry.remap(&table);
        }
        Ok(discarded)
    }

    /// Validate and append one observation.
    ///
    /// On error nothing is modified.
    pub fn submit(
        &mut self,
        name: &str,
        value: MetricValue,
        timestamp: DateTime<Utc>,
    ) -> Result<usize> {
        let declared = self.registry.type_of(name)?;
        let actual = value.metric_type();
        if declared != actual {
            return Err(MetrologError::TypeMismatch {
                name: name.to_string(),
                expected: declared,
                actual,
            });
        }

        let position = self.buffer.append(Observation::new(name, value, timestamp));
        self.registry.record(name, position)?;
        Ok(position)
    }

    /// Take all buffered observations and reset every index list.
    pub fn drain(&mut self) -> Vec<Observation> {
        let drained = self.buffer.drain_all();
        self.registry.clear_positions();
        drained
    }

    pub fn type_of(&self, name: &str) -> Result<MetricType> {
        self.registry.type_of(name)
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn buffer(&self) -> &MetricBuffer {
        &self.buffer
    }

    /// Observations buffered for `name`, in submission order
    pub fn observations_for(&self, name: &str) -> Vec<&Observation> {
        self.registry
            .positions(name)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&pos| self.buffer.get(pos))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of buffered observations
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Check the registry/buffer invariant, describing the first violation.
    pub fn check_consistency(&self) -> std::result::Result<(), String> {
        let mut indexed = 0;
        for (name, entry) in self.registry.iter() {
            for &pos in entry.positions() {
                let observation = self
                    .buffer
                    .get(pos)
                    .ok_or_else(|| format!("{}: position {} is past the buffer end", name, pos))?;
                if observation.name != name {
                    return Err(format!(
                        "{}: position {} holds an observation for {}",
                        name, pos, observation.name
                    ));
                }
                if observation.value.metric_type() != entry.metric_type() {
                    return Err(format!("{}: position {} has the wrong value type", name, pos));
                }
            }
            indexed += entry.positions().len();
        }
        if indexed != self.buffer.len() {
            return Err(format!(
                "{} positions indexed but {} observations buffered",
                indexed,
                self.buffer.len()
            ));
        }
        Ok(())
    }
}
