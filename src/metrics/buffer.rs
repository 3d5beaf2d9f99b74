//! Append-only observation buffer.
//!
//! Positions are dense indices `0..len`. They stay valid until the next
//! [`drain_all`](MetricBuffer::drain_all) or
//! [`remove_where`](MetricBuffer::remove_where).

use crate::metrics::types::Observation;

/// Ordered observations awaiting flush
#[derive(Debug, Default)]
pub struct MetricBuffer {
    observations: Vec<Observation>,
}

impl MetricBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with room for `capacity` observations
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            observations: Vec::with_capacity(capacity),
        }
    }

    /// Append an observation, returning its position.
    pub fn append(&mut self, observation: Observation) -> usize {
        let position = self.observations.len();
        self.observations.push(observation);
        position
    }

    /// Take every buffered observation in order, leaving the buffer empty.
    pub fn drain_all(&mut self) -> Vec<Observation> {
        std::mem::take(&mut self.observations)
    }

    /// Remove every observation matching `predicate`.
    ///
    /// Returns a table indexed by old position: `Some(new)` for survivors,
    /// `None` for removed entries. Survivors keep their relative order.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Option<usize>>
    where
        F: FnMut(&Observation) -> bool,
    {
        let mut table = Vec::with_capacity(self.observations.len());
        let mut next = 0;
        for observation in &self.observations {
            if predicate(observation) {
                table.push(None);
            } else {
                table.push(Some(next));
                next += 1;
            }
        }

        let mut idx = 0;
        self.observations.retain(|_| {
            let keep = table[idx].is_some();
            idx += 1;
            keep
        });

        table
    }

    pub fn get(&self, position: usize) -> Option<&Observation> {
        self.observations.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
