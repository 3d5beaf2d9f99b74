//! Metric registry, buffer and value types.
//!
//! - [`MetricRegistry`]: declared names, their types and buffer positions
//! - [`MetricBuffer`]: ordered observations awaiting flush
//! - [`MetricStore`]: both of the above kept consistent under one lock

pub mod buffer;
pub mod registry;
pub mod store;
pub mod types;

pub use buffer::MetricBuffer;
pub use registry::{MetricRegistry, RegistryEntry};
pub use store::MetricStore;
pub use types::{MetricType, MetricValue, Observation};
