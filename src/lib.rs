//! Metrolog - in-process metric buffering and persistence.
//!
//! Producers declare named, typed metrics and submit timestamped
//! observations from any number of threads. A background worker drains the
//! buffer on a fixed interval and appends one text record per observation
//! to a log file.
//!
//! # Architecture
//!
//! - `metrics`: value types, the name registry, the observation buffer and
//!   the store that keeps the two consistent
//! - `sink`: record format and append-only destinations
//! - `collector`: the façade and its flush worker
//! - `core`: errors and configuration
//! - `cli`: command-line driver
//!
//! # Example
//!
//! ```no_run
//! use metrolog_lib::collector::MetricCollector;
//! use metrolog_lib::core::CollectorConfig;
//! use metrolog_lib::metrics::MetricType;
//! use std::time::Duration;
//!
//! fn main() -> metrolog_lib::Result<()> {
//!     let collector = MetricCollector::new(CollectorConfig::default());
//!     collector.declare_metric("cpu", MetricType::Float)?;
//!     collector.start(Duration::from_millis(500))?;
//!     collector.submit_now("cpu", 0.5)?;
//!     collector.stop()?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod collector;
pub mod core;
pub mod metrics;
pub mod sink;

// Re-export core types for convenience
pub use crate::collector::MetricCollector;
pub use crate::core::{Config, MetrologError, Result};
pub use crate::metrics::{MetricType, MetricValue, Observation};
