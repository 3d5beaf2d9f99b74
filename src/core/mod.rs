//! Errors and configuration shared by every metrolog component.

#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{CollectorConfig, Config, ConfigBuilder, LogLevel, LoggingConfig, MetricDeclaration};
pub use error::{MetrologError, Result};
