//! Configuration management for metrolog.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides (see `cli`)
//! - Validation and defaults

use crate::core::{MetrologError, Result};
use crate::metrics::MetricType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for metrolog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector and sink configuration
    pub collector: CollectorConfig,
    /// Metrics declared before any submission
    pub metrics: Vec<MetricDeclaration>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Append-only log the flush worker writes to
    pub sink_path: PathBuf,
    /// Time between flushes
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Pending flush failure reports kept for the embedder
    pub error_channel_capacity: usize,
    /// Initial buffer capacity in observations
    pub buffer_capacity: usize,
}

/// A metric name with its fixed type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDeclaration {
    /// Metric name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub metric_type: MetricType,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format (targets, thread ids, line numbers)
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            collector: CollectorConfig::default(),
            metrics: Vec::new(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            sink_path: PathBuf::from("./metrics.log"),
            flush_interval: Duration::from_secs(1),
            error_channel_capacity: 64,
            buffer_capacity: 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl MetricDeclaration {
    pub fn new(name: impl Into<String>, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            metric_type,
        }
    }
}

impl std::str::FromStr for MetricDeclaration {
    type Err = MetrologError;

    /// Parse `name:type`, e.g. `cpu:float`. The split is on the last colon so
    /// names may contain colons themselves.
    fn from_str(s: &str) -> Result<Self> {
        let (name, ty) = s.rsplit_once(':').ok_or_else(|| {
            MetrologError::parse(format!("expected name:type, got '{}'", s))
        })?;
        if name.is_empty() {
            return Err(MetrologError::parse(format!("empty metric name in '{}'", s)));
        }
        Ok(Self::new(name, ty.parse()?))
    }
}

impl CollectorConfig {
    /// Validate the collector section
    pub fn validate(&self) -> Result<()> {
        if self.sink_path.as_os_str().is_empty() {
            return Err(MetrologError::config("sink_path must not be empty"));
        }

        if self.flush_interval.is_zero() {
            return Err(MetrologError::config("flush_interval must be greater than 0"));
        }

        if self.error_channel_capacity == 0 {
            return Err(MetrologError::config("error_channel_capacity must be greater than 0"));
        }

        Ok(())
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.collector.validate()?;

        let mut seen = HashSet::new();
        for declaration in &self.metrics {
            if declaration.name.is_empty() {
                return Err(MetrologError::config("metric names must not be empty"));
            }
            if !seen.insert(declaration.name.as_str()) {
                return Err(MetrologError::config(format!(
                    "metric '{}' is declared more than once",
                    declaration.name
                )));
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MetrologError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set sink path
    pub fn sink_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.collector.sink_path = path.into();
        self
    }

    /// Set flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.collector.flush_interval = interval;
        self
    }

    /// Add a metric declaration
    pub fn declare(mut self, name: impl Into<String>, metric_type: MetricType) -> Self {
        self.config
            .metrics
            .push(MetricDeclaration::new(name, metric_type));
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.collector.flush_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let result = ConfigBuilder::new()
            .declare("cpu", MetricType::Float)
            .declare("cpu", MetricType::Integer)
            .build();
        assert!(matches!(result, Err(MetrologError::Config(_))));
    }

    #[test]
    fn test_declaration_from_str() {
        let decl: MetricDeclaration = "cpu:float".parse().unwrap();
        assert_eq!(decl, MetricDeclaration::new("cpu", MetricType::Float));

        let decl: MetricDeclaration = "host:a:int".parse().unwrap();
        assert_eq!(decl.name, "host:a");
        assert_eq!(decl.metric_type, MetricType::Integer);

        assert!("cpu".parse::<MetricDeclaration>().is_err());
        assert!(":float".parse::<MetricDeclaration>().is_err());
        assert!("cpu:gauge".parse::<MetricDeclaration>().is_err());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
collector:
  sink_path: /tmp/metrics.log
  flush_interval: 250ms
metrics:
  - name: cpu
    type: float
  - name: requests
    type: int
logging:
  level: debug
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

        assert_eq!(config.collector.sink_path, PathBuf::from("/tmp/metrics.log"));
        assert_eq!(config.collector.flush_interval, Duration::from_millis(250));
        assert_eq!(config.collector.error_channel_capacity, 64);
        assert_eq!(
            config.metrics,
            vec![
                MetricDeclaration::new("cpu", MetricType::Float),
                MetricDeclaration::new("requests", MetricType::Integer),
            ]
        );
        assert_eq!(config.logging.level, LogLevel::Debug);
    }
}
