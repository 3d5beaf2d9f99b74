use crate::metrics::MetricType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetrologError {
    #[error("Metric already exists: \"{0}\"")]
    AlreadyExists(String),

    #[error("Metric not found: \"{0}\"")]
    NotFound(String),

    #[error("Type mismatch for metric \"{name}\": declared {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: MetricType,
        actual: MetricType,
    },

    #[error("Sink unavailable: {sink}: {source}")]
    SinkUnavailable {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Flush worker is already running")]
    AlreadyRunning,

    #[error("Flush worker is not running")]
    NotRunning,

    #[error("Flush worker error: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for metrolog operations
pub type Result<T> = std::result::Result<T, MetrologError>;

impl MetrologError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Creates a sink error wrapping the underlying IO failure
    pub fn sink_unavailable<S: Into<String>>(sink: S, source: std::io::Error) -> Self {
        Self::SinkUnavailable {
            sink: sink.into(),
            source,
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) | Self::NotFound(_) => "registry",
            Self::TypeMismatch { .. } => "validation",
            Self::SinkUnavailable { .. } | Self::Io(_) => "io",
            Self::AlreadyRunning | Self::NotRunning | Self::Worker(_) => "worker",
            Self::Config(_) => "config",
            Self::Parse { .. } => "parse",
        }
    }
}
