//! Command-line interface for metrolog.
//!
//! `metrolog run` reads observations from stdin and flushes them to the
//! configured sink; `check-config` validates a config file; `inspect`
//! summarizes an existing sink file.

use crate::collector::{FlushError, MetricCollector};
use crate::core::config::ConfigBuilder;
use crate::core::{Config, MetricDeclaration, MetrologError, Result};
use crate::metrics::MetricValue;
use crate::sink::format::{parse_record, unquote};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// In-process metric buffer with periodic flush to an append-only log
#[derive(Parser, Debug)]
#[command(name = "metrolog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/metrolog/config.yaml)
    #[arg(short, long, env = "METROLOG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "METROLOG_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read `name value [rfc3339-timestamp]` lines from stdin and buffer them
    Run {
        /// Sink file to append to
        #[arg(long, env = "METROLOG_SINK")]
        sink: Option<PathBuf>,

        /// Flush interval, e.g. `500ms` or `2s`
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,

        /// Extra metric declaration as `name:type` (repeatable)
        #[arg(short, long = "metric")]
        metrics: Vec<MetricDeclaration>,
    },
    /// Validate configuration and exit
    CheckConfig,
    /// Summarize the records in a sink file
    Inspect {
        /// Sink file to read
        file: PathBuf,
    },
}

/// One parsed stdin line
#[derive(Debug, Clone, PartialEq)]
pub struct InputLine {
    /// Metric name
    pub name: String,
    /// Value text, interpreted with the declared type
    pub value_text: String,
    /// Optional explicit timestamp
    pub timestamp: Option<DateTime<Utc>>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<(Config, Option<PathBuf>)> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|d| d.join("metrolog").join("config.yaml"))
                .filter(|p| p.exists()),
        };

        let mut loaded_from = None;
        if let Some(path) = config_path {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                MetrologError::config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            builder = builder.from_yaml(&content)?;
            loaded_from = Some(path);
        }

        let mut config = builder.debug(self.debug).build()?;
        if let Command::Run {
            sink,
            interval,
            metrics,
        } = &self.command
        {
            if let Some(sink) = sink {
                config.collector.sink_path = sink.clone();
            }
            if let Some(interval) = interval {
                config.collector.flush_interval = *interval;
            }
            config.metrics.extend(metrics.iter().cloned());
            config.validate()?;
        }

        Ok((config, loaded_from))
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("METROLOG_LOG_LEVEL")
            .unwrap_or_else(|_| config.logging.level.as_str().to_string());
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level.as_str()
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Logs go to stderr so stdout stays clean for command output
        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_line_number(false)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| MetrologError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute a metrolog command.
pub async fn execute(cli: Cli) -> Result<()> {
    let (config, loaded_from) = cli.load_config().await?;
    cli.init_logging(&config)?;

    match loaded_from {
        Some(path) => tracing::info!("Loaded configuration from: {:?}", path),
        None => tracing::debug!("No config file found, using defaults"),
    }

    match &cli.command {
        Command::Run { .. } => run_collector(config).await,
        Command::CheckConfig => {
            config.validate()?;
            println!("Configuration is valid!");
            println!("  Sink: {}", config.collector.sink_path.display());
            println!(
                "  Flush interval: {}",
                humantime::format_duration(config.collector.flush_interval)
            );
            println!("  Declared metrics: {}", config.metrics.len());
            for declaration in &config.metrics {
                println!("    {} ({})", declaration.name, declaration.metric_type);
            }
            Ok(())
        },
        Command::Inspect { file } => inspect_sink(file).await,
    }
}

/// Parse `name value [timestamp]`. A name containing spaces may be quoted.
pub fn parse_input_line(line: &str) -> Result<InputLine> {
    let line = line.trim();
    let (name, rest) = if line.starts_with('"') {
        unquote(line)?
    } else {
        let (name, rest) = line.split_once(char::is_whitespace).ok_or_else(|| {
            MetrologError::parse(format!("expected 'name value', got '{}'", line))
        })?;
        (name.to_string(), rest)
    };

    let mut fields = rest.split_whitespace();
    let value_text = fields
        .next()
        .ok_or_else(|| MetrologError::parse(format!("missing value for \"{}\"", name)))?
        .to_string();
    let timestamp = fields
        .next()
        .map(|ts| {
            DateTime::parse_from_rfc3339(ts)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| MetrologError::parse(format!("invalid timestamp '{}': {}", ts, e)))
        })
        .transpose()?;
    if let Some(extra) = fields.next() {
        return Err(MetrologError::parse(format!("unexpected trailing field '{}'", extra)));
    }

    Ok(InputLine {
        name,
        value_text,
        timestamp,
    })
}

fn submit_line(collector: &MetricCollector, line: &str) -> Result<()> {
    let input = parse_input_line(line)?;
    let metric_type = collector.type_of(&input.name)?;
    let value = MetricValue::deserialize(&input.value_text, metric_type)?;
    collector.submit(&input.name, value, input.timestamp)
}

fn report_flush_errors(errors: &Receiver<FlushError>) {
    for error in errors.try_iter() {
        eprintln!("flush failed: {}", error);
    }
}

async fn run_collector(config: Config) -> Result<()> {
    let collector = Arc::new(MetricCollector::from_config(&config)?);
    collector.start(config.collector.flush_interval)?;
    let errors = collector.flush_errors();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(config.collector.flush_interval);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => {},
                    Some(line) => {
                        if let Err(e) = submit_line(&collector, &line) {
                            tracing::warn!("Rejected input line {:?}: {}", line, e);
                        }
                    },
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, flushing remaining observations");
                break;
            }
            _ = ticker.tick() => report_flush_errors(&errors),
        }
    }

    // Joining the flush thread blocks, so keep it off the async workers
    let stopper = Arc::clone(&collector);
    tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .map_err(|e| MetrologError::Worker(format!("stop task failed: {}", e)))??;
    report_flush_errors(&errors);

    let stats = collector.stats();
    println!(
        "Submitted {} observations ({} rejected), flushed {}, dropped {}",
        stats.submitted, stats.rejected, stats.flushed, stats.dropped
    );
    Ok(())
}

#[derive(Debug, Default)]
struct MetricSummary {
    records: usize,
    first: Option<NaiveDateTime>,
    last: Option<NaiveDateTime>,
}

async fn inspect_sink(file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| MetrologError::sink_unavailable(file.display().to_string(), e))?;

    let mut summaries: BTreeMap<String, MetricSummary> = BTreeMap::new();
    let mut invalid = 0;
    for (lineno, line) in content.lines().enumerate() {
        match parse_record(line) {
            Ok(record) => {
                let summary = summaries.entry(record.name).or_default();
                summary.records += 1;
                summary.first = Some(summary.first.map_or(record.timestamp, |t| t.min(record.timestamp)));
                summary.last = Some(summary.last.map_or(record.timestamp, |t| t.max(record.timestamp)));
            },
            Err(e) => {
                invalid += 1;
                tracing::warn!("{}:{}: {}", file.display(), lineno + 1, e);
            },
        }
    }

    println!("{}: {} metrics, {} invalid lines", file.display(), summaries.len(), invalid);
    for (name, summary) in &summaries {
        let span = match (summary.first, summary.last) {
            (Some(first), Some(last)) => format!("{} .. {}", first, last),
            _ => String::new(),
        };
        println!("  {:<32} {:>8}  {}", name, summary.records, span);
    }
    Ok(())
}
