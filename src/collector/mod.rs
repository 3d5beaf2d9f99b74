//! Metric collector façade.
//!
//! [`MetricCollector`] validates submissions against the registry, appends
//! them to the shared buffer, and owns the background [`FlushWorker`].
//! Every method takes `&self`; wrap the collector in an `Arc` to share it
//! across producer threads.

pub mod worker;

use crate::core::{CollectorConfig, Config, MetrologError, Result};
use crate::metrics::{MetricStore, MetricType, MetricValue};
use crate::sink::{FileSink, MetricSink};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

pub use worker::{FlushError, FlushWorker, WorkerState};
use worker::FlushCounters;

/// Snapshot of collector activity
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorStats {
    /// Declared metric names
    pub declared: usize,
    /// Observations currently buffered
    pub pending: usize,
    /// Accepted submissions since creation
    pub submitted: u64,
    /// Rejected submissions since creation
    pub rejected: u64,
    /// Observations written to the sink
    pub flushed: u64,
    /// Successful non-empty flushes
    pub flush_count: u64,
    /// Flushes that failed to reach the sink
    pub failed_flushes: u64,
    /// Observations lost to failed flushes
    pub dropped: u64,
    /// Time of last successful flush
    pub last_flush: Option<DateTime<Utc>>,
}

/// Buffers typed observations and flushes them periodically to a sink
pub struct MetricCollector {
    store: Arc<Mutex<MetricStore>>,
    config: CollectorConfig,
    worker: Mutex<Option<FlushWorker>>,
    counters: Arc<FlushCounters>,
    error_tx: Sender<FlushError>,
    error_rx: Receiver<FlushError>,
}

impl MetricCollector {
    /// Create an idle collector. Nothing is opened until [`start`](Self::start).
    pub fn new(config: CollectorConfig) -> Self {
        let (error_tx, error_rx) = bounded(config.error_channel_capacity.max(1));
        Self {
            store: Arc::new(Mutex::new(MetricStore::with_capacity(config.buffer_capacity))),
            config,
            worker: Mutex::new(None),
            counters: Arc::new(FlushCounters::default()),
            error_tx,
            error_rx,
        }
    }

    /// Create a collector and declare every configured metric.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let collector = Self::new(config.collector.clone());
        for declaration in &config.metrics {
            collector.declare_metric(&declaration.name, declaration.metric_type)?;
        }
        Ok(collector)
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Declare `name` with a fixed type.
    pub fn declare_metric(&self, name: &str, metric_type: MetricType) -> Result<()> {
        self.store.lock().declare(name, metric_type)?;
        tracing::info!("Declared metric \"{}\" as {}", name, metric_type);
        Ok(())
    }

    /// Remove `name` and every buffered observation for it.
    pub fn undeclare_metric(&self, name: &str) -> Result<()> {
        let discarded = self.store.lock().undeclare(name)?;
        tracing::info!(
            "Removed metric \"{}\", discarding {} buffered observations",
            name,
            discarded
        );
        Ok(())
    }

    /// Declared type of `name`
    pub fn type_of(&self, name: &str) -> Result<MetricType> {
        self.store.lock().type_of(name)
    }

    /// Declared names, sorted
    pub fn declared_metrics(&self) -> Vec<String> {
        self.store.lock().registry().names()
    }

    /// Record an observation.
    ///
    /// `timestamp` defaults to now. Fails with `NotFound` for an undeclared
    /// name and `TypeMismatch` when the value type differs from the declared
    /// one; a failed submission changes nothing.
    pub fn submit(
        &self,
        name: &str,
        value: impl Into<MetricValue>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let result = self.store.lock().submit(name, value.into(), timestamp);
        match result {
            Ok(_) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            },
        }
    }

    /// Record an observation stamped with the current time
    pub fn submit_now(&self, name: &str, value: impl Into<MetricValue>) -> Result<()> {
        self.submit(name, value, None)
    }

    /// Open the configured file sink and start flushing every `flush_interval`.
    ///
    /// Fails with `AlreadyRunning` if a worker is active, `Config` for a zero
    /// interval, and `SinkUnavailable` if the sink cannot be opened for
    /// appending. The sink file is only created once the other checks pass.
    pub fn start(&self, flush_interval: Duration) -> Result<()> {
        let mut slot = self.worker.lock();
        Self::ensure_idle(&slot)?;
        if flush_interval.is_zero() {
            return Err(MetrologError::config("flush interval must be greater than 0"));
        }
        let sink = FileSink::open(&self.config.sink_path)?;
        self.spawn_worker(&mut slot, Box::new(sink), flush_interval)
    }

    /// Start flushing to a caller-supplied sink.
    pub fn start_with_sink(
        &self,
        flush_interval: Duration,
        sink: Box<dyn MetricSink>,
    ) -> Result<()> {
        let mut slot = self.worker.lock();
        Self::ensure_idle(&slot)?;
        self.spawn_worker(&mut slot, sink, flush_interval)
    }

    /// Stop the worker after its current iteration and wait for it.
    ///
    /// Observations buffered before the call are flushed before it returns.
    pub fn stop(&self) -> Result<()> {
        let mut slot = self.worker.lock();
        match slot.as_mut() {
            Some(worker) if worker.is_active() => worker.stop(),
            _ => Err(MetrologError::NotRunning),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.worker
            .lock()
            .as_ref()
            .map_or(WorkerState::Idle, FlushWorker::state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Observations waiting for the next flush
    pub fn pending(&self) -> usize {
        self.store.lock().pending()
    }

    /// Receiver for background flush failures.
    ///
    /// Reports beyond the configured channel capacity are logged and dropped.
    pub fn flush_errors(&self) -> Receiver<FlushError> {
        self.error_rx.clone()
    }

    pub fn stats(&self) -> CollectorStats {
        let (declared, pending) = {
            let store = self.store.lock();
            (store.registry().len(), store.pending())
        };
        CollectorStats {
            declared,
            pending,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            flushed: self.counters.flushed.load(Ordering::Relaxed),
            flush_count: self.counters.flush_count.load(Ordering::Relaxed),
            failed_flushes: self.counters.failed_flushes.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            last_flush: *self.counters.last_flush.lock(),
        }
    }

    /// Run `f` against the locked store. Used for inspection in tests and tools.
    ///
    /// The store lock is held for the whole call and is not reentrant: `f`
    /// must not call back into this collector, or it will deadlock.
    pub fn with_store<R>(&self, f: impl FnOnce(&MetricStore) -> R) -> R {
        f(&self.store.lock())
    }

    fn ensure_idle(slot: &Option<FlushWorker>) -> Result<()> {
        match slot {
            Some(worker) if worker.is_active() => Err(MetrologError::AlreadyRunning),
            _ => Ok(()),
        }
    }

    fn spawn_worker(
        &self,
        slot: &mut Option<FlushWorker>,
        sink: Box<dyn MetricSink>,
        flush_interval: Duration,
    ) -> Result<()> {
        let worker = FlushWorker::spawn(
            Arc::clone(&self.store),
            sink,
            flush_interval,
            Arc::clone(&self.counters),
            self.error_tx.clone(),
        )?;
        *slot = Some(worker);
        Ok(())
    }
}

impl Drop for MetricCollector {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut() {
            if worker.is_active() {
                if let Err(e) = worker.stop() {
                    tracing::error!("Failed to stop flush worker on drop: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn collector() -> MetricCollector {
        MetricCollector::new(CollectorConfig::default())
    }

    #[test]
    fn test_submit_validation() {
        let collector = collector();
        collector.declare_metric("cpu", MetricType::Float).unwrap();

        assert!(collector.submit_now("cpu", 0.5).is_ok());
        assert!(matches!(
            collector.submit_now("cpu", 1_i64),
            Err(MetrologError::TypeMismatch { .. })
        ));
        assert!(matches!(
            collector.submit_now("mem", 1.0),
            Err(MetrologError::NotFound(_))
        ));

        let stats = collector.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn test_declare_undeclare_cycle() {
        let collector = collector();
        collector.declare_metric("a", MetricType::Integer).unwrap();
        assert!(matches!(
            collector.declare_metric("a", MetricType::Integer),
            Err(MetrologError::AlreadyExists(_))
        ));
        collector.undeclare_metric("a").unwrap();
        collector.declare_metric("a", MetricType::Integer).unwrap();
        assert_eq!(collector.declared_metrics(), vec!["a"]);
    }

    #[test]
    fn test_start_twice_fails() {
        let collector = collector();
        collector
            .start_with_sink(Duration::from_millis(10), Box::new(MemorySink::new()))
            .unwrap();
        assert!(collector.is_running());
        assert!(matches!(
            collector.start_with_sink(Duration::from_millis(10), Box::new(MemorySink::new())),
            Err(MetrologError::AlreadyRunning)
        ));

        collector.stop().unwrap();
        assert_eq!(collector.state(), WorkerState::Stopped);
        assert!(matches!(collector.stop(), Err(MetrologError::NotRunning)));
    }

    #[test]
    fn test_restart_after_stop() {
        let collector = collector();
        collector.declare_metric("n", MetricType::Integer).unwrap();
        let sink = MemorySink::new();

        collector
            .start_with_sink(Duration::from_secs(3600), Box::new(sink.clone()))
            .unwrap();
        collector.submit_now("n", 1).unwrap();
        collector.stop().unwrap();

        collector
            .start_with_sink(Duration::from_secs(3600), Box::new(sink.clone()))
            .unwrap();
        collector.submit_now("n", 2).unwrap();
        collector.stop().unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" 1"));
        assert!(lines[1].ends_with(" 2"));
        assert_eq!(collector.stats().flush_count, 2);
    }

    #[test]
    fn test_zero_interval_creates_no_sink_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.log");
        let collector = MetricCollector::new(CollectorConfig {
            sink_path: path.clone(),
            ..CollectorConfig::default()
        });

        assert!(matches!(
            collector.start(Duration::ZERO),
            Err(MetrologError::Config(_))
        ));
        assert!(!path.exists());
        assert_eq!(collector.state(), WorkerState::Idle);
    }

    #[test]
    fn test_stop_when_idle() {
        let collector = collector();
        assert_eq!(collector.state(), WorkerState::Idle);
        assert!(matches!(collector.stop(), Err(MetrologError::NotRunning)));
    }

    #[test]
    fn test_drop_flushes_pending() {
        let sink = MemorySink::new();
        {
            let collector = collector();
            collector.declare_metric("x", MetricType::Float).unwrap();
            collector
                .start_with_sink(Duration::from_secs(3600), Box::new(sink.clone()))
                .unwrap();
            collector.submit_now("x", 3.5).unwrap();
        }
        assert_eq!(sink.lines().len(), 1);
    }
}
