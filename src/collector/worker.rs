//! Background flush worker.
//!
//! A single named thread wakes every `flush_interval`, drains the store under
//! its lock, then writes the drained batch to the sink with the lock
//! released. Stop is cooperative: the signal is only observed between
//! iterations, and the worker drains once more before exiting so nothing
//! submitted before `stop` is left behind.

use crate::core::{MetrologError, Result};
use crate::metrics::{MetricStore, Observation};
use crate::sink::MetricSink;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Lifecycle of a flush worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Not started
    Idle = 0,
    /// Flushing on every interval
    Running = 1,
    /// Stop requested, finishing the current iteration
    Stopping = 2,
    /// Loop exited
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            3 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

/// A background flush that failed to reach the sink
#[derive(Debug, Clone)]
pub struct FlushError {
    /// When the failure happened
    pub occurred_at: DateTime<Utc>,
    /// Observations in the failed batch (dropped)
    pub observations: usize,
    /// Sink description
    pub sink: String,
    /// Underlying IO error text
    pub message: String,
}

impl std::fmt::Display for FlushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "flush of {} observations to {} failed: {}",
            self.observations, self.sink, self.message
        )
    }
}

/// Counters shared between the collector and its worker
#[derive(Debug, Default)]
pub(crate) struct FlushCounters {
    pub submitted: AtomicU64,
    pub rejected: AtomicU64,
    pub flushed: AtomicU64,
    pub flush_count: AtomicU64,
    pub failed_flushes: AtomicU64,
    pub dropped: AtomicU64,
    pub last_flush: Mutex<Option<DateTime<Utc>>>,
}

impl FlushCounters {
    fn record_flush(&self, observations: usize) {
        self.flushed
            .fetch_add(observations as u64, Ordering::Relaxed);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        *self.last_flush.lock() = Some(Utc::now());
    }

    fn record_failure(&self, observations: usize) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.dropped
            .fetch_add(observations as u64, Ordering::Relaxed);
    }
}

/// Owned handle to a running flush thread
pub struct FlushWorker {
    state: Arc<AtomicU8>,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl FlushWorker {
    /// Spawn the flush thread. The sink must already be open.
    pub(crate) fn spawn(
        store: Arc<Mutex<MetricStore>>,
        sink: Box<dyn MetricSink>,
        flush_interval: Duration,
        counters: Arc<FlushCounters>,
        errors: Sender<FlushError>,
    ) -> Result<Self> {
        if flush_interval.is_zero() {
            return Err(MetrologError::config("flush interval must be greater than 0"));
        }

        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let mut flush_loop = FlushLoop {
            store,
            sink,
            counters,
            errors,
        };
        let thread_state = Arc::clone(&state);

        state.store(WorkerState::Running as u8, Ordering::Release);
        let handle = std::thread::Builder::new()
            .name("metrolog-flush".to_string())
            .spawn(move || {
                tracing::info!(
                    "Flush worker started: sink={}, interval={:?}",
                    flush_loop.sink.describe(),
                    flush_interval
                );

                loop {
                    // A closed channel counts as a stop request
                    let stop_requested = select! {
                        recv(stop_rx) -> _ => true,
                        default(flush_interval) => false,
                    };
                    if stop_requested {
                        break;
                    }
                    flush_loop.flush_once();
                }

                thread_state.store(WorkerState::Stopping as u8, Ordering::Release);
                let last = flush_loop.flush_once();
                tracing::info!("Flush worker stopped after final flush of {} observations", last);
                thread_state.store(WorkerState::Stopped as u8, Ordering::Release);
            })
            .map_err(|e| {
                state.store(WorkerState::Stopped as u8, Ordering::Release);
                MetrologError::Worker(format!("failed to spawn flush thread: {}", e))
            })?;

        Ok(Self {
            state,
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the thread has not yet been joined
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Signal the loop and wait for it to exit.
    pub fn stop(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(MetrologError::NotRunning)?;

        // The thread may already be past its select, so a full channel is fine
        let _ = self
            .state
            .compare_exchange(
                WorkerState::Running as u8,
                WorkerState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        let _ = self.stop_tx.try_send(());

        handle
            .join()
            .map_err(|_| {
                self.state.store(WorkerState::Stopped as u8, Ordering::Release);
                MetrologError::Worker("flush thread panicked".to_string())
            })
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.stop() {
                tracing::error!("Flush worker did not shut down cleanly: {}", e);
            }
        }
    }
}

struct FlushLoop {
    store: Arc<Mutex<MetricStore>>,
    sink: Box<dyn MetricSink>,
    counters: Arc<FlushCounters>,
    errors: Sender<FlushError>,
}

impl FlushLoop {
    /// Drain and write one batch, returning how many observations it held.
    fn flush_once(&mut self) -> usize {
        // Lock held only for the drain; the sink write happens after release
        let batch = self.store.lock().drain();
        if batch.is_empty() {
            return 0;
        }

        match self.write_batch(&batch) {
            Ok(()) => {
                self.counters.record_flush(batch.len());
                tracing::debug!("Flushed {} observations to {}", batch.len(), self.sink.describe());
            },
            Err(e) => {
                self.sink.discard();
                self.counters.record_failure(batch.len());
                tracing::error!(
                    "Failed to flush {} observations to {}: {}",
                    batch.len(),
                    self.sink.describe(),
                    e
                );
                self.report(FlushError {
                    occurred_at: Utc::now(),
                    observations: batch.len(),
                    sink: self.sink.describe(),
                    message: e.to_string(),
                });
            },
        }
        batch.len()
    }

    fn write_batch(&mut self, batch: &[Observation]) -> std::io::Result<()> {
        for observation in batch {
            self.sink.write_observation(observation)?;
        }
        self.sink.flush()
    }

    fn report(&self, error: FlushError) {
        match self.errors.try_send(error) {
            Ok(()) => {},
            Err(TrySendError::Full(e)) => {
                tracing::warn!("Flush error channel full, discarding report: {}", e);
            },
            // Collector gone; nobody left to observe the error
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}
