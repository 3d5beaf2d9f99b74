//! Durable destinations for flushed observations.
//!
//! The flush worker owns its sink exclusively. A sink receives observations
//! in buffer order followed by a single [`MetricSink::flush`] per cycle.

pub mod format;

use crate::core::{MetrologError, Result};
use crate::metrics::Observation;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use format::{format_record, parse_record, ParsedRecord};

/// Append-only destination for formatted observations
pub trait MetricSink: Send {
    /// Write one observation as one record.
    fn write_observation(&mut self, observation: &Observation) -> std::io::Result<()>;

    /// Push buffered records to durable storage.
    fn flush(&mut self) -> std::io::Result<()>;

    /// Forget records written since the last successful flush.
    ///
    /// Called after a failed batch so none of it reaches storage later.
    fn discard(&mut self) {}

    /// Human-readable description for logs and errors
    fn describe(&self) -> String;
}

/// Text log opened in append mode.
///
/// Records are staged per batch and written on [`MetricSink::flush`]. A
/// failed flush discards the staged batch; if the failure left a partial
/// line in the file, the next batch starts on a fresh line.
pub struct FileSink<W = File> {
    path: PathBuf,
    out: W,
    staged: Vec<u8>,
    torn: bool,
}

impl FileSink<File> {
    /// Open (or create) `path` for appending.
    ///
    /// Existing content is never truncated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| MetrologError::sink_unavailable(path.display().to_string(), e))?;

        tracing::debug!("Opened metric sink {:?} for appending", path);
        Ok(Self::with_writer(path, file))
    }
}

impl<W: Write> FileSink<W> {
    /// Wrap an already-open writer, described by `path`
    pub fn with_writer(path: impl Into<PathBuf>, out: W) -> Self {
        Self {
            path: path.into(),
            out,
            staged: Vec::new(),
            torn: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_staged(&mut self) -> std::io::Result<()> {
        if self.torn {
            self.out.write_all(b"\n")?;
            self.torn = false;
        }

        let mut written = 0;
        while written < self.staged.len() {
            let err = match self.out.write(&self.staged[written..]) {
                Ok(0) => std::io::Error::from(ErrorKind::WriteZero),
                Ok(n) => {
                    written += n;
                    continue;
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => e,
            };
            // A partial line may now sit at the end of the file
            self.torn = written > 0 && self.staged[written - 1] != b'\n';
            return Err(err);
        }
        self.out.flush()
    }
}

impl<W: Write + Send> MetricSink for FileSink<W> {
    fn write_observation(&mut self, observation: &Observation) -> std::io::Result<()> {
        self.staged
            .extend_from_slice(format_record(observation).as_bytes());
        self.staged.push(b'\n');
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let result = self.write_staged();
        self.staged.clear();
        result
    }

    fn discard(&mut self) {
        self.staged.clear();
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory sink that keeps formatted lines.
///
/// Cloning shares the same line store, so a clone can be handed to the
/// collector while the original is used to inspect what was flushed.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
    flushes: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of flush calls received
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

impl MetricSink for MemorySink {
    fn write_observation(&mut self, observation: &Observation) -> std::io::Result<()> {
        self.lines.lock().push(format_record(observation));
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        *self.flushes.lock() += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
