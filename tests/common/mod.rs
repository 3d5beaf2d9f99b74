//! Common test utilities and fixtures.

#![allow(dead_code)]

use metrolog_lib::collector::MetricCollector;
use metrolog_lib::core::CollectorConfig;
use metrolog_lib::sink::{parse_record, ParsedRecord};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Collector writing to a sink file inside a fresh temp directory.
///
/// The directory lives as long as the fixture.
pub struct SinkFixture {
    pub dir: TempDir,
    pub path: PathBuf,
    pub collector: MetricCollector,
}

impl SinkFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.log");
        let collector = MetricCollector::new(CollectorConfig {
            sink_path: path.clone(),
            flush_interval: Duration::from_millis(50),
            ..CollectorConfig::default()
        });
        Self {
            dir,
            path,
            collector,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        read_lines(&self.path)
    }

    pub fn records(&self) -> Vec<ParsedRecord> {
        self.lines()
            .iter()
            .map(|line| parse_record(line).unwrap())
            .collect()
    }
}

/// Lines of a sink file, or nothing if it does not exist yet
pub fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}
