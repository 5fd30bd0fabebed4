//! Metric recorders that receive every stage result.

use crate::core::StageResult;
use parking_lot::{Mutex, RwLock};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Trait for recorders that receive stage results.
///
/// The orchestrator calls [`MetricsRecorder::record`] once per stage,
/// before deciding whether to continue. Recording must never abort the
/// pipeline, so implementations log their own failures.
pub trait MetricsRecorder: Send + Sync {
    /// Records one stage result.
    fn record(&self, result: &StageResult);
}

/// A recorder that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRecorder;

impl MetricsRecorder for NoOpRecorder {
    fn record(&self, _result: &StageResult) {}
}

/// A recorder that logs each result through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRecorder;

impl MetricsRecorder for LoggingRecorder {
    fn record(&self, result: &StageResult) {
        let payload = serde_json::to_string(result).unwrap_or_else(|_| format!("{result:?}"));
        info!(
            stage = %result.stage,
            status = %result.status,
            duration = %result.duration_message(),
            memory_usage_percent = ?result.memory_usage_percent,
            metrics = %payload,
            "Stage metrics"
        );
    }
}

/// A collecting recorder for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingRecorder {
    results: RwLock<Vec<StageResult>>,
}

impl CollectingRecorder {
    /// Creates a new collecting recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected results.
    #[must_use]
    pub fn results(&self) -> Vec<StageResult> {
        self.results.read().clone()
    }

    /// Returns the number of collected results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

impl MetricsRecorder for CollectingRecorder {
    fn record(&self, result: &StageResult) {
        self.results.write().push(result.clone());
    }
}

/// Appends one JSON object per stage result to a file.
#[derive(Debug)]
pub struct JsonLinesRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesRecorder {
    /// Creates a recorder appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The file results are appended to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, result: &StageResult) -> std::io::Result<()> {
        let line = serde_json::to_string(result)?;
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl MetricsRecorder for JsonLinesRecorder {
    fn record(&self, result: &StageResult) {
        if let Err(err) = self.append(result) {
            warn!(path = %self.path.display(), error = %err, "Failed to append stage metrics");
        }
    }
}

/// Forwards every result to several recorders.
#[derive(Default)]
pub struct FanoutRecorder {
    recorders: Vec<Arc<dyn MetricsRecorder>>,
}

impl FanoutRecorder {
    /// Creates an empty fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recorder.
    #[must_use]
    pub fn with(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorders.push(recorder);
        self
    }

    /// Number of recorders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    /// Returns true if there are no recorders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }
}

impl MetricsRecorder for FanoutRecorder {
    fn record(&self, result: &StageResult) {
        for recorder in &self.recorders {
            recorder.record(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StageMetrics, StageName, StageStatus};
    use chrono::Utc;

    fn result(stage: StageName) -> StageResult {
        StageResult::new(stage, StageStatus::Success, Utc::now(), StageMetrics::Empty)
    }

    #[test]
    fn test_noop_and_logging_recorders() {
        NoOpRecorder.record(&result(StageName::Acquisition));
        LoggingRecorder.record(&result(StageName::Acquisition));
        // Should not panic
    }

    #[test]
    fn test_collecting_recorder() {
        let recorder = CollectingRecorder::new();
        assert!(recorder.is_empty());

        recorder.record(&result(StageName::Acquisition));
        recorder.record(&result(StageName::Validation));

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.results()[1].stage, StageName::Validation);
    }

    #[test]
    fn test_json_lines_recorder_appends() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = JsonLinesRecorder::new(dir.path().join("metrics.jsonl"));

        recorder.record(&result(StageName::Acquisition));
        recorder.record(&result(StageName::Validation));

        let contents = std::fs::read_to_string(recorder.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: StageResult = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.stage, StageName::Validation);
    }

    #[test]
    fn test_json_lines_recorder_bad_path_does_not_panic() {
        let recorder = JsonLinesRecorder::new("/nonexistent/tabflow/metrics.jsonl");
        recorder.record(&result(StageName::Acquisition));
    }

    #[test]
    fn test_fanout_recorder() {
        let first = Arc::new(CollectingRecorder::new());
        let second = Arc::new(CollectingRecorder::new());
        let fanout = FanoutRecorder::new()
            .with(first.clone())
            .with(second.clone());

        assert_eq!(fanout.len(), 2);
        fanout.record(&result(StageName::Build));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
