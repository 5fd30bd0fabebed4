//! Typed stage result records.

use super::{StageName, StageStatus};
use crate::ml::{ConfusionMatrix, SearchReport};
use crate::utils::memory_usage_percent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single threshold check: the observed value and whether it passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// The observed value.
    pub value: u64,
    /// Whether the value met its threshold.
    pub passed: bool,
}

impl Check {
    /// Creates a new check.
    #[must_use]
    pub fn new(value: u64, passed: bool) -> Self {
        Self { value, passed }
    }
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageMetrics {
    /// No metrics were collected.
    Empty,
    /// Snapshot written by the acquisition stage.
    Acquisition {
        /// Table that was read.
        table: String,
        /// Where the snapshot was written.
        path: PathBuf,
        /// Rows in the snapshot.
        rows: usize,
        /// Columns in the snapshot.
        columns: usize,
    },
    /// Threshold checks of the validation stage.
    Validation {
        /// The file that was checked, if read from disk.
        path: Option<PathBuf>,
        /// Number of data rows.
        row_count: Check,
        /// Number of columns.
        col_count: Check,
        /// File size in bytes.
        file_size: Check,
    },
    /// Shapes and class balance of the processing stage.
    Processing {
        /// `[rows, columns]` of the feature matrix.
        x_shape: [usize; 2],
        /// Length of the label vector.
        y_shape: usize,
        /// Where the feature matrix was written.
        x_path: PathBuf,
        /// Where the label vector was written.
        y_path: PathBuf,
        /// Per-class counts before rebalancing.
        class_counts_before: BTreeMap<String, usize>,
        /// Per-class counts after rebalancing.
        class_counts_after: BTreeMap<String, usize>,
    },
    /// Evaluation of the build stage.
    Build {
        /// Confusion matrix on the held-out split.
        confusion_matrix: ConfusionMatrix,
        /// Accuracy on the held-out split.
        score: f64,
        /// Whether randomized search was used.
        tuning_enabled: bool,
        /// Where the model was written.
        model_save_path: PathBuf,
        /// SHA-256 of the written model file.
        model_sha256: Option<String>,
        /// Search summary when tuning was enabled.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search: Option<SearchReport>,
    },
    /// Shapes of the inference stage.
    Inference {
        /// `[rows, columns]` of the joined output table.
        data_input_shape: [usize; 2],
        /// Number of predictions.
        data_output_shape: usize,
        /// Destination table, when results were written.
        result_table: Option<String>,
    },
}

/// Record produced by every stage describing its own outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage produced this result.
    pub stage: StageName,
    /// Outcome of the stage.
    pub status: StageStatus,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// System memory usage when the stage ended.
    pub memory_usage_percent: Option<f64>,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

impl StageResult {
    /// Creates a result ending now, sampling current memory usage.
    #[must_use]
    pub fn new(
        stage: StageName,
        status: StageStatus,
        started_at: DateTime<Utc>,
        metrics: StageMetrics,
    ) -> Self {
        Self {
            stage,
            status,
            started_at,
            ended_at: Utc::now(),
            memory_usage_percent: memory_usage_percent(),
            metrics,
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64
    }

    /// Returns the duration as a rounded `"N seconds"` message.
    #[must_use]
    pub fn duration_message(&self) -> String {
        crate::observability::duration_message(self.duration_ms() / 1000.0)
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}
