use super::{Stage, StageRun};
use crate::config::PipelineConfig;
use crate::core::{Artifact, ArtifactSource, Check, StageMetrics, StageName, StageResult, StageStatus};
use crate::data::{csv, Table};
use crate::errors::PipelineError;
use crate::observability::StageTimer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Checks row count, column count and file size of the raw dataset.
///
/// The input file is only read. For an in-memory table the size is that
/// of its CSV encoding.
#[derive(Debug, Clone)]
pub struct DataValidation {
    config: Arc<PipelineConfig>,
}

impl DataValidation {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for DataValidation {
    type Input = ArtifactSource<Table>;
    type Output = Table;

    fn name(&self) -> StageName {
        StageName::Validation
    }

    async fn run(&self, input: ArtifactSource<Table>) -> Result<StageRun<Table>, PipelineError> {
        let timer = StageTimer::start(self.name().as_str());
        info!("Data check");

        let (path, table, size) = match input {
            ArtifactSource::FromPath(path) => {
                let table = Table::load(&path)?;
                let size = std::fs::metadata(&path)?.len();
                (Some(path), table, size)
            }
            ArtifactSource::InMemory(table) => {
                let size = csv::encoded_len(&table)?;
                (None, table, size)
            }
        };

        let limits = &self.config.validation;
        let rows = table.n_rows() as u64;
        let cols = table.n_cols() as u64;
        let row_count = Check::new(rows, rows > limits.min_row_count);
        let col_count = Check::new(cols, cols == limits.expected_col_count);
        let file_size = Check::new(size, size > limits.min_file_size);

        let mut failed = Vec::new();
        if !row_count.passed {
            failed.push(format!(
                "row_count {rows} is not above {}",
                limits.min_row_count
            ));
        }
        if !col_count.passed {
            failed.push(format!(
                "col_count {cols} is not {}",
                limits.expected_col_count
            ));
        }
        if !file_size.passed {
            failed.push(format!(
                "file_size {size} is not above {}",
                limits.min_file_size
            ));
        }
        let status = StageStatus::from_check(failed.is_empty(), || failed.join("; "));

        if status.is_failure() {
            warn!(%status, "Data check failed");
        }
        info!(
            row_count = rows,
            col_count = cols,
            file_size = size,
            duration = %timer.duration_message(),
            "Data check completed"
        );

        let result = StageResult::new(
            self.name(),
            status,
            timer.started_at(),
            StageMetrics::Validation {
                path,
                row_count,
                col_count,
                file_size,
            },
        );
        Ok(StageRun::new(result, table))
    }
}
