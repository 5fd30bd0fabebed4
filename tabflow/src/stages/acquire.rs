use super::{Stage, StageRun};
use crate::config::PipelineConfig;
use crate::core::{StageMetrics, StageName, StageResult, StageStatus};
use crate::data::csv;
use crate::errors::PipelineError;
use crate::observability::StageTimer;
use crate::source::TabularSource;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Snapshots the configured source table into the raw data file.
#[derive(Clone)]
pub struct DataAcquisition {
    config: Arc<PipelineConfig>,
    source: Arc<dyn TabularSource>,
}

impl DataAcquisition {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, source: Arc<dyn TabularSource>) -> Self {
        Self { config, source }
    }
}

impl fmt::Debug for DataAcquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAcquisition")
            .field("table", &self.config.source.table)
            .field("path", &self.config.paths.data_file)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for DataAcquisition {
    type Input = ();
    type Output = PathBuf;

    fn name(&self) -> StageName {
        StageName::Acquisition
    }

    async fn run(&self, _input: ()) -> Result<StageRun<PathBuf>, PipelineError> {
        let timer = StageTimer::start(self.name().as_str());
        let table_name = &self.config.source.table;
        let path = self.config.paths.data_file.clone();
        info!(table = %table_name, "Fetch data from source");

        let table = self.source.fetch_table(table_name).await?;
        csv::write_csv(&table, &path)?;

        let status = StageStatus::from_check(path.exists(), || {
            format!("snapshot was not written to {}", path.display())
        });
        info!(
            rows = table.n_rows(),
            columns = table.n_cols(),
            path = %path.display(),
            duration = %timer.duration_message(),
            "Fetch data completed"
        );

        let result = StageResult::new(
            self.name(),
            status,
            timer.started_at(),
            StageMetrics::Acquisition {
                table: table_name.clone(),
                path: path.clone(),
                rows: table.n_rows(),
                columns: table.n_cols(),
            },
        );
        Ok(StageRun::new(result, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactPaths;
    use crate::data::{Cell, Table};
    use crate::source::{InMemoryStore, MockTabularSource};
    use pretty_assertions::assert_eq;

    fn config(dir: &std::path::Path) -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            paths: ArtifactPaths::in_dir(dir),
            ..PipelineConfig::default()
        })
    }

    #[tokio::test]
    async fn test_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let table = Table::from_rows(
            vec!["a".into(), "target".into()],
            vec![vec![Cell::Number(1.0), Cell::Number(0.0)]],
        )
        .unwrap();
        let source = Arc::new(InMemoryStore::new().with_table("q6_data", table.clone()));

        let run = DataAcquisition::new(config.clone(), source).run(()).await.unwrap();

        assert!(run.result.is_success());
        assert_eq!(run.artifact, config.paths.data_file);
        assert_eq!(csv::read_csv(&run.artifact).unwrap(), table);
        assert!(matches!(
            run.result.metrics,
            StageMetrics::Acquisition { rows: 1, columns: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_overwrites_existing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.paths.data_file, "stale,contents\n1,2\n3,4\n").unwrap();
        let table = Table::from_rows(vec!["x".into()], vec![vec![Cell::Number(5.0)]]).unwrap();
        let source = Arc::new(InMemoryStore::new().with_table("q6_data", table.clone()));

        DataAcquisition::new(config.clone(), source).run(()).await.unwrap();

        assert_eq!(csv::read_csv(&config.paths.data_file).unwrap(), table);
    }

    #[tokio::test]
    async fn test_source_error_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut source = MockTabularSource::new();
        source
            .expect_fetch_table()
            .times(1)
            .returning(|_| Err(PipelineError::Source("connection refused".into())));

        let err = DataAcquisition::new(config.clone(), Arc::new(source))
            .run(())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "Source");
        assert!(!config.paths.data_file.exists());
    }
}
