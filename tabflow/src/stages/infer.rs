use super::{join_error, Stage, StageRun};
use crate::config::PipelineConfig;
use crate::core::{ArtifactSource, StageMetrics, StageName, StageResult, StageStatus};
use crate::data::Table;
use crate::errors::PipelineError;
use crate::ml::{MedianImputer, TrainedModel};
use crate::observability::StageTimer;
use crate::source::TabularSource;
use async_trait::async_trait;
use ndarray::Array1;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Input of [`BatchInference`].
#[derive(Debug, Clone)]
pub struct InferenceInput {
    /// The classifier to apply.
    pub model: ArtifactSource<TrainedModel>,
    /// Write the joined table back to the source.
    pub persist: bool,
}

/// Output of [`BatchInference`].
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    /// One predicted label per input row.
    pub labels: Array1<f64>,
    /// The input rows with the predictions as the label column.
    pub table: Table,
}

/// Labels a batch of rows pulled from the source.
#[derive(Clone)]
pub struct BatchInference {
    config: Arc<PipelineConfig>,
    source: Arc<dyn TabularSource>,
}

impl BatchInference {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, source: Arc<dyn TabularSource>) -> Self {
        Self { config, source }
    }
}

impl fmt::Debug for BatchInference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchInference")
            .field("table", &self.config.source.inference_table)
            .field("result_table", &self.config.source.result_table)
            .finish_non_exhaustive()
    }
}

// The imputer is fitted on the batch itself, not on the training data.
fn predict(model: &TrainedModel, table: &Table) -> Result<Array1<f64>, PipelineError> {
    let mut features = table.to_matrix()?;
    let imputer = MedianImputer::fit_transform(&mut features)?;
    debug!(medians = imputer.medians().len(), "Imputed inference batch");
    model.predict(&features)
}

#[async_trait]
impl Stage for BatchInference {
    type Input = InferenceInput;
    type Output = Predictions;

    fn name(&self) -> StageName {
        StageName::Inference
    }

    async fn run(&self, input: InferenceInput) -> Result<StageRun<Predictions>, PipelineError> {
        let timer = StageTimer::start(self.name().as_str());
        info!(persist = input.persist, "Batch inference");

        let model = input.model.resolve()?;
        let source = &self.config.source;
        let label = &self.config.processing.label_column;

        let mut table = self.source.fetch_table(&source.inference_table).await?;
        if table.drop_column(label) {
            debug!(column = %label, "Dropped label column from inference batch");
        }

        let batch = table.clone();
        let labels = tokio::task::spawn_blocking(move || predict(&model, &batch))
            .await
            .map_err(|e| join_error(self.name(), &e))??;
        table.set_column(label, &labels)?;

        let result_table = if input.persist {
            self.source
                .replace_table(&source.result_table, &table)
                .await?;
            Some(source.result_table.clone())
        } else {
            None
        };

        let [rows, cols] = table.shape();
        let status = StageStatus::from_check(rows > 0 && cols > 0 && !labels.is_empty(), || {
            format!("empty inference output: {rows} rows, {} predictions", labels.len())
        });
        info!(
            rows,
            predictions = labels.len(),
            result_table = ?result_table,
            duration = %timer.duration_message(),
            "Batch inference completed"
        );

        let result = StageResult::new(
            self.name(),
            status,
            timer.started_at(),
            StageMetrics::Inference {
                data_input_shape: [rows, cols],
                data_output_shape: labels.len(),
                result_table,
            },
        );
        Ok(StageRun::new(result, Predictions { labels, table }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactPaths;
    use crate::source::{InMemoryStore, MockTabularSource};
    use crate::testing::fixtures::{trained_model, unlabeled_batch, LABEL_COLUMN};
    use pretty_assertions::assert_eq;

    fn config(dir: &std::path::Path) -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            paths: ArtifactPaths::in_dir(dir),
            ..PipelineConfig::default()
        })
    }

    fn input(model: TrainedModel, persist: bool) -> InferenceInput {
        InferenceInput {
            model: model.into(),
            persist,
        }
    }

    #[tokio::test]
    async fn test_predicts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let batch = unlabeled_batch(30, 4, 2).unwrap();
        let store = Arc::new(InMemoryStore::new().with_table("q6_data", batch.clone()));

        let run = BatchInference::new(config(dir.path()), store.clone())
            .run(input(trained_model(4).unwrap(), true))
            .await
            .unwrap();

        assert!(run.result.is_success());
        assert_eq!(run.artifact.labels.len(), 30);
        assert!(run.artifact.labels.iter().all(|v| *v == 0.0 || *v == 1.0));
        assert_eq!(run.artifact.table.shape(), [30, 5]);
        assert_eq!(
            run.artifact.table.columns().last().map(String::as_str),
            Some(LABEL_COLUMN)
        );
        assert_eq!(store.get("q6_data_result"), Some(run.artifact.table.clone()));
        assert_eq!(store.get("q6_data"), Some(batch));
        assert!(matches!(
            run.result.metrics,
            StageMetrics::Inference {
                data_input_shape: [30, 5],
                data_output_shape: 30,
                result_table: Some(_),
            }
        ));
    }

    #[tokio::test]
    async fn test_existing_label_column_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let mut batch = unlabeled_batch(10, 3, 5).unwrap();
        batch
            .set_column(LABEL_COLUMN, &Array1::from_elem(10, 9.0))
            .unwrap();
        let store = Arc::new(InMemoryStore::new().with_table("q6_data", batch));

        let run = BatchInference::new(config(dir.path()), store.clone())
            .run(input(trained_model(3).unwrap(), false))
            .await
            .unwrap();

        assert_eq!(run.artifact.table.shape(), [10, 4]);
        assert!(run.artifact.labels.iter().all(|v| *v != 9.0));
        assert!(store.get("q6_data_result").is_none());
    }

    #[tokio::test]
    async fn test_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let store = Arc::new(InMemoryStore::new());

        let err = BatchInference::new(config.clone(), store)
            .run(InferenceInput {
                model: ArtifactSource::FromPath(config.paths.model_file.clone()),
                persist: true,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::FileNotFound { .. }));
        assert!(err.to_string().starts_with("Model File not Found"));
    }

    #[tokio::test]
    async fn test_store_write_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let batch = unlabeled_batch(8, 2, 9).unwrap();
        let mut source = MockTabularSource::new();
        source
            .expect_fetch_table()
            .times(1)
            .returning(move |_| Ok(batch.clone()));
        source
            .expect_replace_table()
            .times(1)
            .returning(|_, _| Err(PipelineError::Source("disk full".into())));

        let err = BatchInference::new(config(dir.path()), Arc::new(source))
            .run(input(trained_model(2).unwrap(), true))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "Source");
    }

    #[tokio::test]
    async fn test_empty_batch_fails_status() {
        let dir = tempfile::tempdir().unwrap();
        let empty = Table::new(vec!["f0".into(), "f1".into()]);
        let store = Arc::new(InMemoryStore::new().with_table("q6_data", empty));

        let run = BatchInference::new(config(dir.path()), store)
            .run(input(trained_model(2).unwrap(), false))
            .await
            .unwrap();

        assert!(run.result.is_failure());
        assert!(run.artifact.labels.is_empty());
    }

    #[tokio::test]
    async fn test_feature_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            InMemoryStore::new().with_table("q6_data", unlabeled_batch(5, 6, 1).unwrap()),
        );

        let err = BatchInference::new(config(dir.path()), store)
            .run(input(trained_model(4).unwrap(), false))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "Model");
    }
}
