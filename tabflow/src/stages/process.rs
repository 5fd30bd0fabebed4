use super::{join_error, Stage, StageRun};
use crate::config::PipelineConfig;
use crate::core::{ArtifactSource, StageMetrics, StageName, StageResult, StageStatus};
use crate::data::{label_counts, Table, TrainingSet};
use crate::errors::PipelineError;
use crate::ml::{MedianImputer, Smote};
use crate::observability::StageTimer;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Shuffles, splits, imputes and rebalances the raw dataset, then writes
/// the feature matrix and label vector.
#[derive(Debug, Clone)]
pub struct DataProcessing {
    config: Arc<PipelineConfig>,
}

impl DataProcessing {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }
}

struct Prepared {
    training: TrainingSet,
    before: BTreeMap<String, usize>,
    after: BTreeMap<String, usize>,
}

fn prepare(config: &PipelineConfig, mut table: Table) -> Result<Prepared, PipelineError> {
    let label = &config.processing.label_column;
    let counts = table.value_counts(label).map_err(|_| {
        PipelineError::malformed(format!("dataset has no label column '{label}'"))
    })?;
    debug!(?counts, "Rows per class");

    table.move_column_to_end(label);
    table.shuffle_rows(&mut rand::thread_rng());
    let (mut features, labels) = table.split_last_column()?;
    if labels.is_empty() {
        return Err(PipelineError::malformed("dataset has no rows to process"));
    }
    let before = label_counts(&labels);
    if before.len() < 2 {
        return Err(PipelineError::malformed(format!(
            "rebalancing needs at least two classes in '{label}', found {}",
            before.len()
        )));
    }

    MedianImputer::fit_transform(&mut features)?;

    let smote = Smote::new(
        config.processing.smote_k_neighbors,
        config.processing.smote_seed,
    );
    let (features, labels) = smote.fit_resample(&features, &labels)?;
    let training = TrainingSet::new(features, labels)?;
    let after = training.class_counts();
    debug!(?before, ?after, "Rebalanced classes");

    let paths = config.paths.training_set();
    training.save(&paths)?;

    Ok(Prepared {
        training,
        before,
        after,
    })
}

#[async_trait]
impl Stage for DataProcessing {
    type Input = ArtifactSource<Table>;
    type Output = TrainingSet;

    fn name(&self) -> StageName {
        StageName::Processing
    }

    async fn run(
        &self,
        input: ArtifactSource<Table>,
    ) -> Result<StageRun<TrainingSet>, PipelineError> {
        let timer = StageTimer::start(self.name().as_str());
        info!("Data processing");

        let table = input.resolve()?;
        let config = Arc::clone(&self.config);
        let prepared = tokio::task::spawn_blocking(move || prepare(&config, table))
            .await
            .map_err(|e| join_error(self.name(), &e))??;

        let paths = self.config.paths.training_set();
        let status = StageStatus::from_check(
            paths.features.exists() && paths.labels.exists(),
            || "feature or label file was not written".to_string(),
        );
        let (rows, cols) = prepared.training.features().dim();
        let x_shape = [rows, cols];
        let y_shape = prepared.training.labels().len();
        info!(
            ?x_shape,
            y_shape,
            duration = %timer.duration_message(),
            "Data processing completed"
        );

        let result = StageResult::new(
            self.name(),
            status,
            timer.started_at(),
            StageMetrics::Processing {
                x_shape,
                y_shape,
                x_path: paths.features,
                y_path: paths.labels,
                class_counts_before: prepared.before,
                class_counts_after: prepared.after,
            },
        );
        Ok(StageRun::new(result, prepared.training))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArtifactPaths;
    use crate::core::Artifact;
    use crate::data::{has_nan, Cell};
    use crate::testing::fixtures::{synthetic_table, TableSpec};
    use pretty_assertions::assert_eq;

    fn stage(dir: &std::path::Path) -> DataProcessing {
        DataProcessing::new(Arc::new(PipelineConfig {
            paths: ArtifactPaths::in_dir(dir),
            ..PipelineConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_output_is_clean_and_balanced() {
        let dir = tempfile::tempdir().unwrap();
        let table = synthetic_table(
            &TableSpec::new(200, 12)
                .with_minority(20)
                .with_missing_rate(0.05),
        )
        .unwrap();

        let run = stage(dir.path()).run(table.into()).await.unwrap();
        let set = &run.artifact;

        assert!(run.result.is_success());
        assert_eq!(set.features().nrows(), set.labels().len());
        assert_eq!(set.features().ncols(), 11);
        assert!(!has_nan(set.features()));

        let counts = set.class_counts();
        assert_eq!(counts.get("0"), Some(&180));
        assert_eq!(counts.get("1"), Some(&180));

        match &run.result.metrics {
            StageMetrics::Processing {
                x_shape,
                y_shape,
                class_counts_before,
                ..
            } => {
                assert_eq!(*x_shape, [360, 11]);
                assert_eq!(*y_shape, 360);
                assert_eq!(class_counts_before.get("1"), Some(&20));
            }
            other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reloaded_files_match_memory() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path());
        let table = synthetic_table(&TableSpec::new(120, 8).with_minority(30)).unwrap();

        let run = stage.run(table.into()).await.unwrap();
        let reloaded = TrainingSet::load(&stage.config.paths.training_set()).unwrap();

        assert_eq!(reloaded, run.artifact);
    }

    #[tokio::test]
    async fn test_label_column_need_not_be_last() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::from_rows(
            vec!["target".into(), "a".into()],
            (0..10)
                .map(|i| vec![Cell::Number(f64::from(i % 2)), Cell::Number(f64::from(i))])
                .collect(),
        )
        .unwrap();

        let run = stage(dir.path()).run(table.into()).await.unwrap();
        assert_eq!(run.artifact.features().ncols(), 1);
        assert_eq!(run.artifact.class_counts().get("1"), Some(&5));
    }

    #[tokio::test]
    async fn test_missing_label_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::from_rows(vec!["a".into()], vec![vec![Cell::Number(1.0)]]).unwrap();

        let err = stage(dir.path()).run(table.into()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedData(_)));
    }

    #[tokio::test]
    async fn test_text_feature_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::from_rows(
            vec!["a".into(), "target".into()],
            vec![
                vec![Cell::Text("abc".into()), Cell::Number(0.0)],
                vec![Cell::Number(1.0), Cell::Number(1.0)],
            ],
        )
        .unwrap();

        let err = stage(dir.path()).run(table.into()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedData(_)));
    }

    #[tokio::test]
    async fn test_header_only_table_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path());
        let table = Table::new(vec!["a".into(), "target".into()]);

        let err = stage.run(table.into()).await.unwrap_err();

        assert!(matches!(err, PipelineError::MalformedData(_)));
        assert!(err.to_string().contains("no rows"));
        assert!(!stage.config.paths.features_file.exists());
    }

    #[tokio::test]
    async fn test_single_class_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path());
        let table = Table::from_rows(
            vec!["a".into(), "target".into()],
            (0..10)
                .map(|i| vec![Cell::Number(f64::from(i)), Cell::Number(0.0)])
                .collect(),
        )
        .unwrap();

        let err = stage.run(table.into()).await.unwrap_err();

        assert!(matches!(err, PipelineError::MalformedData(_)));
        assert!(err.to_string().contains("at least two classes"));
        assert!(!stage.config.paths.labels_file.exists());
    }
}
