//! End-to-end scenarios for the orchestrator.

#[cfg(test)]
mod tests {
    use crate::config::{ArtifactPaths, PipelineConfig, SourceConfig, ValidationConfig};
    use crate::core::{StageMetrics, StageName};
    use crate::errors::PipelineError;
    use crate::notify::CollectingNotifier;
    use crate::observability::{CollectingRecorder, JsonLinesRecorder};
    use crate::pipeline::{Action, Pipeline};
    use crate::source::InMemoryStore;
    use crate::testing::fixtures::{synthetic_table, unlabeled_batch, TableSpec, LABEL_COLUMN};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    const BATCH_TABLE: &str = "q6_batch";

    fn config(dir: &Path, validation: ValidationConfig) -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            source: SourceConfig {
                inference_table: BATCH_TABLE.to_string(),
                ..SourceConfig::default()
            },
            paths: ArtifactPaths::in_dir(dir),
            validation,
            ..PipelineConfig::default()
        })
    }

    fn small_limits(columns: u64) -> ValidationConfig {
        ValidationConfig {
            min_row_count: 100,
            expected_col_count: columns,
            min_file_size: 1_000,
        }
    }

    fn store(rows: usize, columns: usize, minority: usize) -> Arc<InMemoryStore> {
        let training =
            synthetic_table(&TableSpec::new(rows, columns).with_minority(minority)).unwrap();
        let batch = unlabeled_batch(50, columns - 1, 99).unwrap();
        Arc::new(
            InMemoryStore::new()
                .with_table("q6_data", training)
                .with_table(BATCH_TABLE, batch),
        )
    }

    struct Harness {
        dir: TempDir,
        store: Arc<InMemoryStore>,
        recorder: Arc<CollectingRecorder>,
        notifier: Arc<CollectingNotifier>,
        pipeline: Pipeline,
    }

    fn harness(rows: usize, columns: usize, minority: usize, limits: ValidationConfig) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = store(rows, columns, minority);
        let recorder = Arc::new(CollectingRecorder::new());
        let notifier = Arc::new(CollectingNotifier::new());
        let pipeline = Pipeline::new(config(dir.path(), limits), store.clone())
            .with_recorder(recorder.clone())
            .with_notifier(notifier.clone());
        Harness {
            dir,
            store,
            recorder,
            notifier,
            pipeline,
        }
    }

    #[tokio::test]
    async fn test_full_pipeline_end_to_end() {
        let limits = ValidationConfig {
            min_file_size: 1_000,
            ..ValidationConfig::default()
        };
        let h = harness(2000, 152, 100, limits);

        let report = h.pipeline.run_action(Action::FullPipeline, false).await.unwrap();

        assert!(report.succeeded());
        let stages: Vec<StageName> = report.results.iter().map(|r| r.stage).collect();
        assert_eq!(stages, StageName::ALL.to_vec());
        assert_eq!(h.recorder.len(), 5);
        assert!(h.pipeline.config().paths.model_file.exists());

        let processed = report.result(StageName::Processing).unwrap();
        match &processed.metrics {
            StageMetrics::Processing {
                x_shape,
                class_counts_after,
                ..
            } => {
                assert_eq!(*x_shape, [3800, 151]);
                assert_eq!(class_counts_after.get("1"), Some(&1900));
            }
            other => panic!("unexpected metrics {other:?}"),
        }

        let written = h.store.get("q6_data_result").unwrap();
        assert_eq!(written.shape(), [50, 152]);
        let counts = written.value_counts(LABEL_COLUMN).unwrap();
        assert_eq!(counts.values().sum::<usize>(), 50);
        assert!(counts.keys().all(|k| k == "0" || k == "1"));
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_aborts_before_processing() {
        let h = harness(500, 152, 50, ValidationConfig::default());

        let err = h
            .pipeline
            .run_action(Action::FullPipeline, false)
            .await
            .unwrap_err();

        assert!(err.is_data_quality());
        assert_eq!(err.stage_result().map(|r| r.stage), Some(StageName::Validation));
        let recorded: Vec<StageName> = h.recorder.results().iter().map(|r| r.stage).collect();
        assert_eq!(recorded, vec![StageName::Acquisition, StageName::Validation]);
        assert!(!h.pipeline.config().paths.features_file.exists());
        assert!(!h.pipeline.config().paths.model_file.exists());

        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("row_count"));
    }

    #[tokio::test]
    async fn test_failures_can_be_recorded_without_raising() {
        let h = harness(300, 10, 60, small_limits(11));
        let pipeline = h.pipeline.clone().with_raise_on_failure(false);

        let report = pipeline.run_full(false).await.unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.results.len(), 5);
        assert!(report.result(StageName::Validation).unwrap().is_failure());
        assert!(report.result(StageName::Inference).unwrap().is_success());
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_source_error_is_notified() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CollectingNotifier::new());
        let pipeline = Pipeline::new(
            config(dir.path(), ValidationConfig::default()),
            Arc::new(InMemoryStore::new()),
        )
        .with_notifier(notifier.clone());

        let err = pipeline
            .run_action(Action::FullPipeline, false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "Source");
        assert!(!err.is_data_quality());
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("no such table"));
    }

    #[tokio::test]
    async fn test_single_actions_chain_through_files() {
        let h = harness(300, 10, 60, small_limits(10));
        let paths = h.pipeline.config().paths.clone();

        for action in [
            Action::DataFetch,
            Action::DataCheck,
            Action::DataProcess,
            Action::ModelBuild,
            Action::Inference,
        ] {
            let report = h.pipeline.run_action(action, false).await.unwrap();
            assert_eq!(report.results.len(), 1, "{action}");
            assert_eq!(Some(report.results[0].stage), action.stage());
            assert!(report.succeeded(), "{action}");
        }

        for path in paths.all() {
            assert!(path.exists(), "{}", path.display());
        }
        assert_eq!(h.store.get("q6_data_result").unwrap().n_rows(), 50);

        paths.remove_all().unwrap();
        assert!(paths.all().iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_single_action_failure_is_not_raised() {
        let h = harness(300, 10, 60, small_limits(12));

        h.pipeline.run_action(Action::DataFetch, false).await.unwrap();
        let report = h.pipeline.run_action(Action::DataCheck, false).await.unwrap();

        assert!(!report.succeeded());
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_single_action_without_previous_artifact() {
        let h = harness(300, 10, 60, small_limits(10));

        let err = h
            .pipeline
            .run_action(Action::ModelBuild, false)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::FileNotFound { .. }));
        assert!(err.to_string().starts_with("Training Data File Not Found"));
        assert_eq!(h.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_json_lines_recorder_persists_statuses() {
        let h = harness(300, 10, 60, small_limits(12));
        let log = h.dir.path().join("metrics.jsonl");
        let pipeline = h
            .pipeline
            .clone()
            .with_recorder(Arc::new(JsonLinesRecorder::new(&log)))
            .with_raise_on_failure(false);

        pipeline.run_full(false).await.unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["stage"], "data_fetch");
        assert_eq!(lines[1]["status"]["state"], "failure");
        assert_eq!(lines[4]["stage"], "inference");
    }
}
