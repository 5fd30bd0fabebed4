//! Sequential execution of the five stages.

use super::Action;
use crate::config::PipelineConfig;
use crate::core::{ArtifactSource, StageName, StageResult};
use crate::errors::PipelineError;
use crate::notify::{NoOpNotifier, Notifier};
use crate::observability::{LoggingRecorder, MetricsRecorder};
use crate::source::TabularSource;
use crate::stages::{
    BatchInference, BuildInput, DataAcquisition, DataProcessing, DataValidation, InferenceInput,
    ModelBuild, Stage, StageRun,
};
use crate::utils::generate_run_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Every stage result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Unique id of the invocation.
    pub run_id: Uuid,
    /// Results in execution order.
    pub results: Vec<StageResult>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            run_id: generate_run_id(),
            results: Vec::new(),
        }
    }

    /// True if at least one stage ran and none failed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(StageResult::is_success)
    }

    /// The result of `stage`, if it ran.
    #[must_use]
    pub fn result(&self, stage: StageName) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == stage)
    }
}

/// Runs stages in order, records their results and stops on failure.
///
/// Stages are never retried. With `raise_on_failure` (the default) the
/// first failed stage ends the run with [`PipelineError::StageFailed`].
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    source: Arc<dyn TabularSource>,
    recorder: Arc<dyn MetricsRecorder>,
    notifier: Arc<dyn Notifier>,
    raise_on_failure: bool,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("raise_on_failure", &self.raise_on_failure)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline that logs results and notifies nobody.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, source: Arc<dyn TabularSource>) -> Self {
        Self {
            config,
            source,
            recorder: Arc::new(LoggingRecorder),
            notifier: Arc::new(NoOpNotifier),
            raise_on_failure: true,
        }
    }

    /// Sets where stage results are recorded.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Sets who is told about errors.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Whether a failed stage aborts the full pipeline.
    #[must_use]
    pub fn with_raise_on_failure(mut self, raise: bool) -> Self {
        self.raise_on_failure = raise;
        self
    }

    /// The configuration every stage sees.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs `action`, reporting any error to the notifier before
    /// returning it.
    pub async fn run_action(
        &self,
        action: Action,
        enable_tuning: bool,
    ) -> Result<PipelineReport, PipelineError> {
        info!(%action, enable_tuning, "Pipeline action started");
        let outcome = match action {
            Action::FullPipeline => self.run_full(enable_tuning).await,
            single => self.run_single(single, enable_tuning).await,
        };

        match outcome {
            Ok(report) => {
                info!(
                    %action,
                    run_id = %report.run_id,
                    succeeded = report.succeeded(),
                    "Pipeline action finished"
                );
                Ok(report)
            }
            Err(err) => {
                let description = err.describe();
                error!(%action, kind = err.kind(), error = %description, "Pipeline action failed");
                if let Err(notify_err) = self.notifier.notify(&description).await {
                    warn!(error = %notify_err, "Could not deliver error notification");
                }
                Err(err)
            }
        }
    }

    /// Runs every stage, handing artifacts from one to the next in memory.
    pub async fn run_full(&self, enable_tuning: bool) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::new();
        info!(run_id = %report.run_id, "Full pipeline");

        let run = self.acquisition().run(()).await?;
        let path = self.check(run, &mut report, self.raise_on_failure)?;

        let run = self.validation().run(ArtifactSource::FromPath(path)).await?;
        let table = self.check(run, &mut report, self.raise_on_failure)?;

        let run = self.processing().run(table.into()).await?;
        let training = self.check(run, &mut report, self.raise_on_failure)?;

        let run = self
            .build()
            .run(BuildInput {
                training: training.into(),
                enable_tuning,
            })
            .await?;
        let model = self.check(run, &mut report, self.raise_on_failure)?;

        let run = self
            .inference()
            .run(InferenceInput {
                model: model.into(),
                persist: self.config.inference.persist_results,
            })
            .await?;
        self.check(run, &mut report, self.raise_on_failure)?;

        Ok(report)
    }

    /// Runs the one stage behind `action` from the previous stage's files.
    ///
    /// A failed status is recorded but not raised.
    pub async fn run_single(
        &self,
        action: Action,
        enable_tuning: bool,
    ) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::new();
        let paths = &self.config.paths;
        info!(run_id = %report.run_id, %action, "Single stage");

        match action {
            Action::DataFetch => {
                let run = self.acquisition().run(()).await?;
                self.check(run, &mut report, false)?;
            }
            Action::DataCheck => {
                let input = ArtifactSource::FromPath(paths.data_file.clone());
                let run = self.validation().run(input).await?;
                self.check(run, &mut report, false)?;
            }
            Action::DataProcess => {
                let input = ArtifactSource::FromPath(paths.data_file.clone());
                let run = self.processing().run(input).await?;
                self.check(run, &mut report, false)?;
            }
            Action::ModelBuild => {
                let input = BuildInput {
                    training: ArtifactSource::FromPath(paths.training_set()),
                    enable_tuning,
                };
                let run = self.build().run(input).await?;
                self.check(run, &mut report, false)?;
            }
            Action::Inference => {
                let input = InferenceInput {
                    model: ArtifactSource::FromPath(paths.model_file.clone()),
                    persist: self.config.inference.persist_results,
                };
                let run = self.inference().run(input).await?;
                self.check(run, &mut report, false)?;
            }
            Action::FullPipeline => return self.run_full(enable_tuning).await,
        }
        Ok(report)
    }

    fn check<T>(
        &self,
        run: StageRun<T>,
        report: &mut PipelineReport,
        raise: bool,
    ) -> Result<T, PipelineError> {
        let (result, artifact) = run.into_parts();
        self.recorder.record(&result);

        let failed = result.is_failure();
        if failed {
            warn!(stage = %result.stage, status = %result.status, "Stage failed");
        }
        if failed && raise {
            report.results.push(result.clone());
            return Err(PipelineError::StageFailed(Box::new(result)));
        }
        report.results.push(result);
        Ok(artifact)
    }

    fn acquisition(&self) -> DataAcquisition {
        DataAcquisition::new(Arc::clone(&self.config), Arc::clone(&self.source))
    }

    fn validation(&self) -> DataValidation {
        DataValidation::new(Arc::clone(&self.config))
    }

    fn processing(&self) -> DataProcessing {
        DataProcessing::new(Arc::clone(&self.config))
    }

    fn build(&self) -> ModelBuild {
        ModelBuild::new(Arc::clone(&self.config))
    }

    fn inference(&self) -> BatchInference {
        BatchInference::new(Arc::clone(&self.config), Arc::clone(&self.source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StageMetrics, StageStatus};
    use chrono::Utc;

    fn result(stage: StageName, status: StageStatus) -> StageResult {
        StageResult::new(stage, status, Utc::now(), StageMetrics::Empty)
    }

    #[test]
    fn test_report_succeeded() {
        let mut report = PipelineReport::new();
        assert!(!report.succeeded());

        report
            .results
            .push(result(StageName::Acquisition, StageStatus::Success));
        assert!(report.succeeded());

        report
            .results
            .push(result(StageName::Validation, StageStatus::failure("row_count")));
        assert!(!report.succeeded());
        assert!(report.result(StageName::Validation).unwrap().is_failure());
        assert!(report.result(StageName::Build).is_none());
    }

    #[test]
    fn test_report_ids_are_unique() {
        assert_ne!(PipelineReport::new().run_id, PipelineReport::new().run_id);
    }
}
