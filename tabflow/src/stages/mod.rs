//! The five pipeline stages.
//!
//! Each stage does its work, checks its own output and reports a
//! [`StageResult`]. A failed check is not an error: the result carries a
//! failed status and the caller decides whether to stop. Infrastructure
//! problems (missing files, unreadable data, source errors) are returned
//! as `Err`.

mod acquire;
mod build;
mod infer;
mod process;
mod validate;

pub use acquire::DataAcquisition;
pub use build::{BuildInput, ModelBuild};
pub use infer::{BatchInference, InferenceInput, Predictions};
pub use process::DataProcessing;
pub use validate::DataValidation;

use crate::core::{StageName, StageResult};
use crate::errors::PipelineError;
use async_trait::async_trait;

/// Result record plus the primary artifact of one stage run.
#[derive(Debug, Clone)]
pub struct StageRun<T> {
    /// What happened.
    pub result: StageResult,
    /// What was produced, for direct handoff to the next stage.
    pub artifact: T,
}

impl<T> StageRun<T> {
    /// Pairs a result with its artifact.
    #[must_use]
    pub fn new(result: StageResult, artifact: T) -> Self {
        Self { result, artifact }
    }

    /// Splits into result and artifact.
    #[must_use]
    pub fn into_parts(self) -> (StageResult, T) {
        (self.result, self.artifact)
    }
}

/// A unit of pipeline work with a typed input and output.
#[async_trait]
pub trait Stage: Send + Sync {
    /// What the stage consumes.
    type Input: Send + 'static;
    /// The artifact the stage hands on.
    type Output: Send + 'static;

    /// Which stage this is.
    fn name(&self) -> StageName;

    /// Runs the stage once.
    async fn run(&self, input: Self::Input) -> Result<StageRun<Self::Output>, PipelineError>;
}

pub(crate) fn join_error(stage: StageName, err: &tokio::task::JoinError) -> PipelineError {
    PipelineError::model(format!("{stage} worker failed: {err}"))
}
