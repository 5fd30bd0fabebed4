//! What a single invocation of the pipeline does.

use crate::core::StageName;
use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One stage run on its own, or the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Snapshot the source table.
    DataFetch,
    /// Validate the snapshot on disk.
    DataCheck,
    /// Process the snapshot on disk.
    DataProcess,
    /// Build a model from the feature files on disk.
    ModelBuild,
    /// Label a batch with the model on disk.
    Inference,
    /// Every stage in order, handing artifacts over in memory.
    FullPipeline,
}

impl Action {
    /// Every action.
    pub const ALL: [Self; 6] = [
        Self::DataFetch,
        Self::DataCheck,
        Self::DataProcess,
        Self::ModelBuild,
        Self::Inference,
        Self::FullPipeline,
    ];

    /// The command-line name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataFetch => "data-fetch",
            Self::DataCheck => "data-check",
            Self::DataProcess => "data-process",
            Self::ModelBuild => "model-build",
            Self::Inference => "inference",
            Self::FullPipeline => "full-pipeline",
        }
    }

    /// The stage this action runs, `None` for the full pipeline.
    #[must_use]
    pub fn stage(&self) -> Option<StageName> {
        match self {
            Self::DataFetch => Some(StageName::Acquisition),
            Self::DataCheck => Some(StageName::Validation),
            Self::DataProcess => Some(StageName::Processing),
            Self::ModelBuild => Some(StageName::Build),
            Self::Inference => Some(StageName::Inference),
            Self::FullPipeline => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(Self::as_str).collect();
                PipelineError::config(format!(
                    "Unknown action: {s} (expected one of {})",
                    known.join(", ")
                ))
            })
    }
}
