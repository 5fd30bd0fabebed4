//! Error types for the tabflow pipeline.
//!
//! Two kinds of failure exist. Data-quality failures are produced by a
//! stage's own checks and surface as [`PipelineError::StageFailed`] with the
//! offending [`StageResult`] attached. Everything else (missing files,
//! malformed data, source connectivity) is an infrastructure failure and is
//! returned as one of the remaining variants.

use crate::core::StageResult;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tabflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage reported a failed status and the orchestrator escalated it.
    #[error("Pipeline stopped: stage {} failed: {}", .0.stage, .0.status)]
    StageFailed(Box<StageResult>),

    /// A required file was not found.
    #[error("{message} - {}", path.display())]
    FileNotFound {
        /// Human readable description of the missing artifact.
        message: String,
        /// The path that was checked.
        path: PathBuf,
    },

    /// Input data could not be interpreted.
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// The relational source failed.
    #[error("Data source error: {0}")]
    Source(String),

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Model training or prediction failed.
    #[error("Model error: {0}")]
    Model(String),

    /// The error notifier failed.
    #[error("Notification error: {0}")]
    Notify(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Source(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::MalformedData(err.to_string())
    }
}

impl PipelineError {
    /// Creates a file-not-found error.
    #[must_use]
    pub fn file_not_found(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Creates a malformed data error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedData(message.into())
    }

    /// Creates a model error.
    #[must_use]
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error came from a stage's own checks.
    #[must_use]
    pub fn is_data_quality(&self) -> bool {
        matches!(self, Self::StageFailed(_))
    }

    /// Returns the failed stage result, if any.
    #[must_use]
    pub fn stage_result(&self) -> Option<&StageResult> {
        match self {
            Self::StageFailed(result) => Some(result),
            _ => None,
        }
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StageFailed(_) => "StageFailed",
            Self::FileNotFound { .. } => "FileNotFound",
            Self::MalformedData(_) => "MalformedData",
            Self::Source(_) => "Source",
            Self::Config(_) => "Config",
            Self::Model(_) => "Model",
            Self::Notify(_) => "Notify",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::StageFailed(result) => {
                if let Ok(value) = serde_json::to_value(result.as_ref()) {
                    map.insert("stage_result".to_string(), value);
                }
            }
            Self::FileNotFound { path, .. } => {
                map.insert("path".to_string(), serde_json::json!(path.display().to_string()));
            }
            _ => {}
        }

        map
    }

    /// Full human readable description, including the stage result when
    /// one is attached.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::StageFailed(result) => {
                let detail = serde_json::to_string_pretty(result.as_ref())
                    .unwrap_or_else(|_| format!("{result:?}"));
                format!("{self}\n{detail}")
            }
            _ => self.to_string(),
        }
    }
}
