//! Stage names and status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five stages of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Pulls a table snapshot from the relational source.
    #[serde(rename = "data_fetch")]
    Acquisition,
    /// Checks the shape and size of the snapshot.
    #[serde(rename = "data_check")]
    Validation,
    /// Shuffles, imputes and rebalances.
    #[serde(rename = "data_process")]
    Processing,
    /// Trains and evaluates the classifier.
    #[serde(rename = "model_build")]
    Build,
    /// Predicts a fresh batch and writes it back.
    #[serde(rename = "inference")]
    Inference,
}

impl StageName {
    /// All stages in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::Acquisition,
        Self::Validation,
        Self::Processing,
        Self::Build,
        Self::Inference,
    ];

    /// Returns the stable identifier used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquisition => "data_fetch",
            Self::Validation => "data_check",
            Self::Processing => "data_process",
            Self::Build => "model_build",
            Self::Inference => "inference",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageStatus {
    /// Every check the stage performs on its own output passed.
    Success,
    /// The stage completed but its output did not meet its contract.
    Failure {
        /// Why the stage considers its output unusable.
        reason: String,
    },
}

impl StageStatus {
    /// Creates a failure status.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    /// Builds a status from a boolean check, using `reason` when it failed.
    #[must_use]
    pub fn from_check(passed: bool, reason: impl FnOnce() -> String) -> Self {
        if passed {
            Self::Success
        } else {
            Self::Failure { reason: reason() }
        }
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { reason } => Some(reason),
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure { reason } => write!(f, "failure ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        assert_eq!(StageName::Acquisition.to_string(), "data_fetch");
        assert_eq!(StageName::Validation.to_string(), "data_check");
        assert_eq!(StageName::Processing.to_string(), "data_process");
        assert_eq!(StageName::Build.to_string(), "model_build");
        assert_eq!(StageName::Inference.to_string(), "inference");
    }

    #[test]
    fn test_stage_name_order() {
        let mut shuffled = vec![StageName::Inference, StageName::Acquisition, StageName::Build];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![StageName::Acquisition, StageName::Build, StageName::Inference]
        );
    }

    #[test]
    fn test_status_from_check() {
        assert!(StageStatus::from_check(true, || "unused".to_string()).is_success());

        let failed = StageStatus::from_check(false, || "too few rows".to_string());
        assert!(failed.is_failure());
        assert_eq!(failed.reason(), Some("too few rows"));
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Success).unwrap();
        assert_eq!(json, r#"{"state":"success"}"#);

        let json = serde_json::to_string(&StageStatus::failure("x")).unwrap();
        assert_eq!(json, r#"{"state":"failure","reason":"x"}"#);
    }

    #[test]
    fn test_stage_name_serialize() {
        let json = serde_json::to_string(&StageName::Build).unwrap();
        assert_eq!(json, r#""model_build""#);
    }
}
