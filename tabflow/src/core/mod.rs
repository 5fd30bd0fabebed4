//! Core domain model types for tabflow.
//!
//! This module contains the fundamental types shared by every stage:
//! - Stage names and status
//! - Typed stage results and metrics
//! - Artifact handoff between stages

mod artifact;
mod result;
mod status;

pub use artifact::{Artifact, ArtifactSource};
pub use result::{Check, StageMetrics, StageResult};
pub use status::{StageName, StageStatus};
