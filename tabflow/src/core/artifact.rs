//! Artifact handoff between stages.
//!
//! A stage can receive its input either from a well-known path written by
//! the previous stage or directly from memory when both run in the same
//! process. [`ArtifactSource`] makes the two interchangeable.

use crate::errors::PipelineError;
use std::fmt::Debug;

/// A value a stage persists and a later stage may load back.
pub trait Artifact: Sized {
    /// Where the artifact lives on disk.
    type Location: Clone + Debug + Send + Sync;

    /// Loads the artifact from its location.
    fn load(location: &Self::Location) -> Result<Self, PipelineError>;
}

/// Input of a stage: a persisted location or an in-memory value.
#[derive(Debug, Clone)]
pub enum ArtifactSource<T: Artifact> {
    /// Read the artifact from disk.
    FromPath(T::Location),
    /// Use a value handed over directly.
    InMemory(T),
}

impl<T: Artifact> ArtifactSource<T> {
    /// Returns true if the value is already in memory.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    /// Produces the artifact, loading it from disk if needed.
    pub fn resolve(self) -> Result<T, PipelineError> {
        match self {
            Self::FromPath(location) => {
                tracing::debug!(?location, "Loading artifact from disk");
                T::load(&location)
            }
            Self::InMemory(value) => Ok(value),
        }
    }
}

impl<T: Artifact> From<T> for ArtifactSource<T> {
    fn from(value: T) -> Self {
        Self::InMemory(value)
    }
}
