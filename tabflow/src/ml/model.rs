//! The persisted classifier artifact.

use super::forest::{ForestParams, RandomForest};
use super::scaler::StandardScaler;
use crate::core::Artifact;
use crate::errors::PipelineError;
use crate::utils::file_exists_check;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A fitted scaler and forest, ready to label raw feature rows.
///
/// Immutable once built; [`TrainedModel::predict`] applies the same
/// standardization the forest was trained under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    scaler: StandardScaler,
    forest: RandomForest,
    tuned: bool,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Wraps a fitted scaler and forest.
    pub fn new(
        scaler: StandardScaler,
        forest: RandomForest,
        tuned: bool,
    ) -> Result<Self, PipelineError> {
        if scaler.n_features() != forest.n_features() {
            return Err(PipelineError::model(format!(
                "scaler has {} features but forest has {}",
                scaler.n_features(),
                forest.n_features()
            )));
        }
        Ok(Self {
            scaler,
            forest,
            tuned,
            trained_at: Utc::now(),
        })
    }

    /// Predicts one label per row of unscaled features.
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        let scaled = self.scaler.transform(features)?;
        self.forest.predict(&scaled)
    }

    /// Labels the model can produce.
    #[must_use]
    pub fn classes(&self) -> &[f64] {
        self.forest.classes()
    }

    /// Hyperparameters of the forest.
    #[must_use]
    pub fn params(&self) -> &ForestParams {
        self.forest.params()
    }

    /// Number of input features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    /// Whether the parameters came from a search.
    #[must_use]
    pub fn tuned(&self) -> bool {
        self.tuned
    }

    /// When the model was built.
    #[must_use]
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Writes the model as JSON, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

impl Artifact for TrainedModel {
    type Location = PathBuf;

    fn load(location: &PathBuf) -> Result<Self, PipelineError> {
        file_exists_check(location, "Model File not Found")?;
        let reader = BufReader::new(File::open(location)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
