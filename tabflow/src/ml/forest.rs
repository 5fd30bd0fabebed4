//! Random forest classifier.

use super::tree::{Criterion, DecisionTree, TreeParams};
use crate::data::has_nan;
use crate::errors::PipelineError;
use ndarray::{aview1, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Same as [`MaxFeatures::Sqrt`] for classification.
    #[default]
    Auto,
    /// `floor(sqrt(n_features))`, at least one.
    Sqrt,
}

impl MaxFeatures {
    /// Number of features to draw for `n_features` columns.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            Self::Auto | Self::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
        }
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Sqrt => f.write_str("sqrt"),
        }
    }
}

/// Hyperparameters of a random forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Split scoring.
    pub criterion: Criterion,
    /// Features drawn per split.
    pub max_features: MaxFeatures,
    /// Maximum tree depth; `None` is unlimited.
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split.
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Train each tree on a bootstrap resample.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 25,
            criterion: Criterion::Entropy,
            max_features: MaxFeatures::Auto,
            max_depth: Some(26),
            min_samples_split: 5,
            min_samples_leaf: 2,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    /// Checks that the parameters can grow a forest.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.n_estimators == 0 {
            return Err(PipelineError::model("n_estimators must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::model("min_samples_split must be at least 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::model("min_samples_leaf must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::model("max_depth must be at least 1"));
        }
        Ok(())
    }
}

/// An ensemble of decision trees voting by averaged class probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    classes: Vec<f64>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fits a forest. Every tree draws its own seed from `seed`.
    pub fn fit(
        features: &Array2<f64>,
        labels: &Array1<f64>,
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self, PipelineError> {
        params.validate()?;
        let n = features.nrows();
        if n == 0 {
            return Err(PipelineError::model("cannot fit a forest on zero rows"));
        }
        if n != labels.len() {
            return Err(PipelineError::model(format!(
                "{n} feature rows but {} labels",
                labels.len()
            )));
        }
        if has_nan(features) {
            return Err(PipelineError::model("features contain missing values"));
        }
        if labels.iter().any(|v| v.is_nan()) {
            return Err(PipelineError::model("labels contain missing values"));
        }

        let classes = unique_sorted(labels);
        let targets: Vec<usize> = labels.iter().map(|v| class_index(&classes, *v)).collect();
        let tree_params = TreeParams {
            criterion: params.criterion,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(features.ncols()),
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.gen());
                let samples = if params.bootstrap {
                    (0..n).map(|_| tree_rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(
                    features,
                    &targets,
                    classes.len(),
                    samples,
                    &tree_params,
                    &mut tree_rng,
                )
            })
            .collect();

        Ok(Self {
            params: *params,
            classes,
            n_features: features.ncols(),
            trees,
        })
    }

    /// Mean class probabilities, one row per input row.
    pub fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        if features.ncols() != self.n_features {
            return Err(PipelineError::model(format!(
                "model expects {} features, got {}",
                self.n_features,
                features.ncols()
            )));
        }
        let mut proba = Array2::zeros((features.nrows(), self.classes.len()));
        for (row, mut out) in features.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.trees {
                out += &aview1(tree.predict_proba_row(row));
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    /// Most probable class label per row. Ties go to the smaller label.
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (i, p) in row.iter().enumerate() {
                    if *p > row[best] {
                        best = i;
                    }
                }
                self.classes[best]
            })
            .collect())
    }

    /// Distinct training labels in ascending order.
    #[must_use]
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// Hyperparameters the forest was grown with.
    #[must_use]
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of features seen during fit.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// The fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

pub(crate) fn unique_sorted<'a>(labels: impl IntoIterator<Item = &'a f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = labels.into_iter().copied().collect();
    classes.sort_by(f64::total_cmp);
    classes.dedup_by(|a, b| a.total_cmp(b).is_eq());
    classes
}

pub(crate) fn class_index(classes: &[f64], label: f64) -> usize {
    classes
        .binary_search_by(|c| c.total_cmp(&label))
        .unwrap_or_else(|insert_at| insert_at.min(classes.len().saturating_sub(1)))
}
