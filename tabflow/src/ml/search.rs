//! Randomized hyperparameter search with stratified cross-validation.

use super::forest::{class_index, unique_sorted, ForestParams, MaxFeatures, RandomForest};
use super::metrics::accuracy_score;
use super::tree::Criterion;
use crate::errors::PipelineError;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Candidate values for every forest hyperparameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGrid {
    /// Tree counts.
    pub n_estimators: Vec<usize>,
    /// Feature sampling rules.
    pub max_features: Vec<MaxFeatures>,
    /// Depth limits; `None` is unlimited.
    pub max_depth: Vec<Option<usize>>,
    /// Minimum samples to split.
    pub min_samples_split: Vec<usize>,
    /// Minimum samples per leaf.
    pub min_samples_leaf: Vec<usize>,
    /// Bootstrap on or off.
    pub bootstrap: Vec<bool>,
    /// Split scoring, shared by every candidate.
    pub criterion: Criterion,
}

impl Default for ParamGrid {
    fn default() -> Self {
        let mut max_depth: Vec<Option<usize>> = (10..=30).step_by(2).map(Some).collect();
        max_depth.push(None);
        Self {
            n_estimators: vec![10, 15, 20, 25],
            max_features: vec![MaxFeatures::Auto, MaxFeatures::Sqrt],
            max_depth,
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
            bootstrap: vec![true, false],
            criterion: Criterion::Entropy,
        }
    }
}

impl ParamGrid {
    /// Number of combinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_features.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
            * self.bootstrap.len()
    }

    /// Returns true if any axis has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The combination at `index`; the last axis varies fastest.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ForestParams> {
        if index >= self.len() {
            return None;
        }
        let mut rest = index;
        let mut take = |len: usize| {
            let i = rest % len;
            rest /= len;
            i
        };
        let bootstrap = self.bootstrap[take(self.bootstrap.len())];
        let min_samples_leaf = self.min_samples_leaf[take(self.min_samples_leaf.len())];
        let min_samples_split = self.min_samples_split[take(self.min_samples_split.len())];
        let max_depth = self.max_depth[take(self.max_depth.len())];
        let max_features = self.max_features[take(self.max_features.len())];
        let n_estimators = self.n_estimators[take(self.n_estimators.len())];
        Some(ForestParams {
            n_estimators,
            criterion: self.criterion,
            max_features,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            bootstrap,
        })
    }
}

/// Cross-validated score of one sampled combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// The combination.
    pub params: ForestParams,
    /// Accuracy on each validation fold.
    pub fold_scores: Vec<f64>,
    /// Mean of `fold_scores`.
    pub mean_score: f64,
}

/// Outcome of a randomized search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    /// The winning combination, refitted on all training rows.
    pub best_params: ForestParams,
    /// Its mean cross-validation accuracy.
    pub best_score: f64,
    /// Every sampled combination in evaluation order.
    pub candidates: Vec<CandidateScore>,
}

/// Samples `n_iter` distinct grid points and keeps the best by mean
/// cross-validated accuracy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomizedSearch {
    grid: ParamGrid,
    n_iter: usize,
    cv: usize,
    random_state: u64,
    forest_seed: Option<u64>,
}

impl Default for RandomizedSearch {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            n_iter: 3,
            cv: 3,
            random_state: 42,
            forest_seed: None,
        }
    }
}

impl RandomizedSearch {
    /// Creates a search over `grid`.
    #[must_use]
    pub fn new(grid: ParamGrid) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    /// Sets how many combinations are sampled.
    #[must_use]
    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Sets the number of cross-validation folds.
    #[must_use]
    pub fn with_cv(mut self, cv: usize) -> Self {
        self.cv = cv;
        self
    }

    /// Sets the seed used to sample combinations.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Fixes the forest seed. Unset, every fit draws a fresh seed.
    #[must_use]
    pub fn with_forest_seed(mut self, seed: Option<u64>) -> Self {
        self.forest_seed = seed;
        self
    }

    /// Runs the search and refits the best combination on all rows.
    pub fn fit(
        &self,
        features: &Array2<f64>,
        labels: &Array1<f64>,
    ) -> Result<(RandomForest, SearchReport), PipelineError> {
        if self.grid.is_empty() {
            return Err(PipelineError::model("parameter grid is empty"));
        }
        if self.n_iter == 0 {
            return Err(PipelineError::model("n_iter must be at least 1"));
        }
        let folds = stratified_folds(labels, self.cv)?;

        let n_iter = self.n_iter.min(self.grid.len());
        let mut sampler = StdRng::seed_from_u64(self.random_state);
        let picks = rand::seq::index::sample(&mut sampler, self.grid.len(), n_iter);
        info!(
            grid_size = self.grid.len(),
            n_iter,
            cv = self.cv,
            "Starting randomized search"
        );

        let mut candidates = Vec::with_capacity(n_iter);
        for index in picks.iter() {
            let Some(params) = self.grid.get(index) else {
                continue;
            };
            let mut fold_scores = Vec::with_capacity(folds.len());
            for test in &folds {
                let train = complement(labels.len(), test);
                let forest = RandomForest::fit(
                    &features.select(Axis(0), &train),
                    &labels.select(Axis(0), &train),
                    &params,
                    self.next_forest_seed(),
                )?;
                let predicted = forest.predict(&features.select(Axis(0), test))?;
                fold_scores.push(accuracy_score(&labels.select(Axis(0), test), &predicted));
            }
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!(?params, mean_score, "Evaluated candidate");
            candidates.push(CandidateScore {
                params,
                fold_scores,
                mean_score,
            });
        }

        let best = candidates
            .iter()
            .fold(None::<&CandidateScore>, |best, c| match best {
                Some(b) if b.mean_score >= c.mean_score => Some(b),
                _ => Some(c),
            })
            .ok_or_else(|| PipelineError::model("randomized search evaluated no candidates"))?;
        let best_params = best.params;
        let best_score = best.mean_score;
        info!(?best_params, best_score, "Randomized search finished");

        let forest = RandomForest::fit(features, labels, &best_params, self.next_forest_seed())?;
        Ok((
            forest,
            SearchReport {
                best_params,
                best_score,
                candidates,
            },
        ))
    }

    fn next_forest_seed(&self) -> u64 {
        self.forest_seed
            .unwrap_or_else(|| rand::thread_rng().gen())
    }
}

/// Splits row indices into `k` validation folds, preserving class ratios.
///
/// Rows are not shuffled. Each class is cut into contiguous blocks whose
/// sizes follow a round-robin over the class-sorted rows.
pub fn stratified_folds(labels: &Array1<f64>, k: usize) -> Result<Vec<Vec<usize>>, PipelineError> {
    if k < 2 {
        return Err(PipelineError::model(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if labels.len() < k {
        return Err(PipelineError::model(format!(
            "cannot make {k} folds from {} rows",
            labels.len()
        )));
    }

    let classes = unique_sorted(labels);
    let encoded: Vec<usize> = labels.iter().map(|v| class_index(&classes, *v)).collect();
    let mut class_counts = vec![0_usize; classes.len()];
    for &c in &encoded {
        class_counts[c] += 1;
    }
    if class_counts.iter().all(|&count| count < k) {
        return Err(PipelineError::model(format!(
            "{k} folds need at least one class with {k} members"
        )));
    }
    if class_counts.iter().any(|&count| count < k) {
        warn!(folds = k, "The least populated class has fewer members than folds");
    }

    // allocation[fold][class]
    let mut sorted = encoded.clone();
    sorted.sort_unstable();
    let mut allocation = vec![vec![0_usize; classes.len()]; k];
    for (position, class) in sorted.iter().enumerate() {
        allocation[position % k][*class] += 1;
    }

    let mut folds = vec![Vec::new(); k];
    for class in 0..classes.len() {
        let mut fold = 0;
        let mut filled = 0;
        for (row, &c) in encoded.iter().enumerate() {
            if c != class {
                continue;
            }
            while filled == allocation[fold][class] {
                fold += 1;
                filled = 0;
            }
            folds[fold].push(row);
            filled += 1;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

fn complement(n: usize, held_out: &[usize]) -> Vec<usize> {
    let mut keep = vec![true; n];
    for &i in held_out {
        keep[i] = false;
    }
    (0..n).filter(|&i| keep[i]).collect()
}
