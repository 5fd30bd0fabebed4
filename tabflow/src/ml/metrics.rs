//! Classification metrics.

use super::forest::{class_index, unique_sorted};
use crate::errors::PipelineError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Counts of (true label, predicted label) pairs.
///
/// Rows are true labels and columns predicted labels, both indexed by the
/// sorted union of labels seen in either input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<f64>,
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Tallies predictions against the true labels.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self, PipelineError> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::model(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let labels = unique_sorted(y_true.iter().chain(y_pred).filter(|v| !v.is_nan()));
        let mut counts = Array2::zeros((labels.len(), labels.len()));
        for (t, p) in y_true.iter().zip(y_pred) {
            counts[[class_index(&labels, *t), class_index(&labels, *p)]] += 1;
        }
        Ok(Self { labels, counts })
    }

    /// Labels indexing rows and columns.
    #[must_use]
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Raw counts, `counts()[[true, predicted]]`.
    #[must_use]
    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    /// Number of pairs tallied.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Number of correct predictions.
    #[must_use]
    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Fraction of correct predictions; `0.0` when empty.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }
}

/// Fraction of positions where `y_pred` equals `y_true`.
#[must_use]
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t.total_cmp(p).is_eq())
        .count();
    correct as f64 / y_true.len() as f64
}
