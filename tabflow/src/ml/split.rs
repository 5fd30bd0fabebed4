//! Seeded train/test split.

use crate::errors::PipelineError;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// The four parts of a train/test split.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Training features.
    pub x_train: Array2<f64>,
    /// Held-out features.
    pub x_test: Array2<f64>,
    /// Training labels.
    pub y_train: Array1<f64>,
    /// Held-out labels.
    pub y_test: Array1<f64>,
}

/// Shuffles rows with `seed` and holds out `ceil(test_size * n)` of them.
pub fn train_test_split(
    features: &Array2<f64>,
    labels: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<Split, PipelineError> {
    let n = features.nrows();
    if n != labels.len() {
        return Err(PipelineError::model(format!(
            "{n} feature rows but {} labels",
            labels.len()
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::model(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::model(format!(
            "cannot hold out {n_test} of {n} rows"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test, train) = order.split_at(n_test);

    Ok(Split {
        x_train: features.select(Axis(0), train),
        x_test: features.select(Axis(0), test),
        y_train: labels.select(Axis(0), train),
        y_test: labels.select(Axis(0), test),
    })
}
