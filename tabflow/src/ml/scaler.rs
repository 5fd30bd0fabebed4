//! Feature standardization.

use crate::errors::PipelineError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Centers each column on zero and scales it to unit variance.
///
/// Constant columns are centered but left unscaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learns per-column mean and population standard deviation.
    pub fn fit(matrix: &Array2<f64>) -> Result<Self, PipelineError> {
        let mean = matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::model("cannot fit a scaler on zero rows"))?;
        let scale = matrix
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std < 10.0 * f64::EPSILON { 1.0 } else { std });
        Ok(Self { mean, scale })
    }

    /// Returns a standardized copy of `matrix`.
    pub fn transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        if matrix.ncols() != self.mean.len() {
            return Err(PipelineError::model(format!(
                "scaler was fitted on {} features, got {}",
                self.mean.len(),
                matrix.ncols()
            )));
        }
        Ok((matrix - &self.mean) / &self.scale)
    }

    /// Number of features the scaler was fitted on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let m = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&m).unwrap();
        let out = scaler.transform(&m).unwrap();

        assert!((out[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((out[[1, 0]] - 1.0).abs() < 1e-12);
        // constant column is only centered
        assert_eq!(out[[0, 1]], 0.0);
        assert_eq!(scaler.n_features(), 2);
    }

    #[test]
    fn test_uses_population_deviation() {
        let m = array![[2.0], [4.0], [4.0], [4.0], [5.0], [5.0], [7.0], [9.0]];
        let scaler = StandardScaler::fit(&m).unwrap();
        assert!((scaler.mean[0] - 5.0).abs() < 1e-12);
        assert!((scaler.scale[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_wrong_width_and_empty() {
        let scaler = StandardScaler::fit(&array![[1.0]]).unwrap();
        assert!(scaler.transform(&Array2::zeros((0, 3))).is_err());
        assert!(StandardScaler::fit(&Array2::zeros((0, 2))).is_err());
    }
}
