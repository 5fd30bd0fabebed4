//! Median imputation of missing values.

use crate::errors::PipelineError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Replaces NaN cells with the median of their column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Array1<f64>,
}

impl MedianImputer {
    /// Computes per-column medians, ignoring NaN.
    ///
    /// A column with no observed values gets a fill value of `0.0`.
    #[must_use]
    pub fn fit(matrix: &Array2<f64>) -> Self {
        let medians = matrix
            .columns()
            .into_iter()
            .enumerate()
            .map(|(col, values)| {
                let mut observed: Vec<f64> =
                    values.iter().copied().filter(|v| !v.is_nan()).collect();
                median(&mut observed).unwrap_or_else(|| {
                    warn!(column = col, "Column has no observed values, filling with 0");
                    0.0
                })
            })
            .collect();
        Self { medians }
    }

    /// Fits on `matrix` and fills it in place.
    pub fn fit_transform(matrix: &mut Array2<f64>) -> Result<Self, PipelineError> {
        let imputer = Self::fit(matrix);
        imputer.transform(matrix)?;
        Ok(imputer)
    }

    /// Fills NaN cells of `matrix` in place.
    pub fn transform(&self, matrix: &mut Array2<f64>) -> Result<(), PipelineError> {
        if matrix.ncols() != self.medians.len() {
            return Err(PipelineError::model(format!(
                "imputer was fitted on {} columns, got {}",
                self.medians.len(),
                matrix.ncols()
            )));
        }
        // medians broadcast across rows
        matrix.zip_mut_with(&self.medians, |value, &fill| {
            if value.is_nan() {
                *value = fill;
            }
        });
        Ok(())
    }

    /// Fitted fill values, one per column.
    #[must_use]
    pub fn medians(&self) -> &Array1<f64> {
        &self.medians
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
