//! Synthetic minority oversampling.
//!
//! Every class smaller than the majority is topped up with synthetic rows.
//! Each synthetic row lies on the segment between a randomly chosen member
//! of the class and one of its `k` nearest same-class neighbours. Original
//! rows keep their order and synthetic rows are appended after them.

use super::forest::{class_index, unique_sorted};
use crate::data::has_nan;
use crate::errors::PipelineError;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// SMOTE oversampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smote {
    k_neighbors: usize,
    seed: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 31,
        }
    }
}

impl Smote {
    /// Creates an oversampler.
    #[must_use]
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self { k_neighbors, seed }
    }

    /// Returns features and labels with every class at the majority count.
    pub fn fit_resample(
        &self,
        features: &Array2<f64>,
        labels: &Array1<f64>,
    ) -> Result<(Array2<f64>, Array1<f64>), PipelineError> {
        if features.nrows() != labels.len() {
            return Err(PipelineError::model(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if has_nan(features) {
            return Err(PipelineError::model(
                "cannot oversample features with missing values",
            ));
        }
        if self.k_neighbors == 0 {
            return Err(PipelineError::model("k_neighbors must be at least 1"));
        }

        let classes = unique_sorted(labels);
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); classes.len()];
        for (i, label) in labels.iter().enumerate() {
            members[class_index(&classes, *label)].push(i);
        }
        let majority = members.iter().map(Vec::len).max().unwrap_or(0);

        let mut out_features = features.clone();
        let mut out_labels = labels.to_vec();
        let mut rng = StdRng::seed_from_u64(self.seed);

        for (class, rows) in classes.iter().zip(&members) {
            let needed = majority - rows.len();
            if needed == 0 {
                continue;
            }
            debug!(class = %class, existing = rows.len(), needed, "Oversampling class");

            let neighbors = nearest_neighbors(features, rows, self.k_neighbors);
            for _ in 0..needed {
                let pick = rng.gen_range(0..rows.len());
                let base = features.row(rows[pick]);
                let candidates = &neighbors[pick];
                if candidates.is_empty() {
                    // Single-member class: nothing to interpolate towards.
                    out_features.push_row(base)?;
                } else {
                    let other = features.row(candidates[rng.gen_range(0..candidates.len())]);
                    let gap: f64 = rng.gen();
                    let synthetic = &base + &((&other - &base) * gap);
                    out_features.push_row(synthetic.view())?;
                }
                out_labels.push(*class);
            }
        }

        Ok((out_features, Array1::from(out_labels)))
    }
}

/// For each row in `rows`, the `k` closest other rows of the same set.
fn nearest_neighbors(features: &Array2<f64>, rows: &[usize], k: usize) -> Vec<Vec<usize>> {
    let k = k.min(rows.len().saturating_sub(1));
    rows.iter()
        .map(|&i| {
            let mut distances: Vec<(f64, usize)> = rows
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (squared_distance(features.row(i), features.row(j)), j))
                .collect();
            distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{label_counts, matrix_from_rows};
    use ndarray::{array, s, Axis};
    use pretty_assertions::assert_eq;

    fn imbalanced() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            rows.push(vec![f64::from(i), 0.0]);
            labels.push(0.0);
        }
        for i in 0..4 {
            rows.push(vec![100.0 + f64::from(i), 10.0]);
            labels.push(1.0);
        }
        (matrix_from_rows(rows).unwrap(), Array1::from(labels))
    }

    #[test]
    fn test_balances_classes() {
        let (x, y) = imbalanced();
        let (rx, ry) = Smote::default().fit_resample(&x, &y).unwrap();

        assert_eq!(rx.nrows(), 40);
        assert_eq!(ry.len(), 40);
        let counts = label_counts(&ry);
        assert_eq!(counts.get("0"), Some(&20));
        assert_eq!(counts.get("1"), Some(&20));
    }

    #[test]
    fn test_originals_kept_and_synthetic_interpolated() {
        let (x, y) = imbalanced();
        let (rx, ry) = Smote::default().fit_resample(&x, &y).unwrap();

        assert_eq!(rx.slice(s![..24, ..]), x);
        assert_eq!(ry.slice(s![..24]), y);
        for row in rx.slice(s![24.., ..]).axis_iter(Axis(0)) {
            assert!((100.0..=103.0).contains(&row[0]));
            assert_eq!(row[1], 10.0);
        }
    }

    #[test]
    fn test_seeded() {
        let (x, y) = imbalanced();
        let a = Smote::new(5, 31).fit_resample(&x, &y).unwrap();
        let b = Smote::new(5, 31).fit_resample(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_member_class_is_duplicated() {
        let x = array![[0.0], [1.0], [2.0], [9.0]];
        let y = array![0.0, 0.0, 0.0, 1.0];
        let (rx, ry) = Smote::default().fit_resample(&x, &y).unwrap();

        assert_eq!(ry, array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(rx[[4, 0]], 9.0);
        assert_eq!(rx[[5, 0]], 9.0);
    }

    #[test]
    fn test_rejects_missing_values() {
        let x = array![[f64::NAN], [1.0]];
        assert!(Smote::default().fit_resample(&x, &array![0.0, 1.0]).is_err());
    }
}
