//! Synthetic datasets for exercising the pipeline.
//!
//! Every generator is seeded, so the same `TableSpec` always produces the same
//! table. Minority-class rows are shifted away from the majority so a
//! forest can actually learn the split.

use crate::data::{Cell, Table, TrainingSet};
use crate::errors::PipelineError;
use crate::ml::{ForestParams, RandomForest, StandardScaler, TrainedModel};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Name of the label column in generated tables.
pub const LABEL_COLUMN: &str = "target";

const CLASS_SHIFT: f64 = 2.0;

/// Shape and content of a synthetic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableSpec {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns, including the label column when labeled.
    pub columns: usize,
    /// Rows with label 1. The rest get label 0.
    pub minority: usize,
    /// Probability that a feature cell is left empty.
    pub missing_rate: f64,
    /// Generator seed.
    pub seed: u64,
    /// Whether to append the label column.
    pub labeled: bool,
}

impl TableSpec {
    /// A labeled table with a 10% minority class and no missing values.
    #[must_use]
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            minority: rows / 10,
            missing_rate: 0.0,
            seed: 7,
            labeled: true,
        }
    }

    /// Sets the number of minority rows.
    #[must_use]
    pub fn with_minority(mut self, minority: usize) -> Self {
        self.minority = minority;
        self
    }

    /// Sets the missing-value rate of feature cells.
    #[must_use]
    pub fn with_missing_rate(mut self, rate: f64) -> Self {
        self.missing_rate = rate;
        self
    }

    /// Sets the generator seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Drops the label column. `columns` then counts features only.
    #[must_use]
    pub fn unlabeled(mut self) -> Self {
        self.labeled = false;
        self
    }

    fn feature_count(&self) -> usize {
        if self.labeled {
            self.columns.saturating_sub(1)
        } else {
            self.columns
        }
    }
}

/// Feature column names `f0`, `f1`, ...
#[must_use]
pub fn feature_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("f{i}")).collect()
}

/// Generates a table described by `spec`.
pub fn synthetic_table(spec: &TableSpec) -> Result<Table, PipelineError> {
    if spec.minority > spec.rows {
        return Err(PipelineError::config(format!(
            "minority {} exceeds {} rows",
            spec.minority, spec.rows
        )));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let mut labels: Vec<f64> = (0..spec.rows)
        .map(|i| if i < spec.minority { 1.0 } else { 0.0 })
        .collect();
    labels.shuffle(&mut rng);

    let n_features = spec.feature_count();
    let mut columns = feature_names(n_features);
    if spec.labeled {
        columns.push(LABEL_COLUMN.to_string());
    }

    let mut table = Table::new(columns);
    for label in labels {
        let mut row: Vec<Cell> = (0..n_features)
            .map(|_| {
                if spec.missing_rate > 0.0 && rng.gen_bool(spec.missing_rate) {
                    Cell::Missing
                } else {
                    Cell::Number(rng.gen_range(-1.0..1.0) + label * CLASS_SHIFT)
                }
            })
            .collect();
        if spec.labeled {
            row.push(Cell::Number(label));
        }
        table.push_row(row)?;
    }
    Ok(table)
}

/// Unlabeled rows with `features` columns, half of them drawn from the
/// minority distribution.
pub fn unlabeled_batch(rows: usize, features: usize, seed: u64) -> Result<Table, PipelineError> {
    synthetic_table(
        &TableSpec::new(rows, features)
            .with_minority(rows / 2)
            .with_seed(seed)
            .unlabeled(),
    )
}

/// Two well separated classes in alternating rows.
pub fn separable_training_set(rows: usize, features: usize) -> Result<TrainingSet, PipelineError> {
    let mut rng = StdRng::seed_from_u64(11);
    let labels = Array1::from_shape_fn(rows, |i| (i % 2) as f64);
    let x = Array2::from_shape_fn((rows, features), |(i, _)| {
        rng.gen_range(-1.0..1.0) + labels[i] * 3.0
    });
    TrainingSet::new(x, labels)
}

/// A small fitted model over `features` columns.
pub fn trained_model(features: usize) -> Result<TrainedModel, PipelineError> {
    let (x, y) = separable_training_set(60, features)?.into_parts();
    let scaler = StandardScaler::fit(&x)?;
    let params = ForestParams {
        n_estimators: 5,
        ..ForestParams::default()
    };
    let forest = RandomForest::fit(&scaler.transform(&x)?, &y, &params, 4)?;
    TrainedModel::new(scaler, forest, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_table_shape_and_balance() {
        let table = synthetic_table(&TableSpec::new(100, 6).with_minority(15)).unwrap();

        assert_eq!(table.shape(), [100, 6]);
        assert_eq!(table.columns().last().map(String::as_str), Some(LABEL_COLUMN));
        let counts = table.value_counts(LABEL_COLUMN).unwrap();
        assert_eq!(counts.get("1"), Some(&15));
        assert_eq!(counts.get("0"), Some(&85));
    }

    #[test]
    fn test_same_seed_same_table() {
        let spec = TableSpec::new(30, 4).with_missing_rate(0.2).with_seed(3);
        assert_eq!(synthetic_table(&spec).unwrap(), synthetic_table(&spec).unwrap());
        assert_ne!(
            synthetic_table(&spec).unwrap(),
            synthetic_table(&spec.with_seed(4)).unwrap()
        );
    }

    #[test]
    fn test_missing_values_only_in_features() {
        let table =
            synthetic_table(&TableSpec::new(200, 5).with_missing_rate(0.3)).unwrap();

        let label = table.column_index(LABEL_COLUMN).unwrap();
        assert!(table.rows().iter().all(|row| !row[label].is_missing()));
        assert!(table.rows().iter().any(|row| row[..label].iter().any(Cell::is_missing)));
    }

    #[test]
    fn test_unlabeled_batch() {
        let batch = unlabeled_batch(50, 151, 1).unwrap();
        assert_eq!(batch.shape(), [50, 151]);
        assert!(batch.column_index(LABEL_COLUMN).is_none());
    }

    #[test]
    fn test_separable_training_set() {
        let set = separable_training_set(9, 3).unwrap();
        assert_eq!(set.features().dim(), (9, 3));
        assert_eq!(set.class_counts().get("0"), Some(&5));
        assert_eq!(set.class_counts().get("1"), Some(&4));
    }

    #[test]
    fn test_minority_larger_than_rows() {
        assert!(synthetic_table(&TableSpec::new(5, 3).with_minority(6)).is_err());
    }
}
