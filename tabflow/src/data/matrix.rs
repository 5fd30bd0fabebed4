//! Numeric text files and the training set handed between stages.
//!
//! Feature matrices are `ndarray::Array2<f64>` (one row per sample) and label
//! vectors are `ndarray::Array1<f64>`. On disk both are whitespace-delimited
//! text with every value printed in `{:.18e}`, so a reload is bit-exact.

use crate::core::Artifact;
use crate::errors::PipelineError;
use crate::utils::file_exists_check;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Builds a matrix from a list of equally sized rows.
pub fn matrix_from_rows(rows: Vec<Vec<f64>>) -> Result<Array2<f64>, PipelineError> {
    let cols = rows.first().map_or(0, Vec::len);
    let n_rows = rows.len();
    let mut data = Vec::with_capacity(n_rows * cols);
    for (index, row) in rows.into_iter().enumerate() {
        if row.len() != cols {
            return Err(PipelineError::malformed(format!(
                "row {} has {} values, expected {cols}",
                index + 1,
                row.len()
            )));
        }
        data.extend(row);
    }
    Ok(Array2::from_shape_vec((n_rows, cols), data)?)
}

/// Returns true if any value is NaN.
#[must_use]
pub fn has_nan(matrix: &Array2<f64>) -> bool {
    matrix.iter().any(|v| v.is_nan())
}

/// Writes a matrix as whitespace-delimited text, one row per line.
pub fn save_matrix_txt(matrix: &Array2<f64>, path: &Path) -> Result<(), PipelineError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in matrix.rows() {
        write_line(&mut writer, row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a matrix written by [`save_matrix_txt`].
pub fn load_matrix_txt(path: &Path) -> Result<Array2<f64>, PipelineError> {
    let contents = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_line(line, index, path)?);
    }
    matrix_from_rows(rows)
}

/// Writes a vector as text, one value per line.
pub fn save_vector_txt(values: &Array1<f64>, path: &Path) -> Result<(), PipelineError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in values {
        writeln!(writer, "{value:.18e}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a vector written by [`save_vector_txt`].
pub fn load_vector_txt(path: &Path) -> Result<Array1<f64>, PipelineError> {
    let contents = std::fs::read_to_string(path)?;
    let mut values = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_line(line, index, path)?;
        if parsed.len() != 1 {
            return Err(PipelineError::malformed(format!(
                "{} line {}: expected one value, found {}",
                path.display(),
                index + 1,
                parsed.len()
            )));
        }
        values.push(parsed[0]);
    }
    Ok(Array1::from(values))
}

fn write_line<W: Write>(writer: &mut W, row: ArrayView1<'_, f64>) -> std::io::Result<()> {
    let mut first = true;
    for value in row {
        if !first {
            writer.write_all(b" ")?;
        }
        first = false;
        write!(writer, "{value:.18e}")?;
    }
    writer.write_all(b"\n")
}

fn parse_line(line: &str, index: usize, path: &Path) -> Result<Vec<f64>, PipelineError> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                PipelineError::malformed(format!(
                    "{} line {}: '{token}' is not a number",
                    path.display(),
                    index + 1
                ))
            })
        })
        .collect()
}

/// Where the processing stage writes the feature matrix and label vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSetPaths {
    /// Feature matrix file.
    pub features: PathBuf,
    /// Label vector file.
    pub labels: PathBuf,
}

/// Feature matrix with one label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    features: Array2<f64>,
    labels: Array1<f64>,
}

impl TrainingSet {
    /// Pairs a feature matrix with its labels.
    pub fn new(features: Array2<f64>, labels: Array1<f64>) -> Result<Self, PipelineError> {
        if features.nrows() != labels.len() {
            return Err(PipelineError::malformed(format!(
                "feature matrix has {} rows but label vector has {} values",
                features.nrows(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    /// The feature matrix.
    #[must_use]
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// The label vector.
    #[must_use]
    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    /// Splits back into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Array2<f64>, Array1<f64>) {
        (self.features, self.labels)
    }

    /// Rows per label value.
    #[must_use]
    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        label_counts(&self.labels)
    }

    /// Writes both parts as plain numeric text.
    pub fn save(&self, paths: &TrainingSetPaths) -> Result<(), PipelineError> {
        save_matrix_txt(&self.features, &paths.features)?;
        save_vector_txt(&self.labels, &paths.labels)
    }
}

impl Artifact for TrainingSet {
    type Location = TrainingSetPaths;

    fn load(location: &TrainingSetPaths) -> Result<Self, PipelineError> {
        file_exists_check(&location.features, "Training Data File Not Found")?;
        file_exists_check(&location.labels, "Label Data File Not Found")?;
        Self::new(
            load_matrix_txt(&location.features)?,
            load_vector_txt(&location.labels)?,
        )
    }
}

/// Counts occurrences of each label value.
#[must_use]
pub fn label_counts<'a>(labels: impl IntoIterator<Item = &'a f64>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(format!("{label}")).or_insert(0) += 1;
    }
    counts
}
