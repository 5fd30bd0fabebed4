//! In-memory tabular dataset.

use super::csv;
use crate::core::Artifact;
use crate::errors::PipelineError;
use crate::utils::file_exists_check;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

const MISSING_MARKERS: [&str; 9] = ["", "NA", "N/A", "NaN", "nan", "-nan", "NULL", "null", "None"];

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// A numeric value.
    Number(f64),
    /// A value that could not be read as a number.
    Text(String),
    /// A missing value.
    Missing,
}

impl Cell {
    /// Reads a raw text field: numbers become [`Cell::Number`], empty
    /// fields and missing markers become [`Cell::Missing`].
    #[must_use]
    pub fn parse(field: &str) -> Self {
        let trimmed = field.trim();
        if MISSING_MARKERS.contains(&trimmed) {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => Self::from(v),
            Err(_) => Self::Text(field.to_string()),
        }
    }

    /// Numeric view of the cell: missing becomes NaN, text is `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Missing => Some(f64::NAN),
            Self::Text(_) => None,
        }
    }

    /// Returns true if the cell holds no value.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Number(v) => v.is_nan(),
            Self::Text(_) => false,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Self::Missing
        } else {
            Self::Number(value)
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Missing => Ok(()),
        }
    }
}

/// Row-oriented table with named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a table, checking every row has one cell per column.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, PipelineError> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Appends a row.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), PipelineError> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::malformed(format!(
                "row {} has {} cells, expected {}",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of data rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `[rows, columns]`.
    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        [self.n_rows(), self.n_cols()]
    }

    /// Position of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Removes a column if present. Returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        true
    }

    /// Moves a column to the last position. Returns whether it existed.
    pub fn move_column_to_end(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        let column = self.columns.remove(index);
        self.columns.push(column);
        for row in &mut self.rows {
            let cell = row.remove(index);
            row.push(cell);
        }
        true
    }

    /// Appends a numeric column, replacing any column with the same name.
    pub fn set_column(&mut self, name: &str, values: &Array1<f64>) -> Result<(), PipelineError> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::malformed(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.drop_column(name);
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(Cell::from(*value));
        }
        Ok(())
    }

    /// Counts rows per distinct value of `column`.
    pub fn value_counts(&self, column: &str) -> Result<BTreeMap<String, usize>, PipelineError> {
        let index = self
            .column_index(column)
            .ok_or_else(|| PipelineError::malformed(format!("missing column '{column}'")))?;

        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row[index].to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Shuffles the rows in place.
    pub fn shuffle_rows<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.rows.shuffle(rng);
    }

    /// Converts every column to a numeric matrix. Missing cells become NaN.
    pub fn to_matrix(&self) -> Result<Array2<f64>, PipelineError> {
        self.numeric_block(0, self.n_cols())
    }

    /// Splits into a feature matrix (all but the last column) and a label
    /// vector (the last column).
    pub fn split_last_column(&self) -> Result<(Array2<f64>, Array1<f64>), PipelineError> {
        let n_cols = self.n_cols();
        if n_cols < 2 {
            return Err(PipelineError::malformed(format!(
                "need at least one feature column and a label column, found {n_cols} columns"
            )));
        }

        let features = self.numeric_block(0, n_cols - 1)?;
        let label_index = n_cols - 1;
        let mut labels = Vec::with_capacity(self.n_rows());
        for (row_index, row) in self.rows.iter().enumerate() {
            match &row[label_index] {
                Cell::Number(v) if !v.is_nan() => labels.push(*v),
                other => {
                    return Err(PipelineError::malformed(format!(
                        "label column '{}' row {} is not numeric: '{other}'",
                        self.columns[label_index],
                        row_index + 1
                    )))
                }
            }
        }
        Ok((features, Array1::from(labels)))
    }

    fn numeric_block(&self, start: usize, end: usize) -> Result<Array2<f64>, PipelineError> {
        let width = end - start;
        let mut data = Vec::with_capacity(self.n_rows() * width);
        for (row_index, row) in self.rows.iter().enumerate() {
            for (offset, cell) in row[start..end].iter().enumerate() {
                let value = cell.as_f64().ok_or_else(|| {
                    PipelineError::malformed(format!(
                        "column '{}' row {} is not numeric: '{cell}'",
                        self.columns[start + offset],
                        row_index + 1
                    ))
                })?;
                data.push(value);
            }
        }
        Ok(Array2::from_shape_vec((self.n_rows(), width), data)?)
    }
}

impl Artifact for Table {
    type Location = PathBuf;

    fn load(location: &PathBuf) -> Result<Self, PipelineError> {
        file_exists_check(location, "File Not Found")?;
        csv::read_csv(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample() -> Table {
        Table::from_rows(
            vec!["a".into(), "b".into(), "target".into()],
            vec![
                vec![Cell::Number(1.0), Cell::Missing, Cell::Number(0.0)],
                vec![Cell::Number(2.0), Cell::Number(5.0), Cell::Number(1.0)],
                vec![Cell::Number(3.0), Cell::Number(6.0), Cell::Number(0.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(" 1.5 "), Cell::Number(1.5));
        assert_eq!(Cell::parse("NA"), Cell::Missing);
        assert_eq!(Cell::parse("nan"), Cell::Missing);
        assert_eq!(Cell::parse("abc"), Cell::Text("abc".into()));
    }

    #[test]
    fn test_shape_and_columns() {
        let table = sample();
        assert_eq!(table.shape(), [3, 3]);
        assert_eq!(table.column_index("target"), Some(2));
        assert_eq!(table.column_index("nope"), None);
    }

    #[test]
    fn test_ragged_row_rejected() {
        let err = Table::from_rows(vec!["a".into(), "b".into()], vec![vec![Cell::Number(1.0)]])
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedData(_)));
    }

    #[test]
    fn test_value_counts() {
        let counts = sample().value_counts("target").unwrap();
        assert_eq!(counts.get("0"), Some(&2));
        assert_eq!(counts.get("1"), Some(&1));
        assert!(sample().value_counts("missing").is_err());
    }

    #[test]
    fn test_split_last_column() {
        let (x, y) = sample().split_last_column().unwrap();
        assert_eq!(x.dim(), (3, 2));
        assert!(x[[0, 1]].is_nan());
        assert_eq!(y, ndarray::array![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_split_rejects_text_features() {
        let table = Table::from_rows(
            vec!["a".into(), "target".into()],
            vec![vec![Cell::Text("abc".into()), Cell::Number(1.0)]],
        )
        .unwrap();
        let err = table.split_last_column().unwrap_err();
        assert!(err.to_string().contains("column 'a' row 1"));
    }

    #[test]
    fn test_split_rejects_missing_label() {
        let table = Table::from_rows(
            vec!["a".into(), "target".into()],
            vec![vec![Cell::Number(1.0), Cell::Missing]],
        )
        .unwrap();
        assert!(table.split_last_column().is_err());
    }

    #[test]
    fn test_drop_and_set_column() {
        let mut table = sample();
        assert!(table.drop_column("target"));
        assert!(!table.drop_column("target"));
        assert_eq!(table.n_cols(), 2);

        table
            .set_column("target", &ndarray::array![1.0, 1.0, 0.0])
            .unwrap();
        assert_eq!(table.columns().last().map(String::as_str), Some("target"));
        assert_eq!(table.rows()[2][2], Cell::Number(0.0));
        assert!(table.set_column("short", &ndarray::array![1.0]).is_err());
    }

    #[test]
    fn test_move_column_to_end() {
        let mut table = sample();
        assert!(table.move_column_to_end("a"));
        assert_eq!(table.columns(), &["b", "target", "a"]);
        assert_eq!(table.rows()[1][2], Cell::Number(2.0));
        assert!(!table.move_column_to_end("missing"));
    }

    #[test]
    fn test_shuffle_keeps_rows() {
        let mut table = sample();
        let mut rng = StdRng::seed_from_u64(7);
        table.shuffle_rows(&mut rng);

        assert_eq!(table.n_rows(), 3);
        let mut firsts: Vec<f64> = table.rows().iter().filter_map(|r| r[0].as_f64()).collect();
        firsts.sort_by(f64::total_cmp);
        assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
    }
}
