//! Tabular data, numeric matrices and their on-disk formats.

pub mod csv;
mod matrix;
mod table;

pub use matrix::{
    has_nan, label_counts, load_matrix_txt, load_vector_txt, matrix_from_rows, save_matrix_txt,
    save_vector_txt, TrainingSet, TrainingSetPaths,
};
pub use table::{Cell, Table};
