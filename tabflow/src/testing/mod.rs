//! Testing utilities for tabflow pipelines.
//!
//! Seeded synthetic tables, training sets and small fitted models for
//! unit tests, scenario tests and benchmarks.

pub mod fixtures;

pub use fixtures::{
    separable_training_set, synthetic_table, trained_model, unlabeled_batch, TableSpec,
};
