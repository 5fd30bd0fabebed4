//! # Tabflow
//!
//! A staged batch pipeline for tabular binary classification.
//!
//! One run pulls a table snapshot from a relational source, validates its
//! shape and size, cleans and rebalances it, trains a random forest and
//! labels a fresh batch with it:
//!
//! - **Acquisition**: snapshot a source table to a CSV file
//! - **Validation**: row count, column count and file size thresholds
//! - **Processing**: shuffle, median imputation, SMOTE oversampling
//! - **Build**: standardization, random forest, optional randomized search
//! - **Inference**: predict a batch and write it back to the source
//!
//! Every stage reports a typed [`core::StageResult`]. The
//! [`pipeline::Pipeline`] records each one and stops at the first failure.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabflow::prelude::*;
//!
//! let config = Arc::new(load_config(None)?);
//! let source = Arc::new(SqliteStore::new(&config.source.database_path));
//! let report = Pipeline::new(config, source)
//!     .run_action(Action::FullPipeline, true)
//!     .await?;
//! assert!(report.succeeded());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, deny(unsafe_code))]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod config;
pub mod core;
pub mod data;
pub mod errors;
pub mod ml;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod source;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{load_config, LogLevel, PipelineConfig};
    pub use crate::core::{ArtifactSource, StageMetrics, StageName, StageResult, StageStatus};
    pub use crate::errors::PipelineError;
    pub use crate::notify::{LoggingNotifier, NoOpNotifier, Notifier};
    pub use crate::observability::{JsonLinesRecorder, LoggingRecorder, MetricsRecorder};
    pub use crate::pipeline::{Action, Pipeline, PipelineReport};
    pub use crate::source::{InMemoryStore, SqliteStore, TabularSource};
    pub use crate::stages::{Stage, StageRun};
    pub use std::sync::Arc;
}
