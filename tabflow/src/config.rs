//! Pipeline configuration.
//!
//! Values are layered with `figment`: built-in defaults, then an optional
//! TOML file, then environment variables prefixed `TABFLOW_` with `__`
//! separating nested keys (`TABFLOW_MODEL__ENABLE_TUNING=false`).

use crate::errors::PipelineError;
use crate::ml::{ForestParams, MaxFeatures, ParamGrid, RandomizedSearch};
use crate::utils::delete_file;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

/// Complete configuration shared by every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Relational source and table names.
    #[serde(default)]
    pub source: SourceConfig,
    /// Locations of the intermediate artifacts.
    #[serde(default)]
    pub paths: ArtifactPaths,
    /// Validation thresholds.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Cleaning and rebalancing.
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Training.
    #[serde(default)]
    pub model: ModelConfig,
    /// Batch inference.
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Error notification.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Stage metric persistence.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Log file output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Rejects values no stage can work with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| PipelineError::config(e.to_string()))?;
        for (key, name) in [
            ("source.table", &self.source.table),
            ("source.inference_table", &self.source.inference_table),
            ("source.result_table", &self.source.result_table),
        ] {
            if !identifier.is_match(name) {
                return Err(PipelineError::config(format!(
                    "{key} must be a plain SQL identifier, got '{name}'"
                )));
            }
        }

        if self.processing.label_column.is_empty() {
            return Err(PipelineError::config("processing.label_column is empty"));
        }
        if self.processing.smote_k_neighbors == 0 {
            return Err(PipelineError::config(
                "processing.smote_k_neighbors must be at least 1",
            ));
        }
        if !(self.model.test_size > 0.0 && self.model.test_size < 1.0) {
            return Err(PipelineError::config(format!(
                "model.test_size must be in (0, 1), got {}",
                self.model.test_size
            )));
        }
        self.model
            .forest_params()
            .validate()
            .map_err(|e| PipelineError::config(e.to_string()))?;
        if self.model.search.n_iter == 0 {
            return Err(PipelineError::config("model.search.n_iter must be at least 1"));
        }
        if self.model.search.cv < 2 {
            return Err(PipelineError::config("model.search.cv must be at least 2"));
        }
        if self.logging.max_files == 0 {
            return Err(PipelineError::config("logging.max_files must be at least 1"));
        }
        Ok(())
    }
}

/// Where tables are read from and written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Table snapshotted by the acquisition stage.
    #[serde(default = "default_table")]
    pub table: String,
    /// Table holding the rows to label.
    #[serde(default = "default_table")]
    pub inference_table: String,
    /// Table replaced with predictions.
    #[serde(default = "default_result_table")]
    pub result_table: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tabflow.db")
}

fn default_table() -> String {
    "q6_data".to_string()
}

fn default_result_table() -> String {
    "q6_data_result".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            table: default_table(),
            inference_table: default_table(),
            result_table: default_result_table(),
        }
    }
}

/// Well-known locations of the intermediate artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Raw dataset snapshot (CSV).
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Feature matrix (text).
    #[serde(default = "default_features_file")]
    pub features_file: PathBuf,
    /// Label vector (text).
    #[serde(default = "default_labels_file")]
    pub labels_file: PathBuf,
    /// Trained model (JSON).
    #[serde(default = "default_model_file")]
    pub model_file: PathBuf,
}

fn default_data_file() -> PathBuf {
    std::env::temp_dir().join("tabflow_data.csv")
}

fn default_features_file() -> PathBuf {
    std::env::temp_dir().join("tabflow_X.txt")
}

fn default_labels_file() -> PathBuf {
    std::env::temp_dir().join("tabflow_y.txt")
}

fn default_model_file() -> PathBuf {
    std::env::temp_dir().join("tabflow_model.json")
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            features_file: default_features_file(),
            labels_file: default_labels_file(),
            model_file: default_model_file(),
        }
    }
}

impl ArtifactPaths {
    /// Puts every artifact under `dir` with its default file name.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            data_file: dir.join("tabflow_data.csv"),
            features_file: dir.join("tabflow_X.txt"),
            labels_file: dir.join("tabflow_y.txt"),
            model_file: dir.join("tabflow_model.json"),
        }
    }

    /// Locations of the feature and label files.
    #[must_use]
    pub fn training_set(&self) -> crate::data::TrainingSetPaths {
        crate::data::TrainingSetPaths {
            features: self.features_file.clone(),
            labels: self.labels_file.clone(),
        }
    }

    /// Every artifact path.
    #[must_use]
    pub fn all(&self) -> [&Path; 4] {
        [
            &self.data_file,
            &self.features_file,
            &self.labels_file,
            &self.model_file,
        ]
    }

    /// Deletes every artifact that exists.
    pub fn remove_all(&self) -> Result<(), PipelineError> {
        for path in self.all() {
            delete_file(path)?;
        }
        Ok(())
    }
}

/// Thresholds checked by the validation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Row count must be strictly greater.
    #[serde(default = "default_min_row_count")]
    pub min_row_count: u64,
    /// Column count must be exactly this.
    #[serde(default = "default_expected_col_count")]
    pub expected_col_count: u64,
    /// File size in bytes must be strictly greater.
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,
}

fn default_min_row_count() -> u64 {
    1000
}

fn default_expected_col_count() -> u64 {
    152
}

fn default_min_file_size() -> u64 {
    10_000_000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_row_count: default_min_row_count(),
            expected_col_count: default_expected_col_count(),
            min_file_size: default_min_file_size(),
        }
    }
}

/// Cleaning and rebalancing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Name of the label column.
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Seed of the oversampler.
    #[serde(default = "default_smote_seed")]
    pub smote_seed: u64,
    /// Neighbours considered by the oversampler.
    #[serde(default = "default_smote_k_neighbors")]
    pub smote_k_neighbors: usize,
}

fn default_label_column() -> String {
    "target".to_string()
}

fn default_smote_seed() -> u64 {
    31
}

fn default_smote_k_neighbors() -> usize {
    5
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            label_column: default_label_column(),
            smote_seed: default_smote_seed(),
            smote_k_neighbors: default_smote_k_neighbors(),
        }
    }
}

/// Training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Held-out fraction.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    /// Seed of the split and of the untuned forest.
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    /// Tune with randomized search when no flag is given.
    #[serde(default = "default_enable_tuning")]
    pub enable_tuning: bool,
    /// Trees in the untuned forest.
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Minimum samples to split, untuned forest.
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    /// Minimum samples per leaf, untuned forest.
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Depth limit of the untuned forest.
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<usize>,
    /// Randomized search settings.
    #[serde(default)]
    pub search: SearchConfig,
}

fn default_test_size() -> f64 {
    0.25
}

fn default_random_state() -> u64 {
    4
}

fn default_enable_tuning() -> bool {
    true
}

fn default_n_estimators() -> usize {
    25
}

fn default_min_samples_split() -> usize {
    5
}

fn default_min_samples_leaf() -> usize {
    2
}

#[allow(clippy::unnecessary_wraps)]
fn default_max_depth() -> Option<usize> {
    Some(26)
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            random_state: default_random_state(),
            enable_tuning: default_enable_tuning(),
            n_estimators: default_n_estimators(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            max_depth: default_max_depth(),
            search: SearchConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Hyperparameters of the untuned forest.
    #[must_use]
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_features: MaxFeatures::Auto,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            bootstrap: true,
            ..ForestParams::default()
        }
    }
}

/// Randomized search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Combinations sampled.
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Cross-validation folds.
    #[serde(default = "default_cv")]
    pub cv: usize,
    /// Seed of the combination sampler.
    #[serde(default = "default_search_random_state")]
    pub random_state: u64,
    /// Seed of every forest fitted during the search. Unset, each fit is
    /// seeded from the OS.
    #[serde(default)]
    pub forest_seed: Option<u64>,
    /// Values searched over.
    #[serde(default)]
    pub grid: ParamGrid,
}

fn default_n_iter() -> usize {
    3
}

fn default_cv() -> usize {
    3
}

fn default_search_random_state() -> u64 {
    42
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_iter: default_n_iter(),
            cv: default_cv(),
            random_state: default_search_random_state(),
            forest_seed: None,
            grid: ParamGrid::default(),
        }
    }
}

impl SearchConfig {
    /// Builds the configured search.
    #[must_use]
    pub fn to_search(&self) -> RandomizedSearch {
        RandomizedSearch::new(self.grid.clone())
            .with_n_iter(self.n_iter)
            .with_cv(self.cv)
            .with_random_state(self.random_state)
            .with_forest_seed(self.forest_seed)
    }
}

/// Batch inference settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Write predictions back to the result table.
    #[serde(default = "default_persist_results")]
    pub persist_results: bool,
}

fn default_persist_results() -> bool {
    true
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            persist_results: default_persist_results(),
        }
    }
}

/// Error notification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Endpoint receiving a JSON POST per pipeline error.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Stage metric persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// File receiving one JSON line per stage result.
    #[serde(default)]
    pub json_path: Option<PathBuf>,
}

/// Rotating log file settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory of the log files.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    /// File name prefix.
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
    /// Rotated files kept.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_prefix() -> String {
    "pipeline".to_string()
}

fn default_max_files() -> usize {
    5
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: default_log_prefix(),
            max_files: default_max_files(),
        }
    }
}

/// Loads configuration: defaults, then `file` if given, then `TABFLOW_*`
/// environment variables. The result is validated.
pub fn load_config(file: Option<&Path>) -> Result<PipelineConfig, PipelineError> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));
    if let Some(path) = file {
        if !path.exists() {
            return Err(PipelineError::file_not_found("Config File Not Found", path));
        }
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("TABFLOW_").split("__"));

    let config: PipelineConfig = figment
        .extract()
        .map_err(|e| PipelineError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Accepted `--log` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Same as error.
    Critical,
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warning,
    /// Progress messages.
    Info,
    /// Everything, including stage internals.
    Debug,
}

impl LogLevel {
    /// The `tracing` level this maps to.
    #[must_use]
    pub fn as_tracing(self) -> Level {
        match self {
            Self::Critical | Self::Error => Level::ERROR,
            Self::Warning => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            _ => Err(PipelineError::config(format!("Invalid log level: {s}"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        f.write_str(name)
    }
}
