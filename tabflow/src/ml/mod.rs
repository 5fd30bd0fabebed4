//! Classical tabular ML routines used by the processing, build and
//! inference stages.
//!
//! - [`MedianImputer`]: per-column median fill
//! - [`Smote`]: class rebalancing by synthetic oversampling
//! - [`StandardScaler`] and [`train_test_split`]
//! - [`RandomForest`] with [`RandomizedSearch`] for tuning
//! - [`ConfusionMatrix`] for evaluation
//! - [`TrainedModel`]: the persisted artifact

mod forest;
mod impute;
mod metrics;
mod model;
mod scaler;
mod search;
mod smote;
mod split;
mod tree;

pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use impute::MedianImputer;
pub use metrics::{accuracy_score, ConfusionMatrix};
pub use model::TrainedModel;
pub use scaler::StandardScaler;
pub use search::{stratified_folds, CandidateScore, ParamGrid, RandomizedSearch, SearchReport};
pub use smote::Smote;
pub use split::{train_test_split, Split};
pub use tree::{Criterion, DecisionTree, TreeParams};
