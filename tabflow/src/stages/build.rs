use super::{join_error, Stage, StageRun};
use crate::config::PipelineConfig;
use crate::core::{ArtifactSource, StageMetrics, StageName, StageResult, StageStatus};
use crate::data::TrainingSet;
use crate::errors::PipelineError;
use crate::ml::{
    train_test_split, ConfusionMatrix, RandomForest, SearchReport, StandardScaler, TrainedModel,
};
use crate::observability::StageTimer;
use crate::utils::file_sha256;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Input of [`ModelBuild`].
#[derive(Debug, Clone)]
pub struct BuildInput {
    /// Features and labels.
    pub training: ArtifactSource<TrainingSet>,
    /// Use randomized search instead of the fixed hyperparameters.
    pub enable_tuning: bool,
}

/// Trains, evaluates and saves the classifier.
#[derive(Debug, Clone)]
pub struct ModelBuild {
    config: Arc<PipelineConfig>,
}

impl ModelBuild {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }
}

struct Trained {
    model: TrainedModel,
    confusion_matrix: ConfusionMatrix,
    search: Option<SearchReport>,
}

fn train(
    config: &PipelineConfig,
    training: TrainingSet,
    enable_tuning: bool,
) -> Result<Trained, PipelineError> {
    let settings = &config.model;
    let (features, labels) = training.into_parts();
    let split = train_test_split(&features, &labels, settings.test_size, settings.random_state)?;
    debug!(
        train = split.x_train.nrows(),
        test = split.x_test.nrows(),
        "Split training data"
    );

    let scaler = StandardScaler::fit(&split.x_train)?;
    let x_train = scaler.transform(&split.x_train)?;
    let x_test = scaler.transform(&split.x_test)?;

    let (forest, search) = if enable_tuning {
        let (forest, report) = settings.search.to_search().fit(&x_train, &split.y_train)?;
        (forest, Some(report))
    } else {
        let params = settings.forest_params();
        debug!(?params, "Fitting forest with fixed parameters");
        let forest = RandomForest::fit(&x_train, &split.y_train, &params, settings.random_state)?;
        (forest, None)
    };

    let predicted = forest.predict(&x_test)?;
    let confusion_matrix = ConfusionMatrix::compute(&split.y_test, &predicted)?;

    Ok(Trained {
        model: TrainedModel::new(scaler, forest, enable_tuning)?,
        confusion_matrix,
        search,
    })
}

#[async_trait]
impl Stage for ModelBuild {
    type Input = BuildInput;
    type Output = TrainedModel;

    fn name(&self) -> StageName {
        StageName::Build
    }

    async fn run(&self, input: BuildInput) -> Result<StageRun<TrainedModel>, PipelineError> {
        let timer = StageTimer::start(self.name().as_str());
        let enable_tuning = input.enable_tuning;
        info!(enable_tuning, "Model build");

        let training = input.training.resolve()?;
        let config = Arc::clone(&self.config);
        let trained =
            tokio::task::spawn_blocking(move || train(&config, training, enable_tuning))
                .await
                .map_err(|e| join_error(self.name(), &e))??;

        let path = self.config.paths.model_file.clone();
        trained.model.save(&path)?;
        let model_sha256 = if path.exists() {
            Some(file_sha256(&path)?)
        } else {
            None
        };
        let status = StageStatus::from_check(path.exists(), || {
            format!("model was not written to {}", path.display())
        });

        let score = trained.confusion_matrix.accuracy();
        info!(
            score,
            path = %path.display(),
            duration = %timer.duration_message(),
            "Model build completed"
        );

        let result = StageResult::new(
            self.name(),
            status,
            timer.started_at(),
            StageMetrics::Build {
                confusion_matrix: trained.confusion_matrix,
                score,
                tuning_enabled: enable_tuning,
                model_save_path: path,
                model_sha256,
                search: trained.search,
            },
        );
        Ok(StageRun::new(result, trained.model))
    }
}
