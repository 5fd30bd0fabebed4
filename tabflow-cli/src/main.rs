//! Tabflow CLI: runs one pipeline action and exits non-zero on failure.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tabflow::config::{load_config, LogLevel, LoggingConfig, PipelineConfig};
use tabflow::notify::{NoOpNotifier, Notifier};
use tabflow::observability::{FanoutRecorder, JsonLinesRecorder, LoggingRecorder};
use tabflow::pipeline::{Action, Pipeline};
use tabflow::source::SqliteStore;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Batch pipeline for tabular classification
#[derive(Parser, Debug)]
#[command(name = "tabflow", version, about, long_about = None)]
struct Cli {
    /// What to run: data-fetch, data-check, data-process, model-build,
    /// inference or full-pipeline
    #[arg(short, long, default_value = "full-pipeline")]
    action: Action,

    /// Log level: critical, error, warning, info or debug
    #[arg(short, long, default_value = "info")]
    log: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Train with the fixed hyperparameters even if tuning is configured
    #[arg(long)]
    no_tuning: bool,
}

fn init_logging(level: LogLevel, settings: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let filter = LevelFilter::from_level(level.as_tracing());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    std::fs::create_dir_all(&settings.directory).with_context(|| {
        format!("Cannot create log directory {}", settings.directory.display())
    })?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::MINUTELY)
        .filename_prefix(&settings.file_prefix)
        .filename_suffix("log")
        .max_log_files(settings.max_files)
        .build(&settings.directory)
        .context("Cannot open log file")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

fn notifier(config: &PipelineConfig) -> Arc<dyn Notifier> {
    match &config.notify.webhook_url {
        #[cfg(feature = "webhook")]
        Some(url) => Arc::new(tabflow::notify::WebhookNotifier::new(url.clone())),
        #[cfg(not(feature = "webhook"))]
        Some(_) => {
            warn!("webhook_url is set but the webhook feature is disabled");
            Arc::new(NoOpNotifier)
        }
        None => Arc::new(NoOpNotifier),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Reject a bad level before anything else runs.
    let level: LogLevel = cli.log.parse()?;
    let config = load_config(cli.config.as_deref()).context("Configuration error")?;
    let _guard = init_logging(level, &config.logging)?;

    let mut recorder = FanoutRecorder::new().with(Arc::new(LoggingRecorder));
    if let Some(path) = &config.metrics.json_path {
        recorder = recorder.with(Arc::new(JsonLinesRecorder::new(path)));
    }
    let enable_tuning = config.model.enable_tuning && !cli.no_tuning;
    let notifier = notifier(&config);
    let source = Arc::new(SqliteStore::new(&config.source.database_path));

    info!(
        action = %cli.action,
        %level,
        database = %config.source.database_path.display(),
        "Starting tabflow"
    );
    let pipeline = Pipeline::new(Arc::new(config), source)
        .with_recorder(Arc::new(recorder))
        .with_notifier(notifier);

    let report = pipeline.run_action(cli.action, enable_tuning).await?;
    if !report.succeeded() {
        warn!(run_id = %report.run_id, "A stage reported a failed status");
        anyhow::bail!("{} finished with a failed stage", cli.action);
    }
    Ok(())
}
