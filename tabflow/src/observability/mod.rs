//! Observability utilities: stage timing and metric recording.

mod recorder;
mod timing;

pub use recorder::{
    CollectingRecorder, FanoutRecorder, JsonLinesRecorder, LoggingRecorder, MetricsRecorder,
    NoOpRecorder,
};
pub use timing::{duration_message, StageTimer};
