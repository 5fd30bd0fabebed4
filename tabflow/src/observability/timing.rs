//! Stage timing helpers.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Wall-clock timer for a single stage.
///
/// Keeps both the UTC start time (for the result record) and a monotonic
/// instant (for the elapsed time).
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    started_at: DateTime<Utc>,
    name: String,
}

impl StageTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            started_at: Utc::now(),
            name: name.into(),
        }
    }

    /// When the timer was started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the elapsed time in seconds.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Returns the timer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Elapsed time formatted as `"N seconds"`.
    #[must_use]
    pub fn duration_message(&self) -> String {
        duration_message(self.elapsed_secs())
    }
}

/// Formats a duration in seconds as a rounded `"N seconds"` message.
#[must_use]
pub fn duration_message(secs: f64) -> String {
    format!("{} seconds", secs.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_message_rounds() {
        assert_eq!(duration_message(0.0), "0 seconds");
        assert_eq!(duration_message(1.4), "1 seconds");
        assert_eq!(duration_message(1.6), "2 seconds");
        assert_eq!(duration_message(125.0), "125 seconds");
    }

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("data_check");
        std::thread::sleep(std::time::Duration::from_millis(10));

        assert_eq!(timer.name(), "data_check");
        assert!(timer.elapsed_secs() >= 0.01);
        assert!(timer.started_at() <= Utc::now());
        assert_eq!(timer.duration_message(), "0 seconds");
    }
}
