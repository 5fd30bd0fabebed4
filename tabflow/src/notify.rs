//! Error notification hooks.
//!
//! The orchestrator hands every pipeline error to a [`Notifier`] at its
//! top-level boundary. Notification failures are logged and never replace
//! the original error.

use crate::errors::PipelineError;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::error;

/// Receives a description of every pipeline error.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `message`.
    async fn notify(&self, message: &str) -> Result<(), PipelineError>;
}

/// Discards every notification. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _message: &str) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Logs every notification at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, message: &str) -> Result<(), PipelineError> {
        error!(notification = %message, "Pipeline error notification");
        Ok(())
    }
}

/// Keeps every notification, for tests.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: RwLock<Vec<String>>,
}

impl CollectingNotifier {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.read().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, message: &str) -> Result<(), PipelineError> {
        self.messages.write().push(message.to_string());
        Ok(())
    }
}

/// POSTs `{"text": message}` to a URL.
#[cfg(feature = "webhook")]
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

#[cfg(feature = "webhook")]
impl WebhookNotifier {
    /// Creates a notifier posting to `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[cfg(feature = "webhook")]
#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<(), PipelineError> {
        self.client
            .post(&self.url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PipelineError::Notify(e.to_string()))?;
        Ok(())
    }
}
