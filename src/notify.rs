// src/notify.rs

//! Change notification sinks.
//!
//! The scheduler invokes a notifier synchronously whenever a check comes
//! back Changed. Delivery failures are the scheduler's problem only insofar
//! as they must not break the round; they are logged and swallowed there.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{AppError, Result};

/// A detected content change, as handed to the notification sink.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Site identifier
    pub name: String,
    /// Monitored URL
    pub url: String,
    /// Short diagnostic, e.g. "content changed" or "first snapshot"
    pub reason: String,
}

/// Sink for change events.
#[async_trait]
pub trait Notifier: Send {
    async fn notify(&self, event: &ChangeEvent) -> Result<()>;
}

#[async_trait]
impl Notifier for Box<dyn Notifier + Send + Sync> {
    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        (**self).notify(event).await
    }
}

/// Notifier that only writes a log line. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        log::info!(
            "CHANGE detected for {} ({}): {}",
            event.name,
            event.url,
            event.reason
        );
        Ok(())
    }
}

/// Notifier that POSTs the event as JSON to a webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        let response = self.client.post(&self.url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::notify(format!(
                "webhook returned status {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_to_flat_json() {
        let event = ChangeEvent {
            name: "StaticSite".into(),
            url: "https://example.com/static".into(),
            reason: "content changed".into(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["name"], "StaticSite");
        assert_eq!(json["url"], "https://example.com/static");
        assert_eq!(json["reason"], "content changed");
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let event = ChangeEvent {
            name: "JSApp".into(),
            url: "https://example.com/dynamic".into(),
            reason: "first snapshot".into(),
        };
        assert!(LogNotifier.notify(&event).await.is_ok());
    }
}
