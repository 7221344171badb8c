//! Outgoing notifications
//!
//! A [`Notifier`] never fails: delivery problems come back as a
//! [`NotificationReport`] with `success = false`, so a committed workflow
//! transition is never undone by mail trouble.

mod resend;
pub mod templates;

pub use resend::ResendNotifier;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::MailConfig;
use crate::errors::Result;

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Delivery outcome, returned to callers as a non-fatal field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub success: bool,
    pub message: String,
}

impl NotificationReport {
    pub fn sent(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> NotificationReport;
}

/// Pick the sender for this configuration: Resend with an API key, logging otherwise
pub fn from_config(config: &MailConfig) -> Result<Box<dyn Notifier>> {
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(api_key) => Ok(Box::new(ResendNotifier::new(config, api_key)?)),
        None => {
            tracing::warn!("No mail API key configured, notifications will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}

/// Writes notifications to the log instead of sending them
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> NotificationReport {
        info!(
            to = ?notification.to,
            subject = %notification.subject,
            "Notification (log only)"
        );
        NotificationReport::sent(format!("Logged notification to {} recipient(s)", notification.to.len()))
    }
}

/// Keeps every notification in memory; can be told to fail
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> NotificationReport {
        if self.fail.load(Ordering::SeqCst) {
            return NotificationReport::failed("Mail provider unavailable");
        }
        let count = notification.to.len();
        self.sent.write().await.push(notification);
        NotificationReport::sent(format!("Sent to {} recipient(s)", count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> Notification {
        Notification {
            to: vec!["a@example.org".into()],
            subject: "Hello".into(),
            html: "<p>hi</p>".into(),
        }
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        assert!(notifier.send(note()).await.success);

        notifier.fail_sends(true);
        let report = notifier.send(note()).await;
        assert!(!report.success);
        assert_eq!(notifier.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_log_notifier_reports_success() {
        assert!(LogNotifier.send(note()).await.success);
    }

    #[test]
    fn test_from_config_without_key_logs() {
        let config = MailConfig::default();
        assert!(config.api_key.is_none());
        assert!(from_config(&config).is_ok());
    }
}
