//! Resend HTTP API sender

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Notification, NotificationReport, Notifier};
use crate::config::MailConfig;
use crate::errors::{AppError, Result};

pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    from: String,
    timeout: Duration,
    max_retries: u32,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl ResendNotifier {
    pub fn new(config: &MailConfig, api_key: &str) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            from: config.from_address.clone(),
            timeout,
            max_retries: config.max_retries,
        })
    }

    /// Backoff policy: exponential, bounded in total by the retries allowed
    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.timeout * (self.max_retries + 1)),
            ..Default::default()
        }
    }

    async fn post(&self, notification: &Notification) -> std::result::Result<String, backoff::Error<AppError>> {
        let url = format!("{}/emails", self.base_url);
        let request = SendEmailRequest {
            from: &self.from,
            to: &notification.to,
            subject: &notification.subject,
            html: &notification.html,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                backoff::Error::transient(AppError::Notification {
                    message: format!("Request failed: {}", e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AppError::Notification {
                message: format!("Mail API error {}: {}", status, body),
            };
            // Client errors other than throttling will not improve on retry
            return if status.is_client_error() && status.as_u16() != 429 {
                Err(backoff::Error::permanent(err))
            } else {
                Err(backoff::Error::transient(err))
            };
        }

        let body: SendEmailResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::Notification {
                message: format!("Failed to parse response: {}", e),
            })
        })?;
        Ok(body.id)
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, notification: Notification) -> NotificationReport {
        if notification.to.is_empty() {
            return NotificationReport::failed("No recipients");
        }

        let attempts = AtomicU32::new(0);
        let max_attempts = self.max_retries + 1;
        let (attempts, message) = (&attempts, &notification);

        let result = retry(self.policy(), || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.post(message).await {
                Ok(id) => Ok(id),
                Err(backoff::Error::Transient { err, .. }) if attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "Mail request failed, retrying"
                    );
                    Err(backoff::Error::transient(err))
                }
                Err(backoff::Error::Transient { err, .. }) => Err(backoff::Error::permanent(err)),
                Err(permanent) => Err(permanent),
            }
        })
        .await;

        match result {
            Ok(id) => {
                debug!(message_id = %id, recipients = notification.to.len(), "Mail accepted");
                NotificationReport::sent(format!("Email sent to {} recipient(s)", notification.to.len()))
            }
            Err(e) => {
                warn!(error = %e, subject = %notification.subject, "Mail delivery failed");
                NotificationReport::failed(format!("Failed to send email: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> MailConfig {
        MailConfig {
            base_url: base_url.to_string(),
            timeout_secs: 1,
            max_retries: 0,
            ..MailConfig::default()
        }
    }

    #[tokio::test]
    async fn test_empty_recipient_list_is_reported() {
        let notifier = ResendNotifier::new(&config("http://127.0.0.1:9"), "key").unwrap();
        let report = notifier
            .send(Notification { to: vec![], subject: "s".into(), html: "h".into() })
            .await;
        assert!(!report.success);
    }

    #[tokio::test]
    async fn test_unreachable_provider_becomes_failed_report() {
        // Port 9 (discard) is not listening in test environments
        let notifier = ResendNotifier::new(&config("http://127.0.0.1:9/"), "key").unwrap();
        let report = notifier
            .send(Notification {
                to: vec!["editor@example.org".into()],
                subject: "s".into(),
                html: "h".into(),
            })
            .await;
        assert!(!report.success);
        assert!(report.message.starts_with("Failed to send email"));
    }
}
