//! Outbound notification delivery
//!
//! Notifications (bid-request links, award notices, rejections, purchase
//! orders) are posted to a configurable webhook. Delivery is best-effort:
//! callers log failures but never roll back committed state over them.

use crate::engine::Notifier;
use crate::state_machine::NoticeDraft;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification endpoint rejected delivery with status {status}")]
    Rejected { status: u16 },
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Delivers notifications by POSTing JSON to a webhook endpoint
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");

        Self { client, endpoint }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notice: &NoticeDraft) -> Result<(), NotifyError> {
        debug!(to = %notice.to, subject = %notice.subject, "delivering notification");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&WebhookPayload {
                to: &notice.to,
                subject: &notice.subject,
                body: &notice.body,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Logs notifications instead of delivering them.
///
/// Used when no webhook endpoint is configured, so the rest of the system
/// behaves identically in local development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &NoticeDraft) -> Result<(), NotifyError> {
        info!(to = %notice.to, subject = %notice.subject, "notification (not delivered, no endpoint configured)");
        Ok(())
    }
}
