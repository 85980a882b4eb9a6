//! Outbound notifications.
//!
//! Messages follow the Slack incoming-webhook envelope: a text field plus
//! optional attachment blocks. [`SlackWebhook`] posts them; in dry mode it
//! only logs what would have been sent.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Attachment color used for enriched messages.
pub const COLOR_GOOD: &str = "good";

/// A formatted notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// One attachment block of a [`Message`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Event time in unix seconds.
    pub ts: i64,
}

/// Destination for formatted notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), DispatchError>;
}

/// Posts messages to a Slack incoming webhook.
pub struct SlackWebhook {
    webhook: String,
    client: reqwest::Client,
    dry: bool,
}

impl SlackWebhook {
    pub fn new(webhook: impl Into<String>, dry: bool, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self {
            webhook: webhook.into(),
            client,
            dry,
        })
    }

    pub fn is_dry(&self) -> bool {
        self.dry
    }
}

#[async_trait]
impl NotificationSink for SlackWebhook {
    async fn send(&self, message: &Message) -> Result<(), DispatchError> {
        let body = serde_json::to_string(message)?;
        if self.dry {
            crate::log_event!("slack", "dry run", "{body}");
            return Ok(());
        }
        crate::debug_event!("slack", "posting", "{body}");

        let response = self
            .client
            .post(&self.webhook)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
