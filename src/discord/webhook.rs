//! Outbound delivery through a Discord webhook.
//!
//! One POST per notification, no retries. Discord enforces its own length
//! and rate limits; a rejection comes back as [`DeliveryError::Rejected`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serenity::async_trait;
use tracing::debug;

use crate::common::{DeliveryError, OutboundNotification};
use crate::config::SettingsStore;

/// Sends notifications to the Discord channel.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, notification: OutboundNotification) -> Result<(), DeliveryError>;
}

/// Body of a webhook execute request.
#[derive(Debug, Serialize, PartialEq)]
struct WebhookPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    content: &'a str,
}

impl<'a> From<&'a OutboundNotification> for WebhookPayload<'a> {
    fn from(notification: &'a OutboundNotification) -> Self {
        Self {
            username: notification.effective_username(),
            avatar_url: notification.avatar_url.as_deref(),
            content: &notification.body,
        }
    }
}

/// Dispatcher posting to the webhook URL of the current settings snapshot.
pub struct WebhookDispatcher {
    http: reqwest::Client,
    settings: Arc<SettingsStore>,
}

impl WebhookDispatcher {
    pub fn new(settings: Arc<SettingsStore>) -> Result<Self, DeliveryError> {
        // Same transport limits as the gateway's HTTP client.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { http, settings })
    }

    async fn post(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<(), DeliveryError> {
        let url = reqwest::Url::parse(url).map_err(|_| DeliveryError::InvalidEndpoint {
            url: url.to_string(),
        })?;

        let response = self.http.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Webhook accepted message");
        Ok(())
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn send(&self, notification: OutboundNotification) -> Result<(), DeliveryError> {
        let url = self.settings.snapshot().discord.webhook.clone();
        self.post(&url, &WebhookPayload::from(&notification)).await
    }
}
