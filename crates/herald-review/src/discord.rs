use std::time::Duration;

use async_trait::async_trait;
use herald_core::HeraldError;
use log::{error, info};
use serde::Serialize;

/// Something that can post a message to the team chat.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Post `content` as a single message.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Delivery`] if the message was not accepted.
    async fn send(&self, content: &str) -> Result<(), HeraldError>;
}

/// Body of a Discord webhook execution.
///
/// # Examples
///
/// ```
/// use herald_review::discord::WebhookPayload;
///
/// let json = serde_json::to_value(WebhookPayload::new("hi <@1>")).unwrap();
/// assert_eq!(json["allowed_mentions"]["parse"][0], "users");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub content: &'a str,
    pub allowed_mentions: AllowedMentions,
}

/// Only user mentions may ping; roles and `@everyone` stay silent.
#[derive(Debug, Clone, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<&'static str>,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            content,
            allowed_mentions: AllowedMentions {
                parse: vec!["users"],
            },
        }
    }
}

/// Discord webhook client.
pub struct DiscordWebhook {
    client: reqwest::Client,
    url: String,
}

impl DiscordWebhook {
    /// Create a webhook client with a client-side `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Delivery`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, HeraldError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeraldError::Delivery(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ChatNotifier for DiscordWebhook {
    async fn send(&self, content: &str) -> Result<(), HeraldError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload::new(content))
            .send()
            .await
            .map_err(|e| {
                error!("Discord webhook request failed: {e}");
                HeraldError::Delivery(format!("webhook request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Discord webhook returned {status}: {body}");
            return Err(HeraldError::Delivery(format!(
                "webhook returned {status}: {body}"
            )));
        }

        info!("Discord message delivered ({status})");
        Ok(())
    }
}
