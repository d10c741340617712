use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use redmon_core::{MatchedPost, NotifyError};

use crate::format;
use crate::Channel;

/// Delivers notifications through a Discord webhook.
pub struct DiscordChannel {
    http: Client,
    webhook_url: String,
}

impl DiscordChannel {
    pub fn new(http: Client, webhook_url: String) -> Self {
        Self { http, webhook_url }
    }

    async fn send_text(&self, content: String) -> Result<(), NotifyError> {
        let body = serde_json::json!({ "content": content });

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                channel: "discord".to_string(),
                reason: e.to_string(),
            })?;

        // Discord webhooks answer 204 No Content on success
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::ChannelStatus {
                channel: "discord".to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Discord webhook delivered");
        Ok(())
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, posts: &[MatchedPost]) -> Result<(), NotifyError> {
        self.send_text(format::discord_message(posts)).await
    }

    async fn send_error(&self, context: &str, error: &str) -> Result<(), NotifyError> {
        self.send_text(format::error_message(context, error)).await
    }
}
