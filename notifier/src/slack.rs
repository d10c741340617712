use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use redmon_core::{MatchedPost, NotifyError};

use crate::format;
use crate::Channel;

/// Delivers notifications through a Slack incoming webhook.
pub struct SlackChannel {
    http: Client,
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(http: Client, webhook_url: String) -> Self {
        Self { http, webhook_url }
    }

    async fn send_text(&self, text: String) -> Result<(), NotifyError> {
        let body = serde_json::json!({ "text": text });

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                channel: "slack".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::ChannelStatus {
                channel: "slack".to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Slack webhook delivered");
        Ok(())
    }
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, posts: &[MatchedPost]) -> Result<(), NotifyError> {
        self.send_text(format::slack_message(posts)).await
    }

    async fn send_error(&self, context: &str, error: &str) -> Result<(), NotifyError> {
        self.send_text(format::error_message(context, error)).await
    }
}
