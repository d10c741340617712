use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use redmon_core::{MatchedPost, NotifyError};

use crate::format;
use crate::Channel;

/// Delivers notifications through the Telegram Bot API.
pub struct TelegramChannel {
    http: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(http: Client, bot_token: String, chat_id: String) -> Self {
        Self {
            http,
            bot_token,
            chat_id,
        }
    }

    async fn send_text(&self, text: String) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                channel: "telegram".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::ChannelStatus {
                channel: "telegram".to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Telegram message delivered");
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, posts: &[MatchedPost]) -> Result<(), NotifyError> {
        self.send_text(format::telegram_message(posts)).await
    }

    async fn send_error(&self, context: &str, error: &str) -> Result<(), NotifyError> {
        self.send_text(format::error_message(context, error)).await
    }
}
