mod discord;
pub mod format;
mod slack;
mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info, warn};

use redmon_core::{MatchedPost, MonitorError, NotifyConfig, NotifyError};

pub use discord::DiscordChannel;
pub use slack::SlackChannel;
pub use telegram::TelegramChannel;

/// A single outbound notification channel.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver a batch of matched posts.
    async fn send(&self, posts: &[MatchedPost]) -> Result<(), NotifyError>;

    /// Deliver a short error notice. Best-effort.
    async fn send_error(&self, context: &str, error: &str) -> Result<(), NotifyError>;
}

/// Fans notifications out to every configured channel. A failure on one
/// channel never blocks delivery on the others.
pub struct Notifier {
    channels: Vec<Box<dyn Channel>>,
}

impl Notifier {
    /// Build channels from whatever credentials are configured. Unconfigured
    /// channels are simply skipped.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, MonitorError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let mut channels: Vec<Box<dyn Channel>> = Vec::new();

        match (&config.telegram_bot_token, &config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => {
                channels.push(Box::new(TelegramChannel::new(
                    http.clone(),
                    token.clone(),
                    chat_id.clone(),
                )));
            }
            (Some(_), None) | (None, Some(_)) => {
                warn!("Telegram needs both a bot token and a chat id, skipping channel");
            }
            (None, None) => {}
        }

        if let Some(url) = &config.discord_webhook_url {
            channels.push(Box::new(DiscordChannel::new(http.clone(), url.clone())));
        }
        if let Some(url) = &config.slack_webhook_url {
            channels.push(Box::new(SlackChannel::new(http, url.clone())));
        }

        if channels.is_empty() {
            warn!("No notification channels configured, matches will only be logged");
        } else {
            let names: Vec<_> = channels.iter().map(|c| c.name()).collect();
            info!("Notification channels enabled: {}", names.join(", "));
        }

        Ok(Self { channels })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send matches to every channel, returning the names of the channels
    /// that delivered successfully.
    pub async fn notify(&self, posts: &[MatchedPost]) -> Vec<String> {
        let mut delivered = Vec::new();
        for channel in &self.channels {
            match channel.send(posts).await {
                Ok(()) => {
                    info!("Notified {} post(s) via {}", posts.len(), channel.name());
                    delivered.push(channel.name().to_string());
                }
                Err(e) => {
                    error!("Failed to notify via {}: {}", channel.name(), e);
                }
            }
        }
        delivered
    }

    /// Send an error notice to every channel. Failures here are only logged.
    pub async fn notify_error(&self, context: &str, error: &str) {
        for channel in &self.channels {
            if let Err(e) = channel.send_error(context, error).await {
                warn!("Could not report error via {}: {}", channel.name(), e);
            }
        }
    }
}
