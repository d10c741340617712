use anyhow::Context;
use tracing_subscriber::EnvFilter;

use monitor_service::Monitor;
use notifier::Notifier;
use reddit_client::RedditClient;
use redmon_core::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("redmon=info,monitor_service=info")),
        )
        .init();

    tracing::info!("Starting Redmon - Reddit keyword monitor");

    let config = Config::from_env().context("loading configuration from environment")?;
    let client = RedditClient::new(config.reddit.clone()).context("building Reddit client")?;
    let notifier = Notifier::from_config(&config.notify).context("building notifier")?;

    let mut monitor = Monitor::new(config, client, notifier);

    let run_once = std::env::args().nth(1).as_deref() == Some("once");
    if run_once {
        monitor.run_once().await.context("monitoring cycle")?;
    } else {
        monitor.run().await.context("monitoring loop")?;
    }

    Ok(())
}
