mod bot;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use signal_trade_bot::config::Config;
use signal_trade_bot::feed::{ChannelRoutes, TelegramFeed};
use signal_trade_bot::notify::{LogNotifier, Notifier, TelegramNotifier};
use signal_trade_bot::pipeline::SignalPipeline;
use signal_trade_bot::storage::{SqliteStore, TradeStore};

use crate::bot::SignalBot;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.system.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let store: Arc<dyn TradeStore> = Arc::new(
        SqliteStore::connect(&cfg.system.database_url)
            .await
            .context("opening trade database")?,
    );

    let notifier: Arc<dyn Notifier> = match TelegramNotifier::new(&cfg.telegram) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            warn!("Telegram notifications disabled ({}), logging setups instead", e);
            Arc::new(LogNotifier)
        }
    };

    let feed = Box::new(TelegramFeed::new(&cfg.telegram, ChannelRoutes::from_config(&cfg))?);
    info!("Monitoring {} channel(s)", cfg.enabled_channels().count());

    let shared_config = cfg.shared();
    let pipeline = SignalPipeline::new(store.clone(), notifier, shared_config.clone()).await;

    let bot = SignalBot::new(shared_config, store, pipeline, feed).await?;
    bot.run().await?;

    Ok(())
}
