use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use signal_trade_bot::config::SharedConfig;
use signal_trade_bot::feed::Feed;
use signal_trade_bot::pipeline::{spawn_workers, SignalPipeline};
use signal_trade_bot::storage::TradeStore;

pub struct SignalBot {
    config: SharedConfig,
    store: Arc<dyn TradeStore>,
    pipeline: Arc<SignalPipeline>,
    feed: Box<dyn Feed>,
}

impl SignalBot {
    pub async fn new(
        config: SharedConfig,
        store: Arc<dyn TradeStore>,
        pipeline: SignalPipeline,
        feed: Box<dyn Feed>,
    ) -> Result<Self> {
        {
            let cfg = config.read().await;
            info!("{}", "=".repeat(60));
            info!("Signal trade bot starting up");
            info!("Environment: {}", cfg.system.environment);
            info!("Broker: {}", cfg.trading.broker);
            info!("Channels:");
            for channel in &cfg.channels {
                info!(
                    "  {}: {} ({}){}",
                    channel.id,
                    channel.name,
                    channel.source,
                    if channel.enabled { "" } else { " [disabled]" }
                );
            }
            info!("{}", "=".repeat(60));
        }

        pipeline
            .seed_counters()
            .await
            .context("reading last trade sequences")?;

        Ok(Self {
            config,
            store,
            pipeline: Arc::new(pipeline),
            feed,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        let capacity = self.config.read().await.system.queue_capacity;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let workers = spawn_workers(self.pipeline.clone(), rx, capacity, shutdown_rx.clone());

        info!("Bot is now running. Press Ctrl+C to stop.");
        self.print_status().await;

        let feed_result = tokio::select! {
            _ = tokio::signal::ctrl_c() => Ok(()),
            res = self.feed.run(tx, shutdown_rx) => res,
        };
        if let Err(e) = &feed_result {
            error!("Channel feed stopped: {:#}", e);
        }

        info!("Shutting down...");
        let _ = shutdown_tx.send(true);
        workers.join().await;
        self.print_status().await;
        info!("Bot stopped.");

        feed_result
    }

    async fn print_status(&self) {
        let cfg = self.config.read().await;
        info!(
            "Balance: {} {} | Risk: {}% per trade",
            cfg.trading.account_balance, cfg.trading.account_currency, cfg.trading.risk_percentage
        );
        drop(cfg);

        match self.store.get_active_trades().await {
            Ok(active) => {
                info!("Active trades: {}", active.len());
                for trade in &active {
                    info!(
                        "  {} {} {} @ {} [{}]",
                        trade.trade_id, trade.action, trade.symbol, trade.entry_price, trade.status
                    );
                }
            }
            Err(e) => error!("Could not load active trades: {}", e),
        }

        for channel in self.pipeline.channels() {
            if let Some(last) = self.pipeline.counter(&channel).await {
                info!("Channel {}: {} signals taken", channel, last);
            }
        }
    }
}
