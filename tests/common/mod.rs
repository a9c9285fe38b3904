#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

use signal_trade_bot::config::Config;
use signal_trade_bot::core::lifecycle::StatusChange;
use signal_trade_bot::feed::Feed;
use signal_trade_bot::models::{
    ChannelId, InboundMessage, PerformanceRecord, Signal, Trade, TradeStatus,
};
use signal_trade_bot::notify::{Notifier, NotifyError};
use signal_trade_bot::pipeline::SignalPipeline;
use signal_trade_bot::storage::{MemoryStore, StoreError, TradeStore};

/// Two channels, $1000 USD, 1% risk.
pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.system.environment = "test".to_string();
    cfg.system.queue_capacity = 8;
    cfg.trading.account_balance = dec!(1000);
    cfg.trading.account_currency = "USD".to_string();
    cfg.trading.risk_percentage = dec!(1);
    cfg
}

pub async fn build_pipeline(
    store: Arc<dyn TradeStore>,
    notifier: Arc<dyn Notifier>,
) -> SignalPipeline {
    SignalPipeline::new(store, notifier, test_config().shared()).await
}

/// Records every setup it is asked to send; optionally fails each send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Trade>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let n = Self::default();
        n.fail.store(true, Ordering::SeqCst);
        n
    }

    pub async fn sent_ids(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|t| t.trade_id.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_trade_setup(&self, trade: &Trade) -> Result<(), NotifyError> {
        self.sent.lock().await.push(trade.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(())
    }
}

/// Takes `delay` to deliver setups for one channel, instantly for the rest.
pub struct SlowNotifier {
    channel: ChannelId,
    delay: std::time::Duration,
}

impl SlowNotifier {
    pub fn new(channel: &str, delay: std::time::Duration) -> Self {
        Self {
            channel: ChannelId::new(channel),
            delay,
        }
    }
}

#[async_trait]
impl Notifier for SlowNotifier {
    async fn send_trade_setup(&self, trade: &Trade) -> Result<(), NotifyError> {
        if trade.channel == self.channel {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// MemoryStore whose trade and signal writes always fail.
#[derive(Default)]
pub struct BrokenStore {
    pub inner: MemoryStore,
}

fn offline() -> StoreError {
    StoreError::Corrupt("database offline".to_string())
}

#[async_trait]
impl TradeStore for BrokenStore {
    async fn save_trade(&self, _trade: &Trade) -> Result<i64, StoreError> {
        Err(offline())
    }

    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        self.inner.get_trade(trade_id).await
    }

    async fn update_trade_status(
        &self,
        trade_id: &str,
        status: TradeStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, StoreError> {
        self.inner.update_trade_status(trade_id, status, at).await
    }

    async fn update_trade_profit(
        &self,
        trade_id: &str,
        pips: Decimal,
        amount: Decimal,
    ) -> Result<bool, StoreError> {
        self.inner.update_trade_profit(trade_id, pips, amount).await
    }

    async fn save_signal(
        &self,
        _channel: &ChannelId,
        _message: &str,
        _parsed: Option<&Signal>,
    ) -> Result<i64, StoreError> {
        Err(offline())
    }

    async fn attach_parsed_signal(&self, _signal_id: i64, _parsed: &Signal) -> Result<(), StoreError> {
        Err(offline())
    }

    async fn get_active_trades(&self) -> Result<Vec<Trade>, StoreError> {
        self.inner.get_active_trades().await
    }

    async fn trades_for_channel(&self, channel: &ChannelId) -> Result<Vec<Trade>, StoreError> {
        self.inner.trades_for_channel(channel).await
    }

    async fn record_performance(&self, record: &PerformanceRecord) -> Result<i64, StoreError> {
        self.inner.record_performance(record).await
    }

    async fn get_performance(
        &self,
        channel: &ChannelId,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, StoreError> {
        self.inner.get_performance(channel, date).await
    }

    async fn last_sequence(&self, channel: &ChannelId) -> Result<u64, StoreError> {
        self.inner.last_sequence(channel).await
    }
}

/// Replays a fixed list of messages, then waits for shutdown.
pub struct ScriptedFeed {
    pub messages: Vec<InboundMessage>,
}

#[async_trait]
impl Feed for ScriptedFeed {
    async fn run(
        &mut self,
        tx: mpsc::Sender<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        for msg in self.messages.drain(..) {
            tx.send(msg).await?;
        }
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

pub fn msg(channel: &str, text: &str) -> InboundMessage {
    InboundMessage::text(channel, text)
}
