use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::core::lifecycle::StatusChange;
use crate::models::{ChannelId, PerformanceRecord, Signal, Trade, TradeStatus};
use crate::storage::{StoreError, TradeStore};

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub id: i64,
    pub channel: ChannelId,
    pub message: String,
    pub parsed: Option<Signal>,
    pub processed: bool,
}

#[derive(Default)]
struct Inner {
    trades: Vec<Trade>,
    signals: Vec<SignalRow>,
    performance: Vec<PerformanceRecord>,
}

/// Process-local store. Same semantics as the SQLite store, nothing survives
/// a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn signals(&self) -> Vec<SignalRow> {
        self.inner.lock().await.signals.clone()
    }

    pub async fn trades(&self) -> Vec<Trade> {
        self.inner.lock().await.trades.clone()
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn save_trade(&self, trade: &Trade) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.trades.iter().any(|t| t.trade_id == trade.trade_id) {
            return Err(StoreError::DuplicateTrade(trade.trade_id.clone()));
        }
        inner.trades.push(trade.clone());
        Ok(inner.trades.len() as i64)
    }

    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.trades.iter().find(|t| t.trade_id == trade_id).cloned())
    }

    async fn update_trade_status(
        &self,
        trade_id: &str,
        status: TradeStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, StoreError> {
        let mut inner = self.inner.lock().await;
        let trade = inner
            .trades
            .iter_mut()
            .find(|t| t.trade_id == trade_id)
            .ok_or_else(|| StoreError::TradeNotFound(trade_id.to_string()))?;
        Ok(trade.apply_status(status, at))
    }

    async fn update_trade_profit(
        &self,
        trade_id: &str,
        pips: Decimal,
        amount: Decimal,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let trade = inner
            .trades
            .iter_mut()
            .find(|t| t.trade_id == trade_id)
            .ok_or_else(|| StoreError::TradeNotFound(trade_id.to_string()))?;
        Ok(trade.update_profit(pips, amount))
    }

    async fn save_signal(
        &self,
        channel: &ChannelId,
        message: &str,
        parsed: Option<&Signal>,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.signals.len() as i64 + 1;
        inner.signals.push(SignalRow {
            id,
            channel: channel.clone(),
            message: message.to_string(),
            parsed: parsed.cloned(),
            processed: parsed.is_some(),
        });
        Ok(id)
    }

    async fn attach_parsed_signal(&self, signal_id: i64, parsed: &Signal) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .signals
            .iter_mut()
            .find(|r| r.id == signal_id)
            .ok_or(StoreError::SignalNotFound(signal_id))?;
        row.parsed = Some(parsed.clone());
        row.processed = true;
        Ok(())
    }

    async fn get_active_trades(&self) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .trades
            .iter()
            .filter(|t| t.status.is_active())
            .cloned()
            .collect())
    }

    async fn trades_for_channel(&self, channel: &ChannelId) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .trades
            .iter()
            .filter(|t| &t.channel == channel)
            .cloned()
            .collect())
    }

    async fn record_performance(&self, record: &PerformanceRecord) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .performance
            .iter()
            .any(|p| p.channel == record.channel && p.date == record.date)
        {
            return Err(StoreError::DuplicatePerformance {
                channel: record.channel.clone(),
                date: record.date,
            });
        }
        inner.performance.push(record.clone());
        Ok(inner.performance.len() as i64)
    }

    async fn get_performance(
        &self,
        channel: &ChannelId,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .performance
            .iter()
            .find(|p| &p.channel == channel && p.date == date)
            .cloned())
    }

    async fn last_sequence(&self, channel: &ChannelId) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .trades
            .iter()
            .filter(|t| &t.channel == channel)
            .map(|t| t.sequence)
            .max()
            .unwrap_or(0))
    }
}
