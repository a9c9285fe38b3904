pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::lifecycle::StatusChange;
use crate::models::{ChannelId, PerformanceRecord, Signal, Trade, TradeStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trade {0} already exists")]
    DuplicateTrade(String),
    #[error("trade {0} not found")]
    TradeNotFound(String),
    #[error("signal {0} not found")]
    SignalNotFound(i64),
    #[error("performance for channel {channel} on {date} already recorded")]
    DuplicatePerformance { channel: ChannelId, date: NaiveDate },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable home of trades, raw signals and the performance ledger.
///
/// Status and profit updates go through the trade lifecycle, so a store never
/// reopens a closed trade or changes its profit.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Returns the row id of the new trade.
    async fn save_trade(&self, trade: &Trade) -> Result<i64, StoreError>;

    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError>;

    async fn update_trade_status(
        &self,
        trade_id: &str,
        status: TradeStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, StoreError>;

    /// Returns false when the trade is already closed.
    async fn update_trade_profit(
        &self,
        trade_id: &str,
        pips: Decimal,
        amount: Decimal,
    ) -> Result<bool, StoreError>;

    /// Audit row for a classified message; returns its id.
    async fn save_signal(
        &self,
        channel: &ChannelId,
        message: &str,
        parsed: Option<&Signal>,
    ) -> Result<i64, StoreError>;

    /// Attaches the parsed form to an audit row and marks it processed.
    async fn attach_parsed_signal(&self, signal_id: i64, parsed: &Signal) -> Result<(), StoreError>;

    /// Trades in `Open` or `Tp1Hit`.
    async fn get_active_trades(&self) -> Result<Vec<Trade>, StoreError>;

    async fn trades_for_channel(&self, channel: &ChannelId) -> Result<Vec<Trade>, StoreError>;

    async fn record_performance(&self, record: &PerformanceRecord) -> Result<i64, StoreError>;

    async fn get_performance(
        &self,
        channel: &ChannelId,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, StoreError>;

    /// Highest trade sequence persisted for `channel`, 0 when none.
    async fn last_sequence(&self, channel: &ChannelId) -> Result<u64, StoreError>;
}
