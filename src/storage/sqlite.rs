use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{self, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::core::lifecycle::StatusChange;
use crate::models::{Action, ChannelId, PerformanceRecord, Signal, Trade, TradeStatus};
use crate::storage::{StoreError, TradeStore};

const SCHEMA: [&str; 6] = [
    r#"
        CREATE TABLE IF NOT EXISTS trades(
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            trade_id TEXT NOT NULL UNIQUE,
            channel TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            symbol TEXT NOT NULL,
            action TEXT NOT NULL,
            entry_price TEXT NOT NULL,
            sl_price TEXT NOT NULL,
            tp1_price TEXT,
            tp2_price TEXT,
            lot_size TEXT NOT NULL,
            account_currency TEXT NOT NULL,
            account_balance TEXT NOT NULL,
            risk_percent TEXT NOT NULL,
            status TEXT NOT NULL,
            profit_pips TEXT NOT NULL,
            profit_amount TEXT NOT NULL,
            created_at TEXT NOT NULL,
            opened_at TEXT,
            tp1_hit_at TEXT,
            closed_at TEXT
        )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_trades_channel_sequence ON trades(channel, sequence)",
    "CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status)",
    r#"
        CREATE TABLE IF NOT EXISTS signals(
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            channel TEXT NOT NULL,
            message TEXT NOT NULL,
            parsed_data TEXT,
            processed BOOLEAN NOT NULL DEFAULT 0,
            received_at TEXT NOT NULL
        )
    "#,
    r#"
        CREATE TABLE IF NOT EXISTS performance(
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            date TEXT NOT NULL,
            channel TEXT NOT NULL,
            trades_taken INTEGER NOT NULL,
            trades_won INTEGER NOT NULL,
            total_pips TEXT NOT NULL,
            total_profit TEXT NOT NULL,
            win_rate TEXT NOT NULL,
            UNIQUE(date, channel)
        )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_signals_channel ON signals(channel)",
];

const TRADE_COLUMNS: &str = "trade_id, channel, sequence, symbol, action, entry_price, sl_price, \
    tp1_price, tp2_price, lot_size, account_currency, account_balance, risk_percent, status, \
    profit_pips, profit_amount, created_at, opened_at, tp1_hit_at, closed_at";

/// SQLite-backed store. Decimal columns are stored as text so prices and
/// amounts survive a round trip exactly.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url`, e.g.
    /// `sqlite:data/trading.db`, and applies the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if let Some(parent) = url
            .strip_prefix("sqlite:")
            .filter(|p| !p.starts_with(':'))
            .and_then(|p| std::path::Path::new(p.trim_start_matches("//")).parent())
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        info!("Trade store ready at {}", url);
        Ok(store)
    }

    /// Private in-memory database; one connection so every query sees it.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn write_trade_state<'e, E>(executor: E, trade: &Trade) -> Result<(), StoreError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
                UPDATE trades SET
                    status = ?, tp2_price = ?, profit_pips = ?, profit_amount = ?,
                    opened_at = ?, tp1_hit_at = ?, closed_at = ?
                WHERE trade_id = ?
            "#,
        )
        .bind(trade.status.as_str())
        .bind(trade.tp2_price.map(|d| d.to_string()))
        .bind(trade.profit_pips.to_string())
        .bind(trade.profit_amount.to_string())
        .bind(trade.opened_at)
        .bind(trade.tp1_hit_at)
        .bind(trade.closed_at)
        .bind(&trade.trade_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StoreError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| StoreError::Corrupt(format!("{column}={raw:?}: {e}")))
}

fn opt_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Decimal::from_str(&s).map_err(|e| StoreError::Corrupt(format!("{column}={s:?}: {e}")))
    })
    .transpose()
}

fn trade_from_row(row: &SqliteRow) -> Result<Trade, StoreError> {
    let action: String = row.try_get("action")?;
    let status: String = row.try_get("status")?;
    let sequence: i64 = row.try_get("sequence")?;
    let channel: String = row.try_get("channel")?;

    Ok(Trade {
        trade_id: row.try_get("trade_id")?,
        channel: ChannelId::new(channel),
        sequence: u64::try_from(sequence)
            .map_err(|_| StoreError::Corrupt(format!("sequence={sequence}")))?,
        symbol: row.try_get("symbol")?,
        action: Action::from_str(&action).map_err(StoreError::Corrupt)?,
        entry_price: decimal(row, "entry_price")?,
        sl_price: decimal(row, "sl_price")?,
        tp1_price: opt_decimal(row, "tp1_price")?,
        tp2_price: opt_decimal(row, "tp2_price")?,
        lot_size: decimal(row, "lot_size")?,
        account_currency: row.try_get("account_currency")?,
        account_balance: decimal(row, "account_balance")?,
        risk_percent: decimal(row, "risk_percent")?,
        status: TradeStatus::from_str(&status).map_err(StoreError::Corrupt)?,
        profit_pips: decimal(row, "profit_pips")?,
        profit_amount: decimal(row, "profit_amount")?,
        created_at: row.try_get("created_at")?,
        opened_at: row.try_get("opened_at")?,
        tp1_hit_at: row.try_get("tp1_hit_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

fn performance_from_row(row: &SqliteRow) -> Result<PerformanceRecord, StoreError> {
    let channel: String = row.try_get("channel")?;
    let taken: i64 = row.try_get("trades_taken")?;
    let won: i64 = row.try_get("trades_won")?;
    Ok(PerformanceRecord {
        date: row.try_get("date")?,
        channel: ChannelId::new(channel),
        trades_taken: count(taken, "trades_taken")?,
        trades_won: count(won, "trades_won")?,
        total_pips: decimal(row, "total_pips")?,
        total_profit: decimal(row, "total_profit")?,
        win_rate: decimal(row, "win_rate")?,
    })
}

fn count(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column}={value}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl TradeStore for SqliteStore {
    async fn save_trade(&self, trade: &Trade) -> Result<i64, StoreError> {
        let result = sqlx::query(&format!(
            "INSERT INTO trades ({TRADE_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&trade.trade_id)
        .bind(trade.channel.as_str())
        .bind(trade.sequence as i64)
        .bind(&trade.symbol)
        .bind(trade.action.as_str())
        .bind(trade.entry_price.to_string())
        .bind(trade.sl_price.to_string())
        .bind(trade.tp1_price.map(|d| d.to_string()))
        .bind(trade.tp2_price.map(|d| d.to_string()))
        .bind(trade.lot_size.to_string())
        .bind(&trade.account_currency)
        .bind(trade.account_balance.to_string())
        .bind(trade.risk_percent.to_string())
        .bind(trade.status.as_str())
        .bind(trade.profit_pips.to_string())
        .bind(trade.profit_amount.to_string())
        .bind(trade.created_at)
        .bind(trade.opened_at)
        .bind(trade.tp1_hit_at)
        .bind(trade.closed_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::DuplicateTrade(trade.trade_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE trade_id = ?"
        ))
        .bind(trade_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(trade_from_row).transpose()
    }

    async fn update_trade_status(
        &self,
        trade_id: &str,
        status: TradeStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE trade_id = ?"
        ))
        .bind(trade_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::TradeNotFound(trade_id.to_string()))?;

        let mut trade = trade_from_row(&row)?;
        let change = trade.apply_status(status, at);
        if change.is_applied() {
            Self::write_trade_state(&mut *tx, &trade).await?;
        }
        tx.commit().await?;
        Ok(change)
    }

    async fn update_trade_profit(
        &self,
        trade_id: &str,
        pips: Decimal,
        amount: Decimal,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE trade_id = ?"
        ))
        .bind(trade_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::TradeNotFound(trade_id.to_string()))?;

        let mut trade = trade_from_row(&row)?;
        let updated = trade.update_profit(pips, amount);
        if updated {
            Self::write_trade_state(&mut *tx, &trade).await?;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn save_signal(
        &self,
        channel: &ChannelId,
        message: &str,
        parsed: Option<&Signal>,
    ) -> Result<i64, StoreError> {
        let parsed_data = parsed.map(serde_json::to_string).transpose()?;
        let done = sqlx::query(
            r#"
                INSERT INTO signals (channel, message, parsed_data, processed, received_at)
                VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(channel.as_str())
        .bind(message)
        .bind(parsed_data)
        .bind(parsed.is_some())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(done.last_insert_rowid())
    }

    async fn attach_parsed_signal(&self, signal_id: i64, parsed: &Signal) -> Result<(), StoreError> {
        let parsed_data = serde_json::to_string(parsed)?;
        let done = sqlx::query("UPDATE signals SET parsed_data = ?, processed = 1 WHERE id = ?")
            .bind(parsed_data)
            .bind(signal_id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::SignalNotFound(signal_id));
        }
        Ok(())
    }

    async fn get_active_trades(&self) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE status IN ('open', 'tp1_hit') ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(trade_from_row).collect()
    }

    async fn trades_for_channel(&self, channel: &ChannelId) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE channel = ? ORDER BY sequence"
        ))
        .bind(channel.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(trade_from_row).collect()
    }

    async fn record_performance(&self, record: &PerformanceRecord) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
                INSERT INTO performance (
                    date, channel, trades_taken, trades_won, total_pips, total_profit, win_rate
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.date)
        .bind(record.channel.as_str())
        .bind(record.trades_taken as i64)
        .bind(record.trades_won as i64)
        .bind(record.total_pips.to_string())
        .bind(record.total_profit.to_string())
        .bind(record.win_rate.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicatePerformance {
                channel: record.channel.clone(),
                date: record.date,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_performance(
        &self,
        channel: &ChannelId,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, StoreError> {
        let row = sqlx::query(
            r#"
                SELECT date, channel, trades_taken, trades_won, total_pips, total_profit, win_rate
                FROM performance WHERE channel = ? AND date = ?
            "#,
        )
        .bind(channel.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(performance_from_row).transpose()
    }

    async fn last_sequence(&self, channel: &ChannelId) -> Result<u64, StoreError> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(sequence) FROM trades WHERE channel = ?")
            .bind(channel.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(max.unwrap_or(0).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_trade;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn trade_round_trips_exactly() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut trade = make_trade("A", 4, Utc::now());
        trade.tp1_price = None;
        store.save_trade(&trade).await.unwrap();

        let loaded = store.get_trade(&trade.trade_id).await.unwrap().unwrap();
        assert_eq!(loaded.entry_price, dec!(1.1050));
        assert_eq!(loaded.tp1_price, None);
        assert_eq!(loaded.lot_size, trade.lot_size);
        assert_eq!(loaded.sequence, 4);
        assert_eq!(loaded.status, TradeStatus::Open);
        assert_eq!(loaded.created_at, trade.created_at);
        assert!(store.get_trade("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_trade_id_is_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        let trade = make_trade("A", 1, Utc::now());
        store.save_trade(&trade).await.unwrap();
        let err = store.save_trade(&trade).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTrade(id) if id == trade.trade_id));
    }

    #[tokio::test]
    async fn lifecycle_is_enforced_in_storage() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        let trade = make_trade("B", 1, now);
        store.save_trade(&trade).await.unwrap();

        let change = store
            .update_trade_status(&trade.trade_id, TradeStatus::Tp1Hit, now + Duration::minutes(3))
            .await
            .unwrap();
        assert!(change.is_applied());
        assert_eq!(store.get_active_trades().await.unwrap().len(), 1);

        let reloaded = store.get_trade(&trade.trade_id).await.unwrap().unwrap();
        assert_eq!(reloaded.tp2_price, Some(reloaded.entry_price));

        store
            .update_trade_profit(&trade.trade_id, dec!(50), dec!(10))
            .await
            .unwrap();
        store
            .update_trade_status(&trade.trade_id, TradeStatus::Closed, now + Duration::minutes(9))
            .await
            .unwrap();
        assert!(store.get_active_trades().await.unwrap().is_empty());

        assert!(!store
            .update_trade_profit(&trade.trade_id, dec!(1), dec!(1))
            .await
            .unwrap());
        let change = store
            .update_trade_status(&trade.trade_id, TradeStatus::Open, now)
            .await
            .unwrap();
        assert!(!change.is_applied());

        let closed = store.get_trade(&trade.trade_id).await.unwrap().unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.profit_amount, dec!(10));
        assert!(closed.is_won());
    }

    #[tokio::test]
    async fn signals_keep_raw_text_and_parsed_form() {
        let store = SqliteStore::in_memory().await.unwrap();
        let channel: ChannelId = "A".into();
        let id = store
            .save_signal(&channel, "EURUSD BUY 1.1050 SL 1.1000", None)
            .await
            .unwrap();
        let signal = Signal {
            channel: channel.clone(),
            symbol: "EURUSD".to_string(),
            action: Action::Buy,
            entry: dec!(1.1050),
            sl: dec!(1.1000),
            take_profits: vec![],
        };
        store.attach_parsed_signal(id, &signal).await.unwrap();

        let (parsed, processed): (Option<String>, bool) =
            sqlx::query_as("SELECT parsed_data, processed FROM signals WHERE id = ?")
                .bind(id)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert!(processed);
        let parsed: Signal = serde_json::from_str(&parsed.unwrap()).unwrap();
        assert_eq!(parsed, signal);

        let err = store.attach_parsed_signal(id + 100, &signal).await.unwrap_err();
        assert!(matches!(err, StoreError::SignalNotFound(_)));
    }

    #[tokio::test]
    async fn performance_unique_per_channel_and_day() {
        let store = SqliteStore::in_memory().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rec = PerformanceRecord::new(date, "A".into(), 4, 3, dec!(120.5), dec!(24.10));
        store.record_performance(&rec).await.unwrap();

        let other = PerformanceRecord::new(date, "B".into(), 1, 0, dec!(-20), dec!(-4));
        store.record_performance(&other).await.unwrap();

        let err = store.record_performance(&rec).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePerformance { .. }));

        let loaded = store.get_performance(&"A".into(), date).await.unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert_eq!(loaded.win_rate, dec!(75.00));
    }

    #[tokio::test]
    async fn out_of_range_counts_are_corrupt() {
        let store = SqliteStore::in_memory().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        for (channel, taken) in [("A", -1_i64), ("B", i64::from(u32::MAX) + 1)] {
            sqlx::query(
                "INSERT INTO performance (
                    date, channel, trades_taken, trades_won, total_pips, total_profit, win_rate
                ) VALUES (?, ?, ?, 0, '0', '0', '0')",
            )
            .bind(date)
            .bind(channel)
            .bind(taken)
            .execute(&store.pool)
            .await
            .unwrap();

            let err = store.get_performance(&channel.into(), date).await.unwrap_err();
            assert!(matches!(err, StoreError::Corrupt(_)), "{channel}: {err:?}");
        }
    }

    #[tokio::test]
    async fn last_sequence_tracks_each_channel() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = Utc::now();
        assert_eq!(store.last_sequence(&"A".into()).await.unwrap(), 0);
        store.save_trade(&make_trade("A", 1, now)).await.unwrap();
        store.save_trade(&make_trade("A", 2, now)).await.unwrap();
        store.save_trade(&make_trade("B", 9, now)).await.unwrap();
        assert_eq!(store.last_sequence(&"A".into()).await.unwrap(), 2);
        assert_eq!(store.last_sequence(&"B".into()).await.unwrap(), 9);

        let a = store.trades_for_channel(&"A".into()).await.unwrap();
        assert_eq!(a.iter().map(|t| t.sequence).collect::<Vec<_>>(), vec![1, 2]);
    }
}
