use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;

use crate::config::Config;
use crate::core::trade_id;
use crate::models::{Action, ChannelId, Trade, TradeStatus};

/// A Config suitable for testing: two channels, $1000 USD account, 1% risk,
/// in-memory database, no bot token.
pub fn default_test_config() -> Config {
    let mut cfg = Config::default();
    cfg.telegram.bot_token = String::new();
    cfg.system.environment = "test".to_string();
    cfg.system.database_url = "sqlite::memory:".to_string();
    cfg.system.queue_capacity = 16;
    cfg.trading.account_balance = dec!(1000);
    cfg.trading.account_currency = "USD".to_string();
    cfg.trading.risk_percentage = dec!(1);
    cfg
}

/// Open EURUSD BUY at 1.1050, SL 1.1000, TP1 1.1100, TP2 1.1150, 0.02 lots.
pub fn make_trade(channel: &str, sequence: u64, opened: DateTime<Utc>) -> Trade {
    let channel = ChannelId::new(channel);
    Trade {
        trade_id: trade_id::generate(&channel, opened.date_naive(), sequence),
        channel,
        sequence,
        symbol: "EURUSD".to_string(),
        action: Action::Buy,
        entry_price: dec!(1.1050),
        sl_price: dec!(1.1000),
        tp1_price: Some(dec!(1.1100)),
        tp2_price: Some(dec!(1.1150)),
        lot_size: dec!(0.02),
        account_currency: "USD".to_string(),
        account_balance: dec!(1000),
        risk_percent: dec!(1),
        status: TradeStatus::Open,
        profit_pips: dec!(0),
        profit_amount: dec!(0),
        created_at: opened,
        opened_at: Some(opened),
        tp1_hit_at: None,
        closed_at: None,
    }
}
