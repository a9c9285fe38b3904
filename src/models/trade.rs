use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Action, ChannelId, Signal, TradeStatus};

/// Account figures captured when a trade is created. Later configuration
/// changes never touch trades that already exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub currency: String,
    pub risk_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub channel: ChannelId,
    pub sequence: u64,
    pub symbol: String,
    pub action: Action,
    pub entry_price: Decimal,
    pub sl_price: Decimal,
    pub tp1_price: Option<Decimal>,
    pub tp2_price: Option<Decimal>,
    pub lot_size: Decimal,
    pub account_currency: String,
    pub account_balance: Decimal,
    pub risk_percent: Decimal,
    pub status: TradeStatus,
    #[serde(default)]
    pub profit_pips: Decimal,
    #[serde(default)]
    pub profit_amount: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tp1_hit_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// Builds a `Pending` trade from an accepted, sized signal.
    pub fn pending(
        trade_id: String,
        sequence: u64,
        signal: &Signal,
        lot_size: Decimal,
        account: AccountSnapshot,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trade_id,
            channel: signal.channel.clone(),
            sequence,
            symbol: signal.symbol.clone(),
            action: signal.action,
            entry_price: signal.entry,
            sl_price: signal.sl,
            tp1_price: signal.tp1(),
            tp2_price: signal.tp2(),
            lot_size,
            account_currency: account.currency,
            account_balance: account.balance,
            risk_percent: account.risk_percent,
            status: TradeStatus::Pending,
            profit_pips: Decimal::ZERO,
            profit_amount: Decimal::ZERO,
            created_at,
            opened_at: None,
            tp1_hit_at: None,
            closed_at: None,
        }
    }

    pub fn is_won(&self) -> bool {
        self.status.is_terminal() && self.profit_amount > Decimal::ZERO
    }
}
