pub mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::Trade;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers trade setups to the operator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_trade_setup(&self, trade: &Trade) -> Result<(), NotifyError>;
}

/// Writes setups to the log; used when no bot token is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_trade_setup(&self, trade: &Trade) -> Result<(), NotifyError> {
        info!("Trade setup\n{}", format_trade_setup(trade));
        Ok(())
    }
}

pub fn format_trade_setup(trade: &Trade) -> String {
    let level = |price: Option<rust_decimal::Decimal>| {
        price.map_or_else(|| "-".to_string(), |p| p.normalize().to_string())
    };

    format!(
        "NEW TRADE SETUP {id}\n\
         Channel: {channel}\n\
         {action} {symbol}\n\
         Entry: {entry}\n\
         Stop loss: {sl}\n\
         TP1: {tp1}\n\
         TP2: {tp2}\n\
         Lot size: {lot}\n\
         Risk: {risk}% of {balance} {currency}",
        id = trade.trade_id,
        channel = trade.channel,
        action = trade.action,
        symbol = trade.symbol,
        entry = trade.entry_price.normalize(),
        sl = trade.sl_price.normalize(),
        tp1 = level(trade.tp1_price),
        tp2 = level(trade.tp2_price),
        lot = trade.lot_size,
        risk = trade.risk_percent.normalize(),
        balance = trade.account_balance.round_dp(2),
        currency = trade.account_currency,
    )
}
