pub mod runtime;

pub use runtime::{spawn_workers, Workers};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::SharedConfig;
use crate::core::{
    trade_id, ParseFailure, PositionSizer, SignalClassifier, SignalParser, SizingFailure,
    SizingRequest,
};
use crate::models::{AccountSnapshot, ChannelId, InboundMessage, Trade, TradeStatus};
use crate::notify::Notifier;
use crate::storage::{StoreError, TradeStore};

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Not classified as a signal.
    Ignored,
    /// Photo without caption.
    ImageSkipped,
    /// Channel is not configured (or disabled).
    UnknownChannel,
    Rejected(ParseFailure),
    Unsized(SizingFailure),
    Created(Trade),
    /// Announced, but the store rejected it. The id stays consumed.
    Unpersisted(Trade),
}

impl Outcome {
    pub fn trade(&self) -> Option<&Trade> {
        match self {
            Outcome::Created(trade) | Outcome::Unpersisted(trade) => Some(trade),
            _ => None,
        }
    }
}

/// Turns channel messages into persisted, notified trade setups.
///
/// Each configured channel owns a sequence counter behind its own lock. The
/// lock is held for the whole of [`process`](Self::process), so ids on one
/// channel follow message arrival order while channels proceed in parallel.
pub struct SignalPipeline {
    store: Arc<dyn TradeStore>,
    notifier: Arc<dyn Notifier>,
    config: SharedConfig,
    classifier: SignalClassifier,
    parser: SignalParser,
    sizer: PositionSizer,
    counters: HashMap<ChannelId, Mutex<u64>>,
}

impl SignalPipeline {
    pub async fn new(
        store: Arc<dyn TradeStore>,
        notifier: Arc<dyn Notifier>,
        config: SharedConfig,
    ) -> Self {
        let cfg = config.read().await;
        let instruments = cfg.instrument_table();
        let classifier = SignalClassifier::new(&instruments, &cfg.trading.extra_keywords);
        let parser = SignalParser::new(instruments.clone());
        let sizer = PositionSizer::new(
            instruments,
            cfg.trading.conversion_rates.clone(),
            cfg.trading.lot_step,
        );
        let counters = cfg
            .enabled_channels()
            .map(|c| (c.id.clone(), Mutex::new(0)))
            .collect();
        drop(cfg);

        Self {
            store,
            notifier,
            config,
            classifier,
            parser,
            sizer,
            counters,
        }
    }

    /// Resumes each channel counter from the highest persisted sequence so
    /// ids are never reused across restarts.
    pub async fn seed_counters(&self) -> Result<(), StoreError> {
        for (channel, counter) in &self.counters {
            let last = self.store.last_sequence(channel).await?;
            let mut counter = counter.lock().await;
            *counter = (*counter).max(last);
            info!("Channel {} resumes after sequence {}", channel, *counter);
        }
        Ok(())
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.counters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn counter(&self, channel: &ChannelId) -> Option<u64> {
        match self.counters.get(channel) {
            Some(counter) => Some(*counter.lock().await),
            None => None,
        }
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    pub async fn process(&self, msg: &InboundMessage) -> Outcome {
        let Some(counter) = self.counters.get(&msg.channel) else {
            warn!("Message from unconfigured channel {}", msg.channel);
            return Outcome::UnknownChannel;
        };
        let mut counter = counter.lock().await;
        let channel = &msg.channel;

        if msg.is_image_only() {
            info!("Image post from channel {} skipped (no text)", channel);
            return Outcome::ImageSkipped;
        }

        if !self.classifier.is_signal(&msg.text) {
            debug!("Channel {}: not a signal", channel);
            return Outcome::Ignored;
        }
        info!("Signal from channel {}: {}", channel, preview(&msg.text));

        let audit_id = match self.store.save_signal(channel, &msg.text, None).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to save raw signal from channel {}: {}", channel, e);
                None
            }
        };

        let signal = match self.parser.parse(channel, &msg.text) {
            Ok(signal) => signal,
            Err(failure) => {
                warn!("Could not parse signal from channel {}: {}", channel, failure);
                return Outcome::Rejected(failure);
            }
        };

        let (account, tz) = {
            let cfg = self.config.read().await;
            (
                AccountSnapshot {
                    balance: cfg.trading.account_balance,
                    currency: cfg.trading.account_currency.clone(),
                    risk_percent: cfg.trading.risk_percentage,
                },
                cfg.report_tz(),
            )
        };

        let lot_size = match self.sizer.size(&SizingRequest {
            balance: account.balance,
            risk_percent: account.risk_percent,
            entry: signal.entry,
            sl: signal.sl,
            symbol: &signal.symbol,
            account_currency: &account.currency,
        }) {
            Ok(lots) => lots,
            Err(failure) => {
                warn!(
                    "Channel {}: cannot size {} {}: {}",
                    channel, signal.action, signal.symbol, failure
                );
                return Outcome::Unsized(failure);
            }
        };

        *counter += 1;
        let sequence = *counter;
        let now = Utc::now();
        let id = trade_id::generate(channel, now.with_timezone(&tz).date_naive(), sequence);

        let mut trade = Trade::pending(id, sequence, &signal, lot_size, account, now);
        trade.apply_status(TradeStatus::Open, now);

        let persisted = match self.store.save_trade(&trade).await {
            Ok(_) => true,
            Err(e) => {
                error!(
                    "Failed to persist trade {}: {}. Id {} is announced but has no row",
                    trade.trade_id, e, trade.trade_id
                );
                false
            }
        };
        if let Some(audit_id) = audit_id {
            if let Err(e) = self.store.attach_parsed_signal(audit_id, &signal).await {
                warn!("Failed to attach parsed signal {}: {}", audit_id, e);
            }
        }
        if let Err(e) = self.notifier.send_trade_setup(&trade).await {
            error!("Failed to send setup for {}: {}", trade.trade_id, e);
        }

        info!(
            "Trade setup created: {} {} {} @ {} SL {} ({} lots)",
            trade.trade_id, trade.action, trade.symbol, trade.entry_price, trade.sl_price, trade.lot_size
        );
        if persisted {
            Outcome::Created(trade)
        } else {
            Outcome::Unpersisted(trade)
        }
    }
}

fn preview(text: &str) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() > 100 {
        format!("{}...", line.chars().take(100).collect::<String>())
    } else {
        line
    }
}
