use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Action, ChannelId};

/// A trade idea extracted from one channel message.
///
/// Only the parser builds these, so `entry != sl` and the stop sits on the
/// losing side of the entry for the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub channel: ChannelId,
    pub symbol: String,
    pub action: Action,
    pub entry: Decimal,
    pub sl: Decimal,
    #[serde(default)]
    pub take_profits: Vec<Decimal>,
}

impl Signal {
    pub fn tp1(&self) -> Option<Decimal> {
        self.take_profits.first().copied()
    }

    pub fn tp2(&self) -> Option<Decimal> {
        self.take_profits.get(1).copied()
    }

    pub fn stop_distance(&self) -> Decimal {
        (self.entry - self.sl).abs()
    }
}
