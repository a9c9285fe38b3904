use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
        }
    }

    /// Maps a directional word to an action. Accepts the usual channel synonyms.
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "BUY" | "LONG" => Some(Action::Buy),
            "SELL" | "SHORT" => Some(Action::Sell),
            _ => None,
        }
    }

    /// Signed price move in this action's favour.
    pub fn favourable_move(self, entry: Decimal, price: Decimal) -> Decimal {
        match self {
            Action::Buy => price - entry,
            Action::Sell => entry - price,
        }
    }

    /// True when `price` lies strictly on the losing side of `entry`.
    pub fn is_losing_side(self, entry: Decimal, price: Decimal) -> bool {
        self.favourable_move(entry, price) < Decimal::ZERO
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::from_word(&s.trim().to_uppercase()).ok_or_else(|| format!("unknown action: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Open,
    Tp1Hit,
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Open => "open",
            TradeStatus::Tp1Hit => "tp1_hit",
            TradeStatus::Closed => "closed",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TradeStatus::Open | TradeStatus::Tp1Hit)
    }

    pub fn is_terminal(&self) -> bool {
        *self == TradeStatus::Closed
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TradeStatus::Pending),
            "open" => Ok(TradeStatus::Open),
            "tp1_hit" | "tp1hit" | "tp1" => Ok(TradeStatus::Tp1Hit),
            "closed" => Ok(TradeStatus::Closed),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}
