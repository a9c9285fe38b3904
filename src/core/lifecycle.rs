use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Trade, TradeStatus};

/// Result of asking a trade to move to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChange {
    Applied { from: TradeStatus, to: TradeStatus },
    /// Not a forward transition (including anything on a closed trade).
    Ignored {
        current: TradeStatus,
        requested: TradeStatus,
    },
}

impl StatusChange {
    pub fn is_applied(&self) -> bool {
        matches!(self, StatusChange::Applied { .. })
    }
}

/// Forward edges of the lifecycle graph.
pub fn can_transition(from: TradeStatus, to: TradeStatus) -> bool {
    use TradeStatus::*;
    matches!(
        (from, to),
        (Pending, Open) | (Open, Tp1Hit) | (Open, Closed) | (Tp1Hit, Closed)
    )
}

impl Trade {
    /// Moves the trade to `next` if the lifecycle allows it, stamping the
    /// matching timestamp. Reaching TP1 moves the second target to the entry.
    pub fn apply_status(&mut self, next: TradeStatus, at: DateTime<Utc>) -> StatusChange {
        let current = self.status;
        if !can_transition(current, next) {
            return StatusChange::Ignored {
                current,
                requested: next,
            };
        }

        // Timestamps never run backwards even if the caller's clock does.
        let at = [self.opened_at, self.tp1_hit_at]
            .into_iter()
            .flatten()
            .fold(at.max(self.created_at), |acc, t| acc.max(t));

        match next {
            TradeStatus::Open => {
                self.opened_at.get_or_insert(at);
            }
            TradeStatus::Tp1Hit => {
                self.tp1_hit_at.get_or_insert(at);
                self.tp2_price = Some(self.entry_price);
            }
            TradeStatus::Closed => {
                self.closed_at.get_or_insert(at);
            }
            TradeStatus::Pending => {}
        }
        self.status = next;

        StatusChange::Applied {
            from: current,
            to: next,
        }
    }

    /// Returns false, leaving the trade untouched, once it is closed.
    pub fn update_profit(&mut self, pips: Decimal, amount: Decimal) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.profit_pips = pips;
        self.profit_amount = amount;
        true
    }
}
