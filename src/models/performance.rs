use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::{ChannelId, Trade};

/// Daily per-channel results. Stores treat these as an append-only ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub channel: ChannelId,
    pub trades_taken: u32,
    pub trades_won: u32,
    pub total_pips: Decimal,
    pub total_profit: Decimal,
    pub win_rate: Decimal,
}

impl PerformanceRecord {
    pub fn new(
        date: NaiveDate,
        channel: ChannelId,
        trades_taken: u32,
        trades_won: u32,
        total_pips: Decimal,
        total_profit: Decimal,
    ) -> Self {
        Self {
            date,
            channel,
            trades_taken,
            trades_won,
            total_pips,
            total_profit,
            win_rate: win_rate(trades_taken, trades_won),
        }
    }

    /// Aggregates the trades opened on `date` (in `tz`) for one channel.
    /// A trade counts as won once it is closed with a positive profit.
    pub fn summarize(channel: &ChannelId, date: NaiveDate, tz: Tz, trades: &[Trade]) -> Self {
        let day_trades: Vec<&Trade> = trades
            .iter()
            .filter(|t| &t.channel == channel)
            .filter(|t| {
                let opened = t.opened_at.unwrap_or(t.created_at);
                opened.with_timezone(&tz).date_naive() == date
            })
            .collect();

        let taken = day_trades.len() as u32;
        let won = day_trades.iter().filter(|t| t.is_won()).count() as u32;
        let pips: Decimal = day_trades.iter().map(|t| t.profit_pips).sum();
        let profit: Decimal = day_trades.iter().map(|t| t.profit_amount).sum();

        Self::new(date, channel.clone(), taken, won, pips, profit)
    }
}

fn win_rate(taken: u32, won: u32) -> Decimal {
    if taken == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(won) / Decimal::from(taken) * dec!(100)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeStatus;
    use crate::test_helpers::make_trade;
    use chrono::{TimeZone, Utc};

    #[test]
    fn win_rate_is_zero_without_trades() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rec = PerformanceRecord::new(date, "A".into(), 0, 0, dec!(0), dec!(0));
        assert_eq!(rec.win_rate, Decimal::ZERO);
    }

    #[test]
    fn win_rate_is_percentage() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rec = PerformanceRecord::new(date, "A".into(), 3, 2, dec!(40), dec!(25));
        assert_eq!(rec.win_rate, dec!(66.67));
    }

    #[test]
    fn summarize_counts_only_matching_day_and_channel() {
        let opened = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut win = make_trade("A", 1, opened);
        win.status = TradeStatus::Closed;
        win.profit_pips = dec!(50);
        win.profit_amount = dec!(10);
        let mut loss = make_trade("A", 2, opened);
        loss.status = TradeStatus::Closed;
        loss.profit_pips = dec!(-20);
        loss.profit_amount = dec!(-4);
        let open = make_trade("A", 3, opened);
        let other_channel = make_trade("B", 1, opened);
        let other_day = make_trade("A", 4, opened + chrono::Duration::days(1));

        let trades = vec![win, loss, open, other_channel, other_day];
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rec = PerformanceRecord::summarize(&"A".into(), date, chrono_tz::UTC, &trades);

        assert_eq!(rec.trades_taken, 3);
        assert_eq!(rec.trades_won, 1);
        assert_eq!(rec.total_pips, dec!(30));
        assert_eq!(rec.total_profit, dec!(6));
        assert_eq!(rec.win_rate, dec!(33.33));
    }
}
