use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::instruments::InstrumentTable;
use crate::models::Trade;

pub const DEFAULT_LOT_STEP: Decimal = dec!(0.01);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingFailure {
    #[error("stop distance is zero pips")]
    ZeroStopDistance,
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("no conversion rate from {from} to {to}")]
    MissingConversionRate { from: String, to: String },
    #[error("balance and risk must be positive")]
    InvalidRisk,
    #[error("signal too small to trade: {computed} lots is below the {step} step")]
    BelowMinimumLot { computed: Decimal, step: Decimal },
}

/// Inputs for one sizing decision.
#[derive(Debug, Clone)]
pub struct SizingRequest<'a> {
    pub balance: Decimal,
    pub risk_percent: Decimal,
    pub entry: Decimal,
    pub sl: Decimal,
    pub symbol: &'a str,
    pub account_currency: &'a str,
}

/// Converts a risk budget into a lot size.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    instruments: InstrumentTable,
    rates: HashMap<String, Decimal>,
    lot_step: Decimal,
}

impl PositionSizer {
    pub fn new(instruments: InstrumentTable, rates: HashMap<String, Decimal>, lot_step: Decimal) -> Self {
        let lot_step = if lot_step > Decimal::ZERO {
            lot_step
        } else {
            DEFAULT_LOT_STEP
        };
        Self {
            instruments,
            rates,
            lot_step,
        }
    }

    pub fn instruments(&self) -> &InstrumentTable {
        &self.instruments
    }

    pub fn lot_step(&self) -> Decimal {
        self.lot_step
    }

    pub fn size(&self, req: &SizingRequest<'_>) -> Result<Decimal, SizingFailure> {
        if req.balance <= Decimal::ZERO || req.risk_percent <= Decimal::ZERO {
            return Err(SizingFailure::InvalidRisk);
        }

        let spec = self
            .instruments
            .get(req.symbol)
            .ok_or_else(|| SizingFailure::UnknownInstrument(req.symbol.to_string()))?;

        let risk_amount = req.balance * req.risk_percent / dec!(100);
        let stop_pips = spec.pips((req.entry - req.sl).abs());
        if stop_pips <= Decimal::ZERO {
            return Err(SizingFailure::ZeroStopDistance);
        }

        let pip_value = self.instruments.pip_value_per_lot(
            req.symbol,
            req.account_currency,
            req.entry,
            &self.rates,
        )?;

        let raw = risk_amount / (stop_pips * pip_value);
        let lots = floor_to_step(raw, self.lot_step);
        if lots <= Decimal::ZERO {
            return Err(SizingFailure::BelowMinimumLot {
                computed: raw.round_dp(6),
                step: self.lot_step,
            });
        }

        Ok(lots)
    }

    /// Realised pips and account-currency amount if `trade` exits at `exit_price`.
    /// Both are signed: positive in the trade's favour.
    pub fn profit_at(&self, trade: &Trade, exit_price: Decimal) -> Result<(Decimal, Decimal), SizingFailure> {
        let spec = self
            .instruments
            .get(&trade.symbol)
            .ok_or_else(|| SizingFailure::UnknownInstrument(trade.symbol.clone()))?;

        let pips = spec.pips(trade.action.favourable_move(trade.entry_price, exit_price));
        let pip_value = self.instruments.pip_value_per_lot(
            &trade.symbol,
            &trade.account_currency,
            exit_price,
            &self.rates,
        )?;
        let amount = pips * pip_value * trade.lot_size;

        Ok((pips.round_dp(1), amount.round_dp(2)))
    }
}

fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    let steps = (value / step).round_dp_with_strategy(0, RoundingStrategy::ToNegativeInfinity);
    (steps * step).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, TradeStatus};
    use crate::test_helpers::make_trade;
    use chrono::Utc;

    fn sizer() -> PositionSizer {
        PositionSizer::new(InstrumentTable::default(), HashMap::new(), DEFAULT_LOT_STEP)
    }

    fn request<'a>(entry: Decimal, sl: Decimal, symbol: &'a str) -> SizingRequest<'a> {
        SizingRequest {
            balance: dec!(1000),
            risk_percent: dec!(1),
            entry,
            sl,
            symbol,
            account_currency: "USD",
        }
    }

    #[test]
    fn eurusd_fifty_pip_stop() {
        // 1% of 1000 = 10 USD, 50 pips at 10 USD/pip => 0.02 lots
        let lots = sizer().size(&request(dec!(1.1050), dec!(1.1000), "EURUSD")).unwrap();
        assert_eq!(lots, dec!(0.02));
    }

    #[test]
    fn rounds_down_never_up() {
        // 10 / (30 * 10) = 0.0333.. => 0.03
        let lots = sizer().size(&request(dec!(1.1030), dec!(1.1000), "EURUSD")).unwrap();
        assert_eq!(lots, dec!(0.03));

        let mut req = request(dec!(1.1030), dec!(1.1000), "EURUSD");
        req.balance = dec!(1999);
        // 19.99 / 300 = 0.0666 => 0.06
        assert_eq!(sizer().size(&req).unwrap(), dec!(0.06));
    }

    #[test]
    fn gold_uses_metal_pip() {
        // 2350 -> 2340 = 100 pips of 0.1, 10 USD per pip per lot => 10 / 1000 = 0.01
        let lots = sizer().size(&request(dec!(2350), dec!(2340), "XAUUSD")).unwrap();
        assert_eq!(lots, dec!(0.01));
    }

    #[test]
    fn identical_inputs_give_identical_lots() {
        let s = sizer();
        let req = request(dec!(1.2710), dec!(1.2655), "GBPUSD");
        assert_eq!(s.size(&req).unwrap(), s.size(&req).unwrap());
    }

    #[test]
    fn zero_stop_distance_fails() {
        let err = sizer().size(&request(dec!(1.1), dec!(1.1), "EURUSD")).unwrap_err();
        assert_eq!(err, SizingFailure::ZeroStopDistance);
    }

    #[test]
    fn unknown_instrument_fails() {
        let err = sizer().size(&request(dec!(10), dec!(9), "ABCXYZ")).unwrap_err();
        assert_eq!(err, SizingFailure::UnknownInstrument("ABCXYZ".to_string()));
    }

    #[test]
    fn too_small_is_flagged_not_zero() {
        // 10 / (5000 pips * 10) is far below one step
        let err = sizer().size(&request(dec!(1.6), dec!(1.1), "EURUSD")).unwrap_err();
        assert!(matches!(err, SizingFailure::BelowMinimumLot { .. }));
    }

    #[test]
    fn non_positive_risk_fails() {
        let mut req = request(dec!(1.1050), dec!(1.1000), "EURUSD");
        req.risk_percent = dec!(0);
        assert_eq!(sizer().size(&req).unwrap_err(), SizingFailure::InvalidRisk);
    }

    #[test]
    fn profit_is_signed_by_direction() {
        let s = sizer();
        let mut trade = make_trade("A", 1, Utc::now());
        trade.lot_size = dec!(0.10);
        assert_eq!(trade.action, Action::Buy);
        assert_eq!(trade.status, TradeStatus::Open);

        let (pips, amount) = s.profit_at(&trade, dec!(1.1100)).unwrap();
        assert_eq!(pips, dec!(50));
        assert_eq!(amount, dec!(50));

        trade.action = Action::Sell;
        let (pips, amount) = s.profit_at(&trade, dec!(1.1100)).unwrap();
        assert_eq!(pips, dec!(-50));
        assert_eq!(amount, dec!(-50));
    }
}
