use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::core::sizing::SizingFailure;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInstrument {
    #[error("{0}: pip size must be positive")]
    PipSize(String),
    #[error("{0}: contract size must be positive")]
    ContractSize(String),
    #[error("{symbol}: price band {min}..{max} is empty")]
    PriceBand {
        symbol: String,
        min: Decimal,
        max: Decimal,
    },
}

/// Pip and contract semantics for one tradable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub symbol: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub base: String,
    pub quote: String,
    pub pip_size: Decimal,
    /// Units of `base` in one standard lot.
    pub contract_size: Decimal,
    /// Plausible price band; numbers outside it are never read as prices.
    pub min_price: Decimal,
    pub max_price: Decimal,
}

impl InstrumentSpec {
    #[allow(clippy::too_many_arguments)]
    fn row(
        symbol: &str,
        aliases: &[&str],
        base: &str,
        quote: &str,
        pip_size: Decimal,
        contract_size: Decimal,
        min_price: Decimal,
        max_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            base: base.to_string(),
            quote: quote.to_string(),
            pip_size,
            contract_size,
            min_price,
            max_price,
        }
    }

    fn forex(symbol: &str, pip_size: Decimal, min_price: Decimal, max_price: Decimal) -> Self {
        let (base, quote) = symbol.split_at(3);
        Self::row(symbol, &[], base, quote, pip_size, dec!(100000), min_price, max_price)
    }

    /// Rows that would make pip or lot arithmetic divide by zero are rejected.
    pub fn validate(&self) -> Result<(), InvalidInstrument> {
        if self.pip_size <= Decimal::ZERO {
            return Err(InvalidInstrument::PipSize(self.symbol.clone()));
        }
        if self.contract_size <= Decimal::ZERO {
            return Err(InvalidInstrument::ContractSize(self.symbol.clone()));
        }
        if self.min_price > self.max_price {
            return Err(InvalidInstrument::PriceBand {
                symbol: self.symbol.clone(),
                min: self.min_price,
                max: self.max_price,
            });
        }
        Ok(())
    }

    pub fn is_plausible_price(&self, price: Decimal) -> bool {
        price >= self.min_price && price <= self.max_price
    }

    pub fn pips(&self, distance: Decimal) -> Decimal {
        distance / self.pip_size
    }

    /// Value of a one-pip move on one lot, in the quote currency.
    pub fn pip_value_in_quote(&self) -> Decimal {
        self.pip_size * self.contract_size
    }
}

/// Instrument vocabulary shared by the classifier, parser and sizer.
#[derive(Debug, Clone)]
pub struct InstrumentTable {
    specs: Vec<InstrumentSpec>,
}

impl Default for InstrumentTable {
    fn default() -> Self {
        let mut specs = Vec::new();

        for symbol in ["EURUSD", "GBPUSD", "AUDUSD", "NZDUSD", "USDCAD", "USDCHF"] {
            specs.push(InstrumentSpec::forex(symbol, dec!(0.0001), dec!(0.1), dec!(5)));
        }
        for symbol in ["EURGBP", "EURAUD", "GBPAUD", "EURCHF"] {
            specs.push(InstrumentSpec::forex(symbol, dec!(0.0001), dec!(0.1), dec!(5)));
        }
        for symbol in ["USDJPY", "EURJPY", "GBPJPY", "AUDJPY", "CADJPY", "CHFJPY"] {
            specs.push(InstrumentSpec::forex(symbol, dec!(0.01), dec!(50), dec!(300)));
        }

        specs.push(InstrumentSpec::row(
            "XAUUSD",
            &["GOLD"],
            "XAU",
            "USD",
            dec!(0.1),
            dec!(100),
            dec!(500),
            dec!(10000),
        ));
        specs.push(InstrumentSpec::row(
            "XAGUSD",
            &["SILVER"],
            "XAG",
            "USD",
            dec!(0.01),
            dec!(5000),
            dec!(5),
            dec!(200),
        ));
        specs.push(InstrumentSpec::row(
            "US30",
            &["DOW", "DJ30"],
            "US30",
            "USD",
            dec!(1),
            dec!(1),
            dec!(10000),
            dec!(100000),
        ));
        specs.push(InstrumentSpec::row(
            "NAS100",
            &["NASDAQ", "USTEC"],
            "NAS100",
            "USD",
            dec!(1),
            dec!(1),
            dec!(5000),
            dec!(60000),
        ));
        specs.push(InstrumentSpec::row(
            "GER40",
            &["DAX", "DE40"],
            "GER40",
            "EUR",
            dec!(1),
            dec!(1),
            dec!(5000),
            dec!(60000),
        ));
        specs.push(InstrumentSpec::row(
            "BTCUSD",
            &["BITCOIN", "BTC"],
            "BTC",
            "USD",
            dec!(1),
            dec!(1),
            dec!(1000),
            dec!(1000000),
        ));

        Self { specs }
    }
}

impl InstrumentTable {
    /// Adds a row, replacing any existing row with the same symbol.
    pub fn insert(&mut self, spec: InstrumentSpec) -> Result<(), InvalidInstrument> {
        spec.validate()?;
        self.specs.retain(|s| s.symbol != spec.symbol);
        self.specs.push(spec);
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentSpec> {
        self.specs.iter().find(|s| s.symbol == symbol)
    }

    /// Resolves an upper-case word to an instrument by symbol or alias.
    pub fn lookup(&self, word: &str) -> Option<&InstrumentSpec> {
        self.specs
            .iter()
            .find(|s| s.symbol == word || s.aliases.iter().any(|a| a == word))
    }

    /// Every symbol and alias, for keyword matching.
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().flat_map(|s| {
            std::iter::once(s.symbol.as_str()).chain(s.aliases.iter().map(|a| a.as_str()))
        })
    }

    /// Value of one pip on one lot of `symbol`, in `account_currency`.
    ///
    /// This is the only place that converts between currencies. `price` is the
    /// instrument's own price, used when the account currency is its base.
    /// Other conversions need a reference rate keyed `QUOTEACCOUNT` (multiply)
    /// or `ACCOUNTQUOTE` (divide).
    pub fn pip_value_per_lot(
        &self,
        symbol: &str,
        account_currency: &str,
        price: Decimal,
        rates: &HashMap<String, Decimal>,
    ) -> Result<Decimal, SizingFailure> {
        let spec = self
            .get(symbol)
            .ok_or_else(|| SizingFailure::UnknownInstrument(symbol.to_string()))?;
        let in_quote = spec.pip_value_in_quote();
        let account = account_currency.to_uppercase();

        if spec.quote == account {
            return Ok(in_quote);
        }
        if spec.base == account && price > Decimal::ZERO {
            return Ok(in_quote / price);
        }
        if let Some(rate) = rates
            .get(&format!("{}{}", spec.quote, account))
            .filter(|r| **r > Decimal::ZERO)
        {
            return Ok(in_quote * rate);
        }
        if let Some(rate) = rates
            .get(&format!("{}{}", account, spec.quote))
            .filter(|r| **r > Decimal::ZERO)
        {
            return Ok(in_quote / rate);
        }

        Err(SizingFailure::MissingConversionRate {
            from: spec.quote.clone(),
            to: account,
        })
    }
}
