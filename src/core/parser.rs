use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

use crate::core::instruments::{InstrumentSpec, InstrumentTable};
use crate::models::{Action, ChannelId, Signal};

static PAIR_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{3})\s*[/\-]\s*([A-Z]{3})\b").expect("static regex"));

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z][A-Z0-9]*|\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|@").expect("static regex")
});

/// Codes that make a six-letter word look like a currency pair.
const CURRENCY_CODES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "AUD", "NZD", "CAD", "CHF", "ZAR", "MXN", "SGD", "HKD", "NOK",
    "SEK", "DKK", "TRY", "PLN", "CNH", "XAU", "XAG", "BTC", "ETH",
];

/// Words after a number that mark it as a distance rather than a price.
const DISTANCE_UNITS: &[&str] = &["PIP", "PIPS", "POINT", "POINTS", "PTS", "PIPETTES"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Symbol,
    Action,
    Entry,
    StopLoss,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Symbol => write!(f, "symbol"),
            Field::Action => write!(f, "action"),
            Field::Entry => write!(f, "entry"),
            Field::StopLoss => write!(f, "sl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("missing field: {0}")]
    MissingField(Field),
    #[error("stop loss {sl} is not on the losing side of {action} entry {entry}")]
    InvalidStopDirection {
        action: Action,
        entry: Decimal,
        sl: Decimal,
    },
    #[error("take profit {tp} is on the losing side of {action} entry {entry}")]
    InvalidTargetDirection {
        action: Action,
        entry: Decimal,
        tp: Decimal,
    },
    #[error("unrecognized symbol: {0}")]
    UnrecognizedSymbol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Entry,
    StopLoss,
    Target(Option<u8>),
}

impl Label {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "ENTRY" | "ENTER" | "PRICE" | "EP" => Some(Label::Entry),
            "SL" | "STOP" | "STOPLOSS" => Some(Label::StopLoss),
            "TP" | "TARGET" | "PROFIT" | "TAKEPROFIT" => Some(Label::Target(None)),
            _ => ["TP", "TARGET"].iter().find_map(|prefix| {
                word.strip_prefix(prefix)
                    .and_then(|n| n.parse::<u8>().ok())
                    .map(|n| Label::Target(Some(n)))
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Number(Decimal),
    At,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    TOKEN
        .find_iter(text)
        .filter_map(|m| {
            let s = m.as_str();
            if s == "@" {
                Some(Token::At)
            } else if s.starts_with(|c: char| c.is_ascii_digit()) {
                Decimal::from_str(&s.replace(',', "")).ok().map(Token::Number)
            } else {
                Some(Token::Word(s))
            }
        })
        .collect()
}

/// Extracts structured trade parameters from free-form channel text.
///
/// Parsing is pure: the same text always gives the same result.
#[derive(Debug, Clone)]
pub struct SignalParser {
    instruments: InstrumentTable,
}

impl SignalParser {
    pub fn new(instruments: InstrumentTable) -> Self {
        Self { instruments }
    }

    pub fn parse(&self, channel: &ChannelId, text: &str) -> Result<Signal, ParseFailure> {
        let upper = PAIR_SEPARATOR
            .replace_all(&text.to_uppercase(), "$1$2")
            .into_owned();
        let tokens = tokenize(&upper);

        let spec = self.find_instrument(&tokens)?;
        let (action_pos, action) = tokens
            .iter()
            .enumerate()
            .find_map(|(i, t)| match t {
                Token::Word(w) => Action::from_word(w).map(|a| (i, a)),
                _ => None,
            })
            .ok_or(ParseFailure::MissingField(Field::Action))?;

        let levels = collect_levels(&tokens, spec, action_pos);
        let entry = levels.entry.ok_or(ParseFailure::MissingField(Field::Entry))?;
        let sl = levels.sl.ok_or(ParseFailure::MissingField(Field::StopLoss))?;

        if !action.is_losing_side(entry, sl) {
            return Err(ParseFailure::InvalidStopDirection { action, entry, sl });
        }

        let mut targets = levels.targets;
        targets.sort_by_key(|(index, order, _)| (*index, *order));
        let take_profits: Vec<Decimal> = targets.into_iter().map(|(_, _, price)| price).collect();

        if let Some(tp) = take_profits
            .iter()
            .copied()
            .find(|tp| *tp == entry || action.is_losing_side(entry, *tp))
        {
            return Err(ParseFailure::InvalidTargetDirection { action, entry, tp });
        }

        Ok(Signal {
            channel: channel.clone(),
            symbol: spec.symbol.clone(),
            action,
            entry,
            sl,
            take_profits,
        })
    }

    fn find_instrument(&self, tokens: &[Token<'_>]) -> Result<&InstrumentSpec, ParseFailure> {
        let words = || {
            tokens.iter().filter_map(|t| match t {
                Token::Word(w) => Some(*w),
                _ => None,
            })
        };

        if let Some(spec) = words().find_map(|w| self.resolve(w)) {
            return Ok(spec);
        }

        match words().find(|w| looks_like_pair(w)) {
            Some(w) => Err(ParseFailure::UnrecognizedSymbol(w.to_string())),
            None => Err(ParseFailure::MissingField(Field::Symbol)),
        }
    }

    /// Exact symbol or alias, or a symbol with a one-letter broker suffix (`EURUSDM`).
    fn resolve(&self, word: &str) -> Option<&InstrumentSpec> {
        self.instruments.lookup(word).or_else(|| {
            let mut chars = word.chars();
            let last = chars.next_back()?;
            if word.len() > 4 && last.is_ascii_alphabetic() {
                self.instruments.get(chars.as_str())
            } else {
                None
            }
        })
    }
}

fn looks_like_pair(word: &str) -> bool {
    word.len() == 6
        && word.is_char_boundary(3)
        && CURRENCY_CODES.contains(&&word[..3])
        && CURRENCY_CODES.contains(&&word[3..])
}

#[derive(Debug, Default)]
struct Levels {
    entry: Option<Decimal>,
    sl: Option<Decimal>,
    /// (target number, order of appearance, price)
    targets: Vec<(u8, usize, Decimal)>,
}

fn collect_levels(tokens: &[Token<'_>], spec: &InstrumentSpec, action_pos: usize) -> Levels {
    let mut levels = Levels::default();
    let mut pending: Option<Label> = None;

    for (i, token) in tokens.iter().enumerate() {
        match *token {
            Token::Word(w) => {
                if is_order_type(tokens, i) {
                    continue;
                }
                if let Some(label) = Label::from_word(w) {
                    pending = Some(label);
                } else if w == "AT" && pending.is_none() {
                    pending = Some(Label::Entry);
                }
            }
            Token::At => {
                if pending.is_none() {
                    pending = Some(Label::Entry);
                }
            }
            Token::Number(value) => {
                // "TP 1: 1.0950": the small integer numbers the target.
                if pending == Some(Label::Target(None))
                    && matches!(tokens.get(i + 1), Some(Token::Number(_)))
                {
                    if let Some(index) = target_index(value) {
                        pending = Some(Label::Target(Some(index)));
                        continue;
                    }
                }

                let is_distance = matches!(
                    tokens.get(i + 1),
                    Some(Token::Word(next)) if DISTANCE_UNITS.contains(next)
                );
                if is_distance || !spec.is_plausible_price(value) {
                    continue;
                }

                match pending.take() {
                    Some(Label::Entry) => {
                        levels.entry.get_or_insert(value);
                    }
                    Some(Label::StopLoss) => {
                        levels.sl.get_or_insert(value);
                    }
                    Some(Label::Target(index)) => {
                        let next = u8::try_from(levels.targets.len() + 1).unwrap_or(u8::MAX);
                        let index = index.unwrap_or(next);
                        if !levels.targets.iter().any(|(existing, _, _)| *existing == index) {
                            levels.targets.push((index, i, value));
                        }
                    }
                    None => {
                        if levels.entry.is_none() && i > action_pos {
                            levels.entry = Some(value);
                        }
                    }
                }
            }
        }
    }

    levels
}

fn target_index(value: Decimal) -> Option<u8> {
    if value.scale() != 0 || value < Decimal::ONE || value > Decimal::from(9) {
        return None;
    }
    u8::try_from(value.mantissa()).ok()
}

/// `BUY STOP`, `SELL LIMIT`: an order type after the action word, not a level label.
fn is_order_type(tokens: &[Token<'_>], i: usize) -> bool {
    let Some(Token::Word(word)) = tokens.get(i) else {
        return false;
    };
    if !matches!(*word, "STOP" | "LIMIT") {
        return false;
    }
    let after_action = i
        .checked_sub(1)
        .and_then(|prev| tokens.get(prev))
        .is_some_and(|t| matches!(t, Token::Word(w) if Action::from_word(w).is_some()));
    let stop_loss_phrase = matches!(tokens.get(i + 1), Some(Token::Word("LOSS")));
    after_action && !stop_loss_phrase
}
