use anyhow::{Context, Result};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::core::instruments::{InstrumentSpec, InstrumentTable};
use crate::models::ChannelId;

pub type SharedConfig = Arc<RwLock<Config>>;

const DEFAULT_CONFIG_PATH: &str = "secrets.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: ChannelId,
    pub name: String,
    /// `@username` or numeric chat id of the source channel.
    pub source: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub account_balance: Decimal,
    pub account_currency: String,
    pub risk_percentage: Decimal,
    pub broker: String,
    pub lot_step: Decimal,
    /// Reference rates for pip-value conversion, keyed like `GBPUSD`.
    pub conversion_rates: HashMap<String, Decimal>,
    pub extra_instruments: Vec<InstrumentSpec>,
    pub extra_keywords: Vec<String>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            account_balance: dec!(1000),
            account_currency: "USD".to_string(),
            risk_percentage: dec!(1.0),
            broker: "Exness".to_string(),
            lot_step: dec!(0.01),
            conversion_rates: HashMap::new(),
            extra_instruments: Vec::new(),
            extra_keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub environment: String,
    pub log_level: String,
    pub database_url: String,
    pub queue_capacity: usize,
    /// IANA zone used to bucket trades into performance days.
    pub report_timezone: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            log_level: "info".to_string(),
            database_url: "sqlite:data/trading.db".to_string(),
            queue_capacity: 256,
            report_timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub channels: Vec<ChannelConfig>,
    pub trading: TradingConfig,
    pub system: SystemConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            channels: vec![
                ChannelConfig {
                    id: ChannelId::new("A"),
                    name: "KJF Signals".to_string(),
                    source: "@KJFSignals".to_string(),
                    enabled: true,
                },
                ChannelConfig {
                    id: ChannelId::new("B"),
                    name: "Fortune Skool".to_string(),
                    source: "@FortuneSkool".to_string(),
                    enabled: true,
                },
            ],
            trading: TradingConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let mut cfg = Config::default();

        cfg.telegram.bot_token = env("TELEGRAM_BOT_TOKEN", "");
        cfg.telegram.chat_id = env("TELEGRAM_CHAT_ID", "");
        cfg.telegram.api_base = env("TELEGRAM_API_BASE", &cfg.telegram.api_base);
        cfg.telegram.poll_timeout_secs = env("TELEGRAM_POLL_TIMEOUT", "30").parse().unwrap_or(30);

        for channel in &mut cfg.channels {
            let prefix = format!("CHANNEL_{}", channel.id);
            channel.name = env(&format!("{}_NAME", prefix), &channel.name);
            channel.source = env(&format!("{}_SOURCE", prefix), &channel.source);
            channel.enabled = env(&format!("{}_ENABLED", prefix), "true").to_lowercase() == "true";
        }

        let t = &mut cfg.trading;
        t.account_balance = env("ACCOUNT_BALANCE", "1000").parse().unwrap_or(dec!(1000));
        t.account_currency = env("ACCOUNT_CURRENCY", "USD").to_uppercase();
        t.risk_percentage = env("RISK_PERCENTAGE", "1.0").parse().unwrap_or(dec!(1.0));
        t.broker = env("BROKER", "Exness");
        t.lot_step = env("LOT_STEP", "0.01").parse().unwrap_or(dec!(0.01));

        let s = &mut cfg.system;
        s.environment = env("ENVIRONMENT", "production");
        s.log_level = env("LOG_LEVEL", "info");
        s.database_url = env("DATABASE_URL", "sqlite:data/trading.db");
        s.queue_capacity = env("QUEUE_CAPACITY", "256").parse().unwrap_or(256);
        s.report_timezone = env("REPORT_TIMEZONE", "UTC");

        cfg
    }

    /// Reads a JSON secrets file. Missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// The JSON file named by `CONFIG_PATH` (default `secrets.json`) when it
    /// exists, otherwise the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::from_env())
        }
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    pub fn enabled_channels(&self) -> impl Iterator<Item = &ChannelConfig> {
        self.channels.iter().filter(|c| c.enabled)
    }

    pub fn instrument_table(&self) -> InstrumentTable {
        let mut table = InstrumentTable::default();
        for spec in &self.trading.extra_instruments {
            if let Err(e) = table.insert(spec.clone()) {
                warn!("Skipping configured instrument: {}", e);
            }
        }
        table
    }

    pub fn report_tz(&self) -> Tz {
        self.system.report_timezone.parse().unwrap_or_else(|_| {
            warn!(
                "Unknown report timezone {:?}, using UTC",
                self.system.report_timezone
            );
            chrono_tz::UTC
        })
    }
}
