use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, EnvFilter};

use signal_trade_bot::config::Config;
use signal_trade_bot::core::lifecycle::StatusChange;
use signal_trade_bot::core::PositionSizer;
use signal_trade_bot::models::{ChannelId, PerformanceRecord, Trade, TradeStatus};
use signal_trade_bot::storage::{SqliteStore, StoreError, TradeStore};

const USAGE: &str = "usage:
  trade-admin active
  trade-admin status <trade_id> <tp1_hit|closed>
  trade-admin profit <trade_id> <pips> <amount>
  trade-admin close <trade_id> <exit_price>
  trade-admin performance <channel> [YYYY-MM-DD]";

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.system.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let store = SqliteStore::connect(&cfg.system.database_url)
        .await
        .context("opening trade database")?;

    match command.as_str() {
        "active" => {
            let active = store.get_active_trades().await?;
            if active.is_empty() {
                println!("No active trades.");
            }
            for trade in &active {
                print_trade(trade);
            }
        }
        "status" => {
            let id = arg(&args, 1, "trade_id")?;
            let status: TradeStatus = arg(&args, 2, "status")?
                .parse()
                .map_err(anyhow::Error::msg)?;
            match store.update_trade_status(id, status, Utc::now()).await? {
                StatusChange::Applied { from, to } => println!("{}: {} -> {}", id, from, to),
                StatusChange::Ignored { current, requested } => {
                    println!("{}: cannot move from {} to {}", id, current, requested)
                }
            }
        }
        "profit" => {
            let id = arg(&args, 1, "trade_id")?;
            let pips = decimal_arg(&args, 2, "pips")?;
            let amount = decimal_arg(&args, 3, "amount")?;
            if store.update_trade_profit(id, pips, amount).await? {
                println!("{}: profit {} pips / {}", id, pips, amount);
            } else {
                println!("{}: trade is closed, profit unchanged", id);
            }
        }
        "close" => {
            let id = arg(&args, 1, "trade_id")?;
            let exit = decimal_arg(&args, 2, "exit_price")?;
            let trade = store
                .get_trade(id)
                .await?
                .ok_or_else(|| StoreError::TradeNotFound(id.to_string()))?;

            let sizer = PositionSizer::new(
                cfg.instrument_table(),
                cfg.trading.conversion_rates.clone(),
                cfg.trading.lot_step,
            );
            let (pips, amount) = sizer.profit_at(&trade, exit)?;

            if !store.update_trade_profit(id, pips, amount).await? {
                println!("{}: already closed", id);
                return Ok(());
            }
            let change = store.update_trade_status(id, TradeStatus::Closed, Utc::now()).await?;
            if change.is_applied() {
                println!("{}: closed at {} ({} pips, {} {})", id, exit, pips, amount, trade.account_currency);
            } else {
                println!("{}: could not close ({:?})", id, change);
            }
        }
        "performance" => {
            let channel = ChannelId::new(arg(&args, 1, "channel")?);
            let tz = cfg.report_tz();
            let date = match args.get(2) {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("bad date {:?}", raw))?,
                None => Utc::now().with_timezone(&tz).date_naive(),
            };

            let record = match store.get_performance(&channel, date).await? {
                Some(existing) => existing,
                None => {
                    let trades = store.trades_for_channel(&channel).await?;
                    let record = PerformanceRecord::summarize(&channel, date, tz, &trades);
                    store.record_performance(&record).await?;
                    record
                }
            };
            print_performance(&record);
        }
        other => {
            println!("{}", USAGE);
            bail!("unknown command {:?}", other);
        }
    }

    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .with_context(|| format!("missing <{}>\n{}", name, USAGE))
}

fn decimal_arg(args: &[String], index: usize, name: &str) -> Result<Decimal> {
    let raw = arg(args, index, name)?;
    raw.parse()
        .with_context(|| format!("<{}> must be a number, got {:?}", name, raw))
}

fn print_trade(trade: &Trade) {
    println!(
        "{:<20} {:<4} {:<8} entry {:<10} sl {:<10} tp1 {:<10} tp2 {:<10} lots {:<6} [{}]",
        trade.trade_id,
        trade.action,
        trade.symbol,
        trade.entry_price,
        trade.sl_price,
        trade.tp1_price.map_or_else(|| "-".to_string(), |p| p.to_string()),
        trade.tp2_price.map_or_else(|| "-".to_string(), |p| p.to_string()),
        trade.lot_size,
        trade.status,
    );
}

fn print_performance(record: &PerformanceRecord) {
    println!("Channel {} on {}", record.channel, record.date);
    println!("  Trades taken: {}", record.trades_taken);
    println!("  Trades won:   {}", record.trades_won);
    println!("  Win rate:     {}%", record.win_rate);
    println!("  Total pips:   {}", record.total_pips);
    println!("  Total profit: {}", record.total_profit);
}
