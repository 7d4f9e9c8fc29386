//! replaybot: paper-trading bot that replays historical bars.
//!
//! Commands:
//! - `serve`: run the trading loop with the control API and chat commands
//! - `backtest`: one offline pass over a bar file, printing the result
//! - `notify-test`: send a single message through the configured notifier

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::AppState;
use common::{Bar, BarSource, Broker, CommandToggle, Config, CsvBarSource, NoopNotifier, Notifier};
use engine::{run_backtest, RuntimeConfig, TradingRuntime, VenueStub};
use paper::PaperBroker;
use strategy::SmaCross;
use telegram_ctrl::{parse_chat_id, CommandHandler, CommandPoller, TelegramNotifier, TelegramUpdates};

#[derive(Parser)]
#[command(name = "replaybot", about = "Paper-trading bot replaying historical bars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Venue {
    /// In-memory simulated fills.
    Paper,
    /// Placeholder for a real brokerage; rejects every order.
    Stub,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading loop with the control API and chat commands.
    Serve {
        /// OHLCV CSV file to replay.
        #[arg(long, default_value = "data/sample_us_stock.csv")]
        csv: PathBuf,

        /// Ticker symbol. Defaults to BOT_SYMBOL.
        #[arg(long)]
        symbol: Option<String>,

        /// Listen host. Defaults to BOT_SERVER_HOST.
        #[arg(long)]
        host: Option<String>,

        /// Listen port. Defaults to BOT_SERVER_PORT.
        #[arg(long)]
        port: Option<u16>,

        /// Where orders go.
        #[arg(long, value_enum, default_value_t = Venue::Paper)]
        venue: Venue,
    },
    /// Run every bar once through the paper broker and print a summary.
    Backtest {
        #[arg(long, default_value = "data/sample_us_stock.csv")]
        csv: PathBuf,

        #[arg(long)]
        symbol: Option<String>,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Send one message through the Telegram notifier.
    /// Only the bot token and chat id are needed; TELEGRAM_ENABLED may be off.
    NotifyTest {
        /// Text to send. Defaults to a timestamped check message.
        #[arg(long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::from_env().context("loading configuration")?;

    match cli.command {
        Commands::Serve {
            csv,
            symbol,
            host,
            port,
            venue,
        } => {
            let symbol = symbol.unwrap_or_else(|| cfg.symbol.clone());
            let host = host.unwrap_or_else(|| cfg.server_host.clone());
            let port = port.unwrap_or(cfg.server_port);
            serve(&cfg, &csv, symbol, &host, port, venue).await
        }
        Commands::Backtest { csv, symbol, json } => {
            let symbol = symbol.unwrap_or_else(|| cfg.symbol.clone());
            backtest(&cfg, &csv, symbol, json).await
        }
        Commands::NotifyTest { message } => {
            let message = message.unwrap_or_else(|| test_message(Utc::now()));
            notify_test(&cfg, &message).await
        }
    }
}

async fn serve(
    cfg: &Config,
    csv: &Path,
    symbol: String,
    host: &str,
    port: u16,
    venue: Venue,
) -> Result<()> {
    let api_token = cfg
        .api_token
        .clone()
        .context("BOT_API_TOKEN must be set to serve the control API")?;
    let addr = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {host}:{port}"))?
        .next()
        .with_context(|| format!("{host}:{port} resolved to no address"))?;

    // ── Runtime ───────────────────────────────────────────────────────────────
    let bars = load_bars(csv, &symbol)?;
    let telegram = if cfg.telegram_enabled {
        let chat_id = parse_chat_id(&cfg.telegram_chat_id)?;
        Some((teloxide::Bot::new(&cfg.telegram_bot_token), chat_id))
    } else {
        None
    };
    let notifier: Arc<dyn Notifier> = match &telegram {
        Some((bot, chat_id)) => Arc::new(TelegramNotifier::with_bot(bot.clone(), *chat_id)),
        None => Arc::new(NoopNotifier),
    };
    let broker: Box<dyn Broker> = match venue {
        Venue::Paper => Box::new(PaperBroker::new(cfg.initial_cash_usd)),
        Venue::Stub => Box::new(VenueStub::new("brokerage")),
    };
    let runtime = TradingRuntime::new(
        runtime_config(cfg, &symbol),
        bars,
        Box::new(SmaCross::new(cfg.short_window, cfg.long_window)?),
        broker,
        notifier.clone(),
    )?;

    // ── Chat commands ─────────────────────────────────────────────────────────
    let poller = telegram.map(|(bot, chat_id)| {
        CommandPoller::new(
            Arc::new(TelegramUpdates::new(bot)),
            CommandHandler::new(runtime.clone()),
            notifier.clone(),
            vec![chat_id.0],
            cfg.telegram_poll_interval(),
            cfg.telegram_commands_enabled,
        )
    });

    // ── Control API ───────────────────────────────────────────────────────────
    let commands = poller
        .clone()
        .map(|p| p as Arc<dyn CommandToggle>);
    let state = AppState::new(runtime.clone(), commands, &api_token)?;

    runtime.start().await;
    if let Some(poller) = &poller {
        poller.start().await;
    }

    let signal_state = state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_state.request_shutdown();
        }
    });

    info!(
        %symbol,
        %addr,
        telegram = cfg.telegram_enabled,
        "replaybot serving: GET /health, GET /status, POST /pause, POST /resume, POST /stop, \
         GET /telegram-commands, POST /telegram-commands/enable, POST /telegram-commands/disable"
    );
    let served = api::serve(state, addr).await;

    // ── Shutdown ──────────────────────────────────────────────────────────────
    if let Some(poller) = &poller {
        poller.stop().await;
    }
    runtime.stop().await;
    served?;

    let s = runtime.status().await;
    info!(loops = s.loop_count, trades = s.trades, equity = s.equity, "replaybot exited");
    Ok(())
}

async fn backtest(cfg: &Config, csv: &Path, symbol: String, json: bool) -> Result<()> {
    let bars = load_bars(csv, &symbol)?;
    let report = run_backtest(
        runtime_config(cfg, &symbol),
        bars,
        Box::new(SmaCross::new(cfg.short_window, cfg.long_window)?),
        Box::new(PaperBroker::new(cfg.initial_cash_usd)),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("=== Backtest {} ({} bars) ===", report.symbol, report.bars);
        println!("trades:    {}", report.trades);
        println!("skipped:   {}", report.skipped);
        println!("rejected:  {}", report.rejected);
        println!("position:  {}", report.position_qty);
        println!("cash:      {:.2}", report.cash);
        println!("last:      {:.2}", report.last_price);
        println!("equity:    {:.2}", report.equity);
    }
    Ok(())
}

async fn notify_test(cfg: &Config, message: &str) -> Result<()> {
    let (token, chat_id) = telegram_credentials(cfg)?;
    let notifier = TelegramNotifier::new(token, chat_id)?;
    notifier.send(message).await?;
    println!("Sent to chat {}", notifier.chat_id().0);
    Ok(())
}

fn telegram_credentials(cfg: &Config) -> Result<(&str, &str)> {
    if cfg.telegram_bot_token.trim().is_empty() {
        bail!("TELEGRAM_BOT_TOKEN is empty");
    }
    if cfg.telegram_chat_id.trim().is_empty() {
        bail!("TELEGRAM_CHAT_ID is empty");
    }
    Ok((&cfg.telegram_bot_token, &cfg.telegram_chat_id))
}

fn test_message(now: DateTime<Utc>) -> String {
    format!(
        "[TEST] replaybot notification check at {}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn load_bars(csv: &Path, symbol: &str) -> Result<Vec<Bar>> {
    let bars = CsvBarSource::new(csv, symbol)
        .load()
        .with_context(|| format!("loading bars from {}", csv.display()))?;
    if bars.is_empty() {
        bail!("{} contains no bars", csv.display());
    }
    Ok(bars)
}

fn runtime_config(cfg: &Config, symbol: &str) -> RuntimeConfig {
    RuntimeConfig::new(symbol, cfg.quantity, cfg.max_position_qty, cfg.tick_interval())
}
