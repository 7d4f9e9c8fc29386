use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use common::{Bar, Broker, NoopNotifier, Result};
use strategy::Strategy;

use crate::runtime::{RuntimeConfig, TradingRuntime};

/// Summary of a single offline pass over a bar sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub bars: u64,
    pub trades: u64,
    pub skipped: u64,
    /// Orders the broker refused.
    pub rejected: u64,
    pub cash: f64,
    pub position_qty: u64,
    pub last_price: f64,
    pub equity: f64,
}

/// Run every bar through the same decision path as the live runtime, once,
/// with no worker, no pacing and no notifications.
pub async fn run_backtest(
    config: RuntimeConfig,
    bars: Vec<Bar>,
    strategy: Box<dyn Strategy>,
    broker: Box<dyn Broker>,
) -> Result<BacktestReport> {
    let passes = bars.len();
    let runtime = TradingRuntime::new(config, bars, strategy, broker, Arc::new(NoopNotifier))?;

    let mut rejected = 0;
    for _ in 0..passes {
        if let Err(e) = runtime.process_next_bar().await {
            debug!(error = %e, "Backtest order rejected");
            rejected += 1;
        }
    }
    runtime.stop().await;

    let s = runtime.status().await;
    info!(
        symbol = %s.symbol,
        bars = s.loop_count,
        trades = s.trades,
        equity = s.equity,
        "Backtest finished"
    );

    Ok(BacktestReport {
        symbol: s.symbol,
        bars: s.loop_count,
        trades: s.trades,
        skipped: s.skipped,
        rejected,
        cash: s.cash,
        position_qty: s.position_qty,
        last_price: s.last_price,
        equity: s.equity,
    })
}
