use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use common::cancel::sleep_or_stop;
use common::{
    notify_best_effort, Bar, Broker, Error, Fill, Notifier, Order, Result, RuntimeStatus, Signal,
};
use strategy::Strategy;

use crate::decision::{decide, Decision, SkipReason};

/// How often a paused worker re-checks the pause flag.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default bound on how long `stop` waits for the worker to exit.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Static parameters of a runtime. Checked once in `TradingRuntime::new`.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub symbol: String,
    /// Shares per order.
    pub quantity: u64,
    /// Ceiling on the held position.
    pub max_position_qty: u64,
    /// Pause between bars while running.
    pub tick_interval: Duration,
    pub join_timeout: Duration,
}

impl RuntimeConfig {
    pub fn new(
        symbol: impl Into<String>,
        quantity: u64,
        max_position_qty: u64,
        tick_interval: Duration,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            max_position_qty,
            tick_interval,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::Config("symbol must not be empty".into()));
        }
        if self.quantity == 0 {
            return Err(Error::Config("quantity must be positive".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Config("tick interval must be positive".into()));
        }
        if self.max_position_qty < self.quantity {
            return Err(Error::Config(format!(
                "max_position_qty ({}) must be >= quantity ({})",
                self.max_position_qty, self.quantity
            )));
        }
        Ok(())
    }
}

/// Result of one processed bar.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub loop_count: u64,
    pub bar_timestamp: String,
    pub signal: Signal,
    pub fill: Option<Fill>,
    pub skip: Option<SkipReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Constructed, worker never started.
    Idle,
    Running,
    /// Terminal.
    Stopped,
}

/// Everything guarded by the runtime lock.
struct Core {
    phase: Phase,
    status: RuntimeStatus,
    cursor: usize,
    strategy: Box<dyn Strategy>,
    broker: Box<dyn Broker>,
}

struct Shared {
    config: RuntimeConfig,
    bars: Vec<Bar>,
    core: Mutex<Core>,
    notifier: Arc<dyn Notifier>,
    stop_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Paper-trading runtime for a single symbol.
///
/// Replays `bars` through a strategy and a broker on a background worker.
/// Cloning yields another handle to the same runtime; the control API,
/// the command channel and the worker all hold one.
///
/// All mutable state sits behind one lock. Processing a bar (read position,
/// decide, submit, refresh the snapshot) happens in a single critical
/// section, so no caller ever sees half of a bar applied and the position
/// ceiling cannot be raced. Notifications are sent after the lock is
/// released and their failures are only logged.
#[derive(Clone)]
pub struct TradingRuntime {
    shared: Arc<Shared>,
}

impl TradingRuntime {
    pub fn new(
        config: RuntimeConfig,
        bars: Vec<Bar>,
        strategy: Box<dyn Strategy>,
        broker: Box<dyn Broker>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        if bars.is_empty() {
            return Err(Error::Config("bar sequence must not be empty".into()));
        }

        let cash = broker.cash_balance();
        let position = broker.position_qty(&config.symbol);
        if position > config.max_position_qty {
            return Err(Error::Config(format!(
                "broker already holds {position} {}, above max_position_qty={}",
                config.symbol, config.max_position_qty
            )));
        }

        info!(
            symbol = %config.symbol,
            bars = bars.len(),
            strategy = %strategy.name(),
            quantity = config.quantity,
            max_position_qty = config.max_position_qty,
            "Trading runtime created"
        );

        let (stop_tx, _) = watch::channel(false);
        let core = Core {
            phase: Phase::Idle,
            status: RuntimeStatus::new(&config.symbol, cash, position),
            cursor: 0,
            strategy,
            broker,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                bars,
                core: Mutex::new(core),
                notifier,
                stop_tx,
                worker: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Spawn the tick worker. Returns `false` if already running or
    /// stopped; a stopped runtime cannot be restarted.
    pub async fn start(&self) -> bool {
        {
            let mut core = self.shared.core.lock().await;
            match core.phase {
                Phase::Running => {
                    debug!(symbol = %self.shared.config.symbol, "Runtime already running");
                    return false;
                }
                Phase::Stopped => {
                    warn!(symbol = %self.shared.config.symbol, "Start ignored, runtime was stopped");
                    return false;
                }
                Phase::Idle => {}
            }

            core.phase = Phase::Running;
            core.status.running = true;
            core.status.paused = false;
            core.status.last_error.clear();
            core.status.started_at = Some(Utc::now());

            let stop_rx = self.shared.stop_tx.subscribe();
            let handle = tokio::spawn(self.clone().run_worker(stop_rx));
            *self.shared.worker.lock().await = Some(handle);
        }

        let cfg = &self.shared.config;
        info!(symbol = %cfg.symbol, tick = ?cfg.tick_interval, "Runtime started");
        self.notify(&format!(
            "[START] {} paper bot started | qty={}, tick={}s",
            cfg.symbol,
            cfg.quantity,
            cfg.tick_interval.as_secs_f64()
        ))
        .await;
        true
    }

    pub async fn pause(&self) {
        if self.set_paused(true).await {
            self.notify(&format!("[PAUSE] {} bot paused", self.shared.config.symbol))
                .await;
        }
    }

    pub async fn resume(&self) {
        if self.set_paused(false).await {
            self.notify(&format!("[RESUME] {} bot resumed", self.shared.config.symbol))
                .await;
        }
    }

    /// Returns whether the flag actually changed.
    async fn set_paused(&self, paused: bool) -> bool {
        let mut core = self.shared.core.lock().await;
        if core.phase == Phase::Stopped || core.status.paused == paused {
            return false;
        }
        core.status.paused = paused;
        info!(symbol = %self.shared.config.symbol, paused, "Pause flag changed");
        true
    }

    /// Stop the worker and move to the terminal state.
    ///
    /// Waits at most `join_timeout` for the worker; if it has not exited by
    /// then it is left to observe the stop flag on its own. Safe to call
    /// any number of times.
    pub async fn stop(&self) {
        self.shared.stop_tx.send_replace(true);

        let first_stop = {
            let mut core = self.shared.core.lock().await;
            let first = core.phase != Phase::Stopped;
            core.phase = Phase::Stopped;
            core.status.running = false;
            first
        };

        let handle = self.shared.worker.lock().await.take();
        if let Some(handle) = handle {
            let timeout = self.shared.config.join_timeout;
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => debug!("Trading worker joined"),
                Ok(Err(e)) => warn!(error = %e, "Trading worker ended abnormally"),
                Err(_) => warn!(?timeout, "Trading worker did not exit in time, detaching"),
            }
        }

        if first_stop {
            info!(symbol = %self.shared.config.symbol, "Runtime stopped");
            self.notify(&format!("[STOP] {} bot stopped", self.shared.config.symbol))
                .await;
        }
    }

    /// Consistent copy of the current state.
    pub async fn status(&self) -> RuntimeStatus {
        self.shared.core.lock().await.status.clone()
    }

    /// Process one bar regardless of the pause flag.
    ///
    /// This is the worker's unit of work, exposed for deterministic driving
    /// in tests and backtests. An order rejected by the broker is recorded in
    /// `last_error` and returned as the error; the bar still counts as
    /// processed.
    pub async fn process_next_bar(&self) -> Result<TickReport> {
        let mut outbox = Vec::new();
        let outcome = {
            let mut core = self.lock_active().await?;
            self.apply_next_bar(&mut core, &mut outbox).await
        };
        self.flush(outbox).await;
        outcome
    }

    /// Like `process_next_bar`, but does nothing while paused. The flag is
    /// checked under the same lock that processes the bar, so no bar slips
    /// through after `pause` returns.
    async fn worker_tick(&self) -> Result<Option<TickReport>> {
        let mut outbox = Vec::new();
        let outcome = {
            let mut core = self.lock_active().await?;
            if core.status.paused {
                return Ok(None);
            }
            self.apply_next_bar(&mut core, &mut outbox).await
        };
        self.flush(outbox).await;
        outcome.map(Some)
    }

    async fn lock_active(&self) -> Result<MutexGuard<'_, Core>> {
        let core = self.shared.core.lock().await;
        if core.phase == Phase::Stopped {
            return Err(Error::RuntimeStopped);
        }
        Ok(core)
    }

    /// Read, decide, act and update for the next bar. Caller holds the lock.
    async fn apply_next_bar(&self, core: &mut Core, outbox: &mut Vec<String>) -> Result<TickReport> {
        let cfg = &self.shared.config;
        let bars = &self.shared.bars;

        // Cyclic replay: after the last bar the cursor wraps to the first,
        // so a long-running session replays the same history indefinitely.
        let bar = &bars[core.cursor];
        core.cursor = (core.cursor + 1) % bars.len();

        let signal = core.strategy.on_price(bar.close);
        let position = core.broker.position_qty(&cfg.symbol);

        let mut fill = None;
        let mut skip = None;
        let mut failure = None;
        match decide(signal, position, cfg.quantity, cfg.max_position_qty) {
            Decision::Hold => {}
            Decision::Skip(reason) => skip = Some(reason),
            Decision::Submit(side) => {
                let order = Order::market(&cfg.symbol, side, cfg.quantity);
                match core.broker.submit_order(&order, bar.close, &bar.timestamp).await {
                    Ok(f) => fill = Some(f),
                    Err(e) => failure = Some((order, e)),
                }
            }
        }

        let cash = core.broker.cash_balance();
        let position_qty = core.broker.position_qty(&cfg.symbol);
        let status = &mut core.status;
        status.mark(cash, position_qty, bar.close);
        status.last_signal = signal;
        status.last_bar_timestamp = bar.timestamp.clone();
        status.loop_count += 1;
        if fill.is_some() {
            status.trades += 1;
        }
        if skip.is_some() {
            status.skipped += 1;
        }
        if let Some((_, e)) = &failure {
            status.last_error = e.to_string();
        }
        let loop_count = status.loop_count;

        debug!(
            loop_count,
            ts = %bar.timestamp,
            close = bar.close,
            %signal,
            position = position_qty,
            cash,
            "Bar processed"
        );

        if signal != Signal::Hold {
            outbox.push(format!(
                "[SIGNAL] {} {signal} | price={:.2} | ts={}",
                cfg.symbol, bar.close, bar.timestamp
            ));
        }
        if let Some(reason) = &skip {
            info!(symbol = %cfg.symbol, %reason, "Signal skipped");
            outbox.push(format!("[SKIP] {} {reason}", cfg.symbol));
        }
        if let Some(f) = &fill {
            info!(symbol = %f.symbol, side = %f.side, qty = f.qty, price = f.price, "Order filled");
            outbox.push(format!("[FILL] {} {} {} @ {:.2}", f.side, f.qty, f.symbol, f.price));
        }

        match failure {
            Some((order, e)) => {
                warn!(order_id = %order.id, side = %order.side, error = %e, "Order rejected");
                outbox.push(format!(
                    "[ERROR] {} {} {} rejected: {e}",
                    order.side, order.qty, order.symbol
                ));
                Err(e)
            }
            None => Ok(TickReport {
                loop_count,
                bar_timestamp: bar.timestamp.clone(),
                signal,
                fill,
                skip,
            }),
        }
    }

    async fn run_worker(self, mut stop_rx: watch::Receiver<bool>) {
        let tick = self.shared.config.tick_interval;
        info!(symbol = %self.shared.config.symbol, ?tick, "Trading worker running");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            match self.worker_tick().await {
                Ok(None) => {
                    if sleep_or_stop(&mut stop_rx, PAUSE_POLL_INTERVAL).await {
                        break;
                    }
                    continue;
                }
                Ok(Some(report)) => {
                    debug!(loop_count = report.loop_count, signal = %report.signal, "Tick done");
                }
                Err(Error::RuntimeStopped) => break,
                Err(e) => {
                    // Already recorded in status; the next bar gets a fresh try.
                    warn!(error = %e, "Tick failed, continuing");
                }
            }

            if sleep_or_stop(&mut stop_rx, tick).await {
                break;
            }
        }

        info!(symbol = %self.shared.config.symbol, "Trading worker exited");
    }

    async fn flush(&self, outbox: Vec<String>) {
        for message in &outbox {
            self.notify(message).await;
        }
    }

    async fn notify(&self, message: &str) {
        notify_best_effort(self.shared.notifier.as_ref(), message).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use common::{NoopNotifier, OrderSide};
    use paper::PaperBroker;
    use strategy::SmaCross;

    use super::*;

    const CLOSES: [f64; 8] = [100.0, 101.0, 102.0, 103.0, 99.0, 98.0, 97.0, 104.0];

    fn bars() -> Vec<Bar> {
        CLOSES
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "AAPL".into(),
                timestamp: format!("2026-01-{:02}T00:00:00Z", i + 1),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn config(quantity: u64, max_position_qty: u64) -> RuntimeConfig {
        RuntimeConfig::new("AAPL", quantity, max_position_qty, Duration::from_millis(5))
    }

    fn runtime_with(
        cfg: RuntimeConfig,
        cash: f64,
        notifier: Arc<dyn Notifier>,
    ) -> TradingRuntime {
        TradingRuntime::new(
            cfg,
            bars(),
            Box::new(SmaCross::new(2, 3).unwrap()),
            Box::new(PaperBroker::new(cash)),
            notifier,
        )
        .unwrap()
    }

    fn runtime(quantity: u64, max_position_qty: u64) -> TradingRuntime {
        runtime_with(config(quantity, max_position_qty), 10_000.0, Arc::new(NoopNotifier))
    }

    fn assert_consistent(s: &RuntimeStatus, max_position_qty: u64) {
        assert!(s.position_qty <= max_position_qty, "position {} over ceiling", s.position_qty);
        assert_eq!(s.equity, s.cash + s.position_qty as f64 * s.last_price);
        assert!(s.trades <= s.loop_count);
    }

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<String>>);

    impl Recorder {
        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send(&self, message: &str) -> Result<()> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn send(&self, _message: &str) -> Result<()> {
            Err(Error::Telegram("connection refused".into()))
        }
    }

    /// Never completes sends for signal alerts, wedging whoever awaits them.
    struct HangsOnSignal;

    #[async_trait]
    impl Notifier for HangsOnSignal {
        async fn send(&self, message: &str) -> Result<()> {
            if message.starts_with("[SIGNAL]") {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[test]
    fn construction_rejects_invalid_configuration() {
        let build = |cfg: RuntimeConfig, bars: Vec<Bar>| {
            TradingRuntime::new(
                cfg,
                bars,
                Box::new(SmaCross::new(2, 3).unwrap()),
                Box::new(PaperBroker::new(1_000.0)),
                Arc::new(NoopNotifier),
            )
        };

        assert!(build(config(1, 1), Vec::new()).is_err());
        assert!(build(config(0, 1), bars()).is_err());
        assert!(build(config(2, 1), bars()).is_err());
        assert!(build(RuntimeConfig::new("AAPL", 1, 1, Duration::ZERO), bars()).is_err());
        assert!(build(RuntimeConfig::new(" ", 1, 1, Duration::from_secs(1)), bars()).is_err());
        assert!(build(config(1, 1), bars()).is_ok());
    }

    #[tokio::test]
    async fn construction_rejects_position_already_over_ceiling() {
        let mut broker = PaperBroker::new(1_000.0);
        broker
            .submit_order(&Order::market("AAPL", OrderSide::Buy, 3), 10.0, "t0")
            .await
            .unwrap();

        let result = TradingRuntime::new(
            config(1, 2),
            bars(),
            Box::new(SmaCross::new(2, 3).unwrap()),
            Box::new(broker),
            Arc::new(NoopNotifier),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn initial_status_reflects_broker() {
        let rt = runtime(1, 1);
        let s = rt.status().await;
        assert!(!s.running);
        assert!(!s.paused);
        assert_eq!(s.symbol, "AAPL");
        assert_eq!(s.cash, 10_000.0);
        assert_eq!(s.equity, 10_000.0);
        assert_eq!(s.loop_count, 0);
        assert_eq!(s.last_signal, Signal::Hold);
        assert!(s.started_at.is_none());
        assert!(s.last_error.is_empty());
    }

    #[tokio::test]
    async fn respects_ceiling_over_cyclic_replay() {
        let rt = runtime(1, 1);

        for i in 0..12u64 {
            let before = rt.status().await;
            let _ = rt.process_next_bar().await;
            let after = rt.status().await;

            assert_eq!(after.loop_count, before.loop_count + 1, "bar {i}");
            assert!(after.trades >= before.trades);
            assert_consistent(&after, 1);
        }

        let s = rt.status().await;
        assert_eq!(s.loop_count, 12);
        // Bar 12 is the 4th bar of the second pass.
        assert_eq!(s.last_bar_timestamp, "2026-01-04T00:00:00Z");
    }

    #[tokio::test]
    async fn buy_fill_updates_snapshot() {
        let rt = runtime(1, 1);
        rt.process_next_bar().await.unwrap();
        rt.process_next_bar().await.unwrap();
        let report = rt.process_next_bar().await.unwrap();

        assert_eq!(report.signal, Signal::Buy);
        let fill = report.fill.expect("buy should fill");
        assert_eq!(fill.price, 102.0);

        let s = rt.status().await;
        assert_eq!(s.trades, 1);
        assert_eq!(s.position_qty, 1);
        assert_eq!(s.cash, 10_000.0 - 102.0);
        assert_eq!(s.equity, 10_000.0);
        assert_eq!(s.last_signal, Signal::Buy);
    }

    #[tokio::test]
    async fn sell_without_position_is_skipped() {
        // Falling prices: the first directional signal is a SELL.
        let falling: Vec<Bar> = [10.0, 9.0, 8.0]
            .iter()
            .map(|&close| Bar {
                symbol: "AAPL".into(),
                timestamp: format!("t{close}"),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        let rt = TradingRuntime::new(
            config(1, 1),
            falling,
            Box::new(SmaCross::new(2, 3).unwrap()),
            Box::new(PaperBroker::new(100.0)),
            Arc::new(NoopNotifier),
        )
        .unwrap();

        rt.process_next_bar().await.unwrap();
        rt.process_next_bar().await.unwrap();
        let report = rt.process_next_bar().await.unwrap();

        assert_eq!(report.signal, Signal::Sell);
        assert_eq!(report.skip, Some(SkipReason::NotEnoughHeld { held: 0 }));
        let s = rt.status().await;
        assert_eq!(s.skipped, 1);
        assert_eq!(s.trades, 0);
    }

    #[tokio::test]
    async fn rejected_order_is_recorded_and_bar_still_counts() {
        let rt = runtime_with(config(1, 1), 50.0, Arc::new(NoopNotifier));
        rt.process_next_bar().await.unwrap();
        rt.process_next_bar().await.unwrap();

        let err = rt.process_next_bar().await.unwrap_err();
        assert!(matches!(err, Error::InsufficientCash { .. }));

        let s = rt.status().await;
        assert_eq!(s.loop_count, 3);
        assert_eq!(s.trades, 0);
        assert_eq!(s.cash, 50.0);
        assert!(s.last_error.contains("insufficient cash"));
        assert_consistent(&s, 1);
    }

    #[tokio::test]
    async fn signal_is_announced_before_fill() {
        let recorder = Arc::new(Recorder::default());
        let rt = runtime_with(config(1, 1), 10_000.0, recorder.clone());

        for _ in 0..3 {
            rt.process_next_bar().await.unwrap();
        }

        assert_eq!(
            recorder.messages(),
            vec![
                "[SIGNAL] AAPL BUY | price=102.00 | ts=2026-01-03T00:00:00Z".to_string(),
                "[FILL] BUY 1 AAPL @ 102.00".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn skip_is_announced_after_signal() {
        let recorder = Arc::new(Recorder::default());
        let falling: Vec<Bar> = [10.0, 9.0, 8.0]
            .iter()
            .map(|&close| Bar {
                symbol: "AAPL".into(),
                timestamp: format!("t{close}"),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        let rt = TradingRuntime::new(
            config(1, 1),
            falling,
            Box::new(SmaCross::new(2, 3).unwrap()),
            Box::new(PaperBroker::new(100.0)),
            recorder.clone(),
        )
        .unwrap();

        for _ in 0..3 {
            rt.process_next_bar().await.unwrap();
        }

        assert_eq!(
            recorder.messages(),
            vec![
                "[SIGNAL] AAPL SELL | price=8.00 | ts=t8".to_string(),
                "[SKIP] AAPL SELL blocked, nothing to sell (current=0)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failing_notifier_never_disturbs_trading() {
        let rt = runtime_with(config(1, 1), 10_000.0, Arc::new(Failing));

        rt.pause().await;
        rt.resume().await;
        for _ in 0..8 {
            rt.process_next_bar().await.unwrap();
        }
        rt.stop().await;

        let s = rt.status().await;
        assert_eq!(s.loop_count, 8);
        assert_eq!(s.trades, 3);
        assert!(s.last_error.is_empty());
        assert!(!s.running);
    }

    #[tokio::test]
    async fn pause_then_resume_only_touches_flag() {
        let rt = runtime(1, 1);
        for _ in 0..4 {
            rt.process_next_bar().await.unwrap();
        }
        let before = rt.status().await;

        rt.pause().await;
        let paused = rt.status().await;
        assert!(paused.paused);
        assert_eq!(RuntimeStatus { paused: false, ..paused }, before);

        rt.resume().await;
        assert_eq!(rt.status().await, before);
    }

    #[tokio::test]
    async fn pause_is_idempotent() {
        let recorder = Arc::new(Recorder::default());
        let rt = runtime_with(config(1, 1), 10_000.0, recorder.clone());

        rt.pause().await;
        let once = rt.status().await;
        rt.pause().await;

        assert_eq!(rt.status().await, once);
        assert_eq!(recorder.messages(), vec!["[PAUSE] AAPL bot paused".to_string()]);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_terminal() {
        let recorder = Arc::new(Recorder::default());
        let rt = runtime_with(config(1, 1), 10_000.0, recorder.clone());
        assert!(rt.start().await);

        rt.stop().await;
        let once = rt.status().await;
        rt.stop().await;
        let twice = rt.status().await;

        assert_eq!(once, twice);
        assert!(!twice.running);
        assert_eq!(
            recorder.messages().iter().filter(|m| m.starts_with("[STOP]")).count(),
            1
        );

        // Nothing mutates state after stop.
        assert!(matches!(rt.process_next_bar().await, Err(Error::RuntimeStopped)));
        rt.pause().await;
        assert!(!rt.start().await);
        assert_eq!(rt.status().await, twice);
    }

    #[tokio::test]
    async fn start_twice_spawns_one_worker() {
        let rt = runtime(1, 1);
        assert!(rt.start().await);
        assert!(!rt.start().await);

        let s = rt.status().await;
        assert!(s.running);
        assert!(s.started_at.is_some());
        rt.stop().await;
    }

    #[tokio::test]
    async fn worker_processes_bars_until_stopped() {
        let rt = runtime(1, 1);
        rt.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        rt.stop().await;

        let stopped = rt.status().await;
        assert!(stopped.loop_count > 0);
        assert_consistent(&stopped, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rt.status().await.loop_count, stopped.loop_count);
    }

    #[tokio::test]
    async fn worker_keeps_ticking_after_rejected_order() {
        let rt = runtime_with(config(1, 1), 10.0, Arc::new(NoopNotifier));
        rt.start().await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let s = rt.status().await;
        assert!(s.running);
        assert!(s.loop_count > 3, "worker stalled at {}", s.loop_count);
        assert!(s.last_error.contains("insufficient cash"));
        assert_eq!(s.trades, 0);
        assert_eq!(s.cash, 10.0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rt.status().await.loop_count > s.loop_count);
        rt.stop().await;
    }

    #[tokio::test]
    async fn paused_worker_processes_nothing() {
        let rt = runtime(1, 1);
        rt.start().await;
        rt.pause().await;
        let at_pause = rt.status().await.loop_count;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rt.status().await.loop_count, at_pause);

        rt.resume().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rt.status().await.loop_count > at_pause);
        rt.stop().await;
    }

    #[tokio::test]
    async fn stop_returns_even_if_worker_is_wedged() {
        let cfg = config(1, 1).with_join_timeout(Duration::from_millis(100));
        let rt = runtime_with(cfg, 10_000.0, Arc::new(HangsOnSignal));
        rt.start().await;

        // Third bar emits BUY; the worker then hangs on the signal alert.
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(2), rt.stop())
            .await
            .expect("stop must not block on a wedged worker");
        assert!(!rt.status().await.running);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_see_consistent_snapshots() {
        let rt = runtime(2, 4);
        let mut tasks = Vec::new();

        for _ in 0..4 {
            let rt = rt.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    let _ = rt.process_next_bar().await;
                }
            }));
        }
        for _ in 0..2 {
            let rt = rt.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    assert_consistent(&rt.status().await, 4);
                    if i % 2 == 0 {
                        rt.pause().await;
                    } else {
                        rt.resume().await;
                    }
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let s = rt.status().await;
        assert_eq!(s.loop_count, 100);
        assert_consistent(&s, 4);
    }
}
