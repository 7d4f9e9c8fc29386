pub mod backtest;
pub mod decision;
pub mod runtime;
pub mod venue;

pub use backtest::{run_backtest, BacktestReport};
pub use decision::{decide, Decision, SkipReason};
pub use runtime::{RuntimeConfig, TickReport, TradingRuntime, DEFAULT_JOIN_TIMEOUT, PAUSE_POLL_INTERVAL};
pub use venue::VenueStub;
