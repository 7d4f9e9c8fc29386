use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One historical OHLCV observation replayed by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    /// Source-provided timestamp. Opaque to the runtime; only echoed back in
    /// status snapshots and fills.
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// An order to be submitted to the broker. Always a market order at the
/// current bar's close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Correlation id for logs only.
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: u64,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: OrderSide, qty: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            side,
            qty,
        }
    }
}

/// Confirmation of a filled order returned by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: u64,
    pub price: f64,
    pub timestamp: String,
}

/// Output of a strategy for a single price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    /// The order side this signal asks for, `None` for HOLD.
    pub fn side(self) -> Option<OrderSide> {
        match self {
            Signal::Buy => Some(OrderSide::Buy),
            Signal::Sell => Some(OrderSide::Sell),
            Signal::Hold => None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

/// Point-in-time copy of the trading runtime's state.
///
/// Produced under the runtime lock, so every field belongs to the same
/// moment: `equity == cash + position_qty * last_price` holds for any value
/// handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub running: bool,
    pub paused: bool,
    pub symbol: String,
    /// Executed fills. Never decreases.
    pub trades: u64,
    /// Directional signals not acted on (position ceiling or nothing to sell).
    pub skipped: u64,
    pub cash: f64,
    pub position_qty: u64,
    pub last_price: f64,
    pub equity: f64,
    pub last_signal: Signal,
    pub last_bar_timestamp: String,
    /// Bars fully processed. Increments exactly once per bar.
    pub loop_count: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Empty when no error is pending.
    pub last_error: String,
}

impl RuntimeStatus {
    pub fn new(symbol: impl Into<String>, cash: f64, position_qty: u64) -> Self {
        Self {
            running: false,
            paused: false,
            symbol: symbol.into(),
            trades: 0,
            skipped: 0,
            cash,
            position_qty,
            last_price: 0.0,
            equity: cash,
            last_signal: Signal::Hold,
            last_bar_timestamp: String::new(),
            loop_count: 0,
            started_at: None,
            last_error: String::new(),
        }
    }

    /// Mark to market against `price`, keeping the equity identity intact.
    pub fn mark(&mut self, cash: f64, position_qty: u64, price: f64) {
        self.cash = cash;
        self.position_qty = position_qty;
        self.last_price = price;
        self.equity = cash + position_qty as f64 * price;
    }
}
