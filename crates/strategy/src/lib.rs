pub mod sma_cross;

pub use sma_cross::SmaCross;

use common::Signal;

/// All strategy implementations must satisfy this trait.
///
/// A strategy is fed one closing price per bar, in bar order, by a single
/// consumer. It may keep any state it needs between calls.
pub trait Strategy: Send {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Consume the next closing price and decide what to do.
    fn on_price(&mut self, price: f64) -> Signal;
}
