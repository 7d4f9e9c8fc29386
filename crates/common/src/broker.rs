use async_trait::async_trait;

use crate::{Fill, Order, Result};

/// Abstraction over the venue that executes orders.
///
/// `PaperBroker` implements this for simulation, `VenueStub` stands in for a
/// real venue. Implementations need not be thread-safe: the trading runtime
/// owns its broker exclusively and only calls it while holding its lock.
#[async_trait]
pub trait Broker: Send {
    /// Execute `order` at `price`. On success cash and position change
    /// together; on failure neither changes.
    async fn submit_order(&mut self, order: &Order, price: f64, timestamp: &str) -> Result<Fill>;

    fn cash_balance(&self) -> f64;

    fn position_qty(&self, symbol: &str) -> u64;
}
