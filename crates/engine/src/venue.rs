use async_trait::async_trait;
use tracing::warn;

use common::{Broker, Error, Fill, Order, Result};

/// Placeholder for a real brokerage venue.
///
/// Reports zero balances and rejects every order. Lets the runtime and its
/// control surfaces be exercised end to end without a venue integration.
#[derive(Debug, Clone)]
pub struct VenueStub {
    venue: String,
}

impl VenueStub {
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
        }
    }
}

#[async_trait]
impl Broker for VenueStub {
    async fn submit_order(&mut self, order: &Order, _price: f64, _timestamp: &str) -> Result<Fill> {
        warn!(venue = %self.venue, order_id = %order.id, "Order sent to venue stub");
        Err(Error::Exchange(format!(
            "venue '{}' is not integrated, order {} {} {} not sent",
            self.venue, order.side, order.qty, order.symbol
        )))
    }

    fn cash_balance(&self) -> f64 {
        0.0
    }

    fn position_qty(&self, _symbol: &str) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use common::OrderSide;

    use super::*;

    #[tokio::test]
    async fn every_order_is_rejected() {
        let mut venue = VenueStub::new("alpaca");
        let order = Order::market("AAPL", OrderSide::Buy, 1);

        let err = venue.submit_order(&order, 100.0, "t1").await.unwrap_err();
        assert!(matches!(err, Error::Exchange(_)));
        assert!(err.to_string().contains("alpaca"));
        assert_eq!(venue.cash_balance(), 0.0);
        assert_eq!(venue.position_qty("AAPL"), 0);
    }
}
