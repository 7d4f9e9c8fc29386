use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use common::{Broker, Error, Fill, Order, OrderSide, Result};

/// Simulated broker for paper trading.
///
/// Fills every order at the price it is given. Keeps one cash balance and an
/// integer position per symbol; no real orders are ever sent anywhere.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    /// Simulated balance in USD.
    cash: f64,
    /// Held quantity per symbol.
    positions: HashMap<String, u64>,
}

impl PaperBroker {
    pub fn new(initial_cash_usd: f64) -> Self {
        info!(cash = initial_cash_usd, "PaperBroker initialized");
        Self {
            cash: initial_cash_usd,
            positions: HashMap::new(),
        }
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn submit_order(&mut self, order: &Order, price: f64, timestamp: &str) -> Result<Fill> {
        let notional = order.qty as f64 * price;
        let held = self.position_qty(&order.symbol);

        // A rejection leaves cash and positions untouched.
        match order.side {
            OrderSide::Buy => {
                if notional > self.cash {
                    return Err(Error::InsufficientCash {
                        need: notional,
                        have: self.cash,
                    });
                }
                self.cash -= notional;
                self.positions.insert(order.symbol.clone(), held + order.qty);
            }
            OrderSide::Sell => {
                if held < order.qty {
                    return Err(Error::InsufficientPosition {
                        requested: order.qty,
                        held,
                    });
                }
                self.cash += notional;
                self.positions.insert(order.symbol.clone(), held - order.qty);
            }
        }

        debug!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            qty = order.qty,
            price,
            cash = self.cash,
            "Paper fill simulated"
        );

        Ok(Fill {
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.qty,
            price,
            timestamp: timestamp.to_string(),
        })
    }

    fn cash_balance(&self) -> f64 {
        self.cash
    }

    fn position_qty(&self, symbol: &str) -> u64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }
}
