use std::collections::VecDeque;

use tracing::debug;

use common::{Error, Result, Signal};

use crate::Strategy;

/// Simple moving-average crossover.
///
/// Keeps the last `long_window` closes. Returns HOLD until the buffer is
/// full, then compares the short and long averages. A directional signal is
/// only emitted when it differs from the previous directional signal, so two
/// consecutive crossings in the same direction produce a single BUY or SELL.
#[derive(Debug, Clone)]
pub struct SmaCross {
    name: String,
    short_window: usize,
    long_window: usize,
    prices: VecDeque<f64>,
    last_signal: Signal,
}

impl SmaCross {
    pub fn new(short_window: usize, long_window: usize) -> Result<Self> {
        if short_window == 0 || long_window == 0 {
            return Err(Error::InvalidStrategy("window sizes must be positive".into()));
        }
        if short_window >= long_window {
            return Err(Error::InvalidStrategy(format!(
                "short_window ({short_window}) must be smaller than long_window ({long_window})"
            )));
        }
        Ok(Self {
            name: format!("SMA {short_window}/{long_window}"),
            short_window,
            long_window,
            prices: VecDeque::with_capacity(long_window),
            last_signal: Signal::Hold,
        })
    }

    fn averages(&self) -> (f64, f64) {
        let long_sma = self.prices.iter().sum::<f64>() / self.long_window as f64;
        let short_sma = self
            .prices
            .iter()
            .skip(self.long_window - self.short_window)
            .sum::<f64>()
            / self.short_window as f64;
        (short_sma, long_sma)
    }
}

impl Strategy for SmaCross {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_price(&mut self, price: f64) -> Signal {
        if self.prices.len() == self.long_window {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
        if self.prices.len() < self.long_window {
            return Signal::Hold;
        }

        let (short_sma, long_sma) = self.averages();
        let signal = if short_sma > long_sma && self.last_signal != Signal::Buy {
            Signal::Buy
        } else if short_sma < long_sma && self.last_signal != Signal::Sell {
            Signal::Sell
        } else {
            Signal::Hold
        };

        if signal != Signal::Hold {
            debug!(strategy = %self.name, short_sma, long_sma, %signal, "Crossover");
            self.last_signal = signal;
        }
        signal
    }
}
