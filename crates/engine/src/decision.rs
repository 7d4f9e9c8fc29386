use common::{OrderSide, Signal};

/// What to do with a signal given the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Submit(OrderSide),
    Skip(SkipReason),
}

/// Why a directional signal was not turned into an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Buying `quantity` more would push the position past the ceiling.
    CeilingReached { current: u64, max: u64 },
    /// Less than one order's worth is held, so there is nothing to sell.
    NotEnoughHeld { held: u64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::CeilingReached { current, max } => {
                write!(f, "BUY blocked by max_position_qty={max} (current={current})")
            }
            SkipReason::NotEnoughHeld { held } => {
                write!(f, "SELL blocked, nothing to sell (current={held})")
            }
        }
    }
}

/// Apply the position rules to `signal`.
///
/// BUY only when `position + quantity <= max_position`; SELL only when at
/// least `quantity` is held.
pub fn decide(signal: Signal, position: u64, quantity: u64, max_position: u64) -> Decision {
    match signal {
        Signal::Hold => Decision::Hold,
        Signal::Buy => match position.checked_add(quantity) {
            Some(after) if after <= max_position => Decision::Submit(OrderSide::Buy),
            _ => Decision::Skip(SkipReason::CeilingReached {
                current: position,
                max: max_position,
            }),
        },
        Signal::Sell if position >= quantity => Decision::Submit(OrderSide::Sell),
        Signal::Sell => Decision::Skip(SkipReason::NotEnoughHeld { held: position }),
    }
}
