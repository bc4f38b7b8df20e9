//! Fixed position sizer: every order has the same quantity.

use super::{check_suggestion, PositionSizer, SizingError};
use crate::domain::{OrderEvent, Portfolio, SignalEvent};
use std::num::NonZeroU64;

/// Trades a constant quantity, ignoring the portfolio and any suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizer {
    quantity: NonZeroU64,
}

impl FixedSizer {
    pub fn new(quantity: u64) -> Result<Self, SizingError> {
        NonZeroU64::new(quantity)
            .map(|quantity| Self { quantity })
            .ok_or(SizingError::ZeroQuantity)
    }

    pub fn quantity(&self) -> u64 {
        self.quantity.get()
    }
}

impl PositionSizer for FixedSizer {
    fn size_order(
        &self,
        _portfolio: &Portfolio,
        signal: &SignalEvent,
    ) -> Result<OrderEvent, SizingError> {
        check_suggestion(signal)?;
        Ok(OrderEvent {
            symbol: signal.symbol.clone(),
            action: signal.action,
            quantity: self.quantity,
        })
    }

    fn name(&self) -> &str {
        "Fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Price};

    #[test]
    fn ignores_suggestion_and_portfolio() {
        let sizer = FixedSizer::new(100).unwrap();
        let portfolio = Portfolio::new(Price::from_units(10_000));
        let order = sizer
            .size_order(&portfolio, &SignalEvent::with_quantity("AAA", Action::Sell, 7))
            .unwrap();
        assert_eq!(order.quantity.get(), 100);
        assert_eq!(order.action, Action::Sell);
        assert_eq!(order.symbol, "AAA");
    }

    #[test]
    fn zero_suggestion_still_rejected() {
        let sizer = FixedSizer::new(100).unwrap();
        let portfolio = Portfolio::new(Price::from_units(10_000));
        let err = sizer
            .size_order(&portfolio, &SignalEvent::with_quantity("AAA", Action::Buy, 0))
            .unwrap_err();
        assert!(matches!(err, SizingError::ZeroSuggestion { .. }));
    }

    #[test]
    fn zero_quantity_rejected_at_construction() {
        assert_eq!(FixedSizer::new(0), Err(SizingError::ZeroQuantity));
    }
}
