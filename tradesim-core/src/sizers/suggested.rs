//! Sizer that honours the strategy's suggested quantity.

use super::{check_suggestion, PositionSizer, SizingError};
use crate::domain::{OrderEvent, Portfolio, SignalEvent};
use std::num::NonZeroU64;

/// Uses the signal's suggested quantity, falling back to `default_quantity`
/// when the strategy left sizing to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestedSizer {
    default_quantity: NonZeroU64,
}

impl SuggestedSizer {
    pub fn new(default_quantity: u64) -> Result<Self, SizingError> {
        NonZeroU64::new(default_quantity)
            .map(|default_quantity| Self { default_quantity })
            .ok_or(SizingError::ZeroQuantity)
    }
}

impl PositionSizer for SuggestedSizer {
    fn size_order(
        &self,
        _portfolio: &Portfolio,
        signal: &SignalEvent,
    ) -> Result<OrderEvent, SizingError> {
        let quantity = check_suggestion(signal)?
            .and_then(NonZeroU64::new)
            .unwrap_or(self.default_quantity);
        Ok(OrderEvent {
            symbol: signal.symbol.clone(),
            action: signal.action,
            quantity,
        })
    }

    fn name(&self) -> &str {
        "Suggested"
    }
}
