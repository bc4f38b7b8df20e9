//! Position sizers: turn a signal into a sized order.
//!
//! A sizer always yields an order with a positive quantity or an error. A
//! suggested quantity of zero is rejected by every sizer, including ones that
//! otherwise ignore the suggestion.

pub mod fixed;
pub mod suggested;

pub use fixed::FixedSizer;
pub use suggested::SuggestedSizer;

use crate::domain::{OrderEvent, Portfolio, SignalEvent};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingError {
    #[error("signal for '{symbol}' suggested a quantity of zero")]
    ZeroSuggestion { symbol: String },

    #[error("sizer quantity must be positive")]
    ZeroQuantity,
}

/// Position sizing logic.
///
/// Sizers may read the portfolio but never mutate it.
pub trait PositionSizer: Send + Sync {
    fn size_order(
        &self,
        portfolio: &Portfolio,
        signal: &SignalEvent,
    ) -> Result<OrderEvent, SizingError>;

    /// Sizer name for logging
    fn name(&self) -> &str;
}

/// Shared rejection of a zero suggestion.
pub fn check_suggestion(signal: &SignalEvent) -> Result<Option<u64>, SizingError> {
    match signal.suggested_quantity {
        Some(0) => Err(SizingError::ZeroSuggestion {
            symbol: signal.symbol.clone(),
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;

    #[test]
    fn zero_suggestion_is_rejected() {
        let signal = SignalEvent::with_quantity("AAA", Action::Buy, 0);
        assert_eq!(
            check_suggestion(&signal),
            Err(SizingError::ZeroSuggestion { symbol: "AAA".into() })
        );
        assert_eq!(check_suggestion(&SignalEvent::new("AAA", Action::Buy)), Ok(None));
    }
}
