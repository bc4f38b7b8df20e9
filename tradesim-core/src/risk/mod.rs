//! Risk managers: the last veto point between a sized order and the market.
//!
//! `refine_orders` may pass an order through, split it, or drop it entirely
//! by returning an empty list. Orders are judged against filled holdings and
//! against orders already queued but not yet filled.

pub mod long_only;
pub mod max_order_size;
pub mod pass_through;

pub use long_only::LongOnlyRiskManager;
pub use max_order_size::MaxOrderSizeRiskManager;
pub use pass_through::PassThroughRiskManager;

use crate::domain::{Action, OrderEvent, Portfolio, Symbol};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    #[error("maximum order size must be positive")]
    ZeroLimit,
}

/// Signed quantity of orders that have been queued but not yet filled,
/// per instrument. BUY counts positive, SELL negative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InFlight {
    net: HashMap<Symbol, i64>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn net_quantity(&self, symbol: &str) -> i64 {
        self.net.get(symbol).copied().unwrap_or(0)
    }

    /// Record an order as committed.
    pub fn commit(&mut self, symbol: &str, action: Action, quantity: u64) {
        self.apply(symbol, signed(action, quantity));
    }

    /// Release a commitment once its fill is booked or it can no longer fill.
    pub fn release(&mut self, symbol: &str, action: Action, quantity: u64) {
        self.apply(symbol, -signed(action, quantity));
    }

    pub fn is_empty(&self) -> bool {
        self.net.is_empty()
    }

    fn apply(&mut self, symbol: &str, delta: i64) {
        let entry = self.net.entry(symbol.to_string()).or_insert(0);
        *entry = entry.saturating_add(delta);
        if *entry == 0 {
            self.net.remove(symbol);
        }
    }
}

fn signed(action: Action, quantity: u64) -> i64 {
    let quantity = i64::try_from(quantity).unwrap_or(i64::MAX);
    match action {
        Action::Buy => quantity,
        Action::Sell => -quantity,
    }
}

pub trait RiskManager: Send + Sync {
    fn refine_orders(
        &self,
        portfolio: &Portfolio,
        in_flight: &InFlight,
        order: OrderEvent,
    ) -> Vec<OrderEvent>;

    fn name(&self) -> &str;
}
