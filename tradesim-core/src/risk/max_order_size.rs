//! Splits large orders into chunks no bigger than a fixed limit.

use super::{InFlight, RiskError, RiskManager};
use crate::domain::{OrderEvent, Portfolio};
use std::num::NonZeroU64;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxOrderSizeRiskManager {
    max_quantity: NonZeroU64,
}

impl MaxOrderSizeRiskManager {
    pub fn new(max_quantity: u64) -> Result<Self, RiskError> {
        NonZeroU64::new(max_quantity)
            .map(|max_quantity| Self { max_quantity })
            .ok_or(RiskError::ZeroLimit)
    }

    pub fn max_quantity(&self) -> u64 {
        self.max_quantity.get()
    }
}

impl RiskManager for MaxOrderSizeRiskManager {
    fn refine_orders(
        &self,
        _portfolio: &Portfolio,
        _in_flight: &InFlight,
        order: OrderEvent,
    ) -> Vec<OrderEvent> {
        let limit = self.max_quantity.get();
        let mut remaining = order.quantity.get();
        if remaining <= limit {
            return vec![order];
        }

        let mut chunks = Vec::with_capacity(remaining.div_ceil(limit) as usize);
        while let Some(quantity) = NonZeroU64::new(remaining.min(limit)) {
            chunks.push(OrderEvent {
                symbol: order.symbol.clone(),
                action: order.action,
                quantity,
            });
            remaining -= quantity.get();
        }
        debug!(
            symbol = %order.symbol,
            quantity = order.quantity.get(),
            chunks = chunks.len(),
            "split order"
        );
        chunks
    }

    fn name(&self) -> &str {
        "MaxOrderSize"
    }
}
