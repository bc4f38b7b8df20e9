use super::{InFlight, RiskManager};
use crate::domain::{Action, OrderEvent, Portfolio};
use tracing::warn;

/// Drops SELL orders that would leave an instrument net short once every
/// order already in flight has filled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongOnlyRiskManager;

impl RiskManager for LongOnlyRiskManager {
    fn refine_orders(
        &self,
        portfolio: &Portfolio,
        in_flight: &InFlight,
        order: OrderEvent,
    ) -> Vec<OrderEvent> {
        if order.action == Action::Sell {
            let held = portfolio.net_quantity(&order.symbol);
            let pending = in_flight.net_quantity(&order.symbol);
            let after = held as i128 + pending as i128 - order.quantity.get() as i128;
            if after < 0 {
                warn!(
                    symbol = %order.symbol,
                    held,
                    pending,
                    quantity = order.quantity.get(),
                    "vetoed sell that would go net short"
                );
                return Vec::new();
            }
        }
        vec![order]
    }

    fn name(&self) -> &str {
        "LongOnly"
    }
}
