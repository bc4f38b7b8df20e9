use super::{InFlight, RiskManager};
use crate::domain::{OrderEvent, Portfolio};

/// Accepts every order unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughRiskManager;

impl RiskManager for PassThroughRiskManager {
    fn refine_orders(
        &self,
        _portfolio: &Portfolio,
        _in_flight: &InFlight,
        order: OrderEvent,
    ) -> Vec<OrderEvent> {
        vec![order]
    }

    fn name(&self) -> &str {
        "PassThrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Price};

    #[test]
    fn returns_order_unchanged() {
        let order = OrderEvent::new("AAA", Action::Buy, 42).unwrap();
        let refined = PassThroughRiskManager.refine_orders(
            &Portfolio::new(Price::from_units(1)),
            &InFlight::new(),
            order.clone(),
        );
        assert_eq!(refined, vec![order]);
    }
}
