//! Strategy boundary.
//!
//! Strategies see market events and may push signals. They are never handed
//! the portfolio: sizing and risk belong to the portfolio handler.

use crate::domain::{Action, Event, SignalEvent, Symbol};
use crate::engine::queue::EventQueue;

pub trait Strategy: Send {
    /// React to a Bar, Tick or Sentiment event.
    fn calculate_signals(&mut self, event: &Event, queue: &mut EventQueue);

    fn name(&self) -> &str;
}

/// Buys once on the first bar of its instrument, then holds.
#[derive(Debug, Clone)]
pub struct BuyAndHoldStrategy {
    symbol: Symbol,
    base_quantity: Option<u64>,
    invested: bool,
}

impl BuyAndHoldStrategy {
    /// `base_quantity` of `None` leaves sizing to the position sizer.
    pub fn new(symbol: impl Into<Symbol>, base_quantity: Option<u64>) -> Self {
        Self {
            symbol: symbol.into(),
            base_quantity,
            invested: false,
        }
    }

    pub fn invested(&self) -> bool {
        self.invested
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn calculate_signals(&mut self, event: &Event, queue: &mut EventQueue) {
        if self.invested {
            return;
        }
        let is_price = matches!(event, Event::Bar(_) | Event::Tick(_));
        if is_price && event.symbol() == self.symbol {
            let signal = match self.base_quantity {
                Some(quantity) => SignalEvent::with_quantity(self.symbol.clone(), Action::Buy, quantity),
                None => SignalEvent::new(self.symbol.clone(), Action::Buy),
            };
            queue.push(signal);
            self.invested = true;
        }
    }

    fn name(&self) -> &str {
        "BuyAndHold"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarEvent, Price, SentimentEvent};
    use chrono::NaiveDate;

    fn bar(symbol: &str) -> Event {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let p = Price::from_units(10);
        BarEvent::new(symbol, ts, 86400, p, p, p, p, 100, None).into()
    }

    #[test]
    fn buys_once_on_own_instrument() {
        let mut strategy = BuyAndHoldStrategy::new("AAA", Some(100));
        let mut q = EventQueue::new();

        strategy.calculate_signals(&bar("BBB"), &mut q);
        assert!(q.is_empty());

        strategy.calculate_signals(&bar("AAA"), &mut q);
        strategy.calculate_signals(&bar("AAA"), &mut q);
        assert_eq!(q.len(), 1);
        let Some(Event::Signal(signal)) = q.pop_nonblocking() else {
            panic!("expected signal");
        };
        assert_eq!(signal.action, Action::Buy);
        assert_eq!(signal.suggested_quantity, Some(100));
        assert!(strategy.invested());
    }

    #[test]
    fn ignores_sentiment() {
        let mut strategy = BuyAndHoldStrategy::new("AAA", None);
        let mut q = EventQueue::new();
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let sentiment = Event::Sentiment(SentimentEvent {
            symbol: "AAA".into(),
            timestamp: ts,
            score: 0.8,
        });
        strategy.calculate_signals(&sentiment, &mut q);
        assert!(q.is_empty());
    }
}
