//! Portfolio handler: the single writer of portfolio state.
//!
//! Signals are sized and risk-checked into orders, orders are filled against
//! the current quote, and fills are booked into the portfolio. Every step
//! communicates through the event queue.
//!
//! Orders between `on_signal` and their fill are tracked as in-flight
//! exposure so risk checks see what the queue is about to do.

use super::commission::CommissionModel;
use super::queue::EventQueue;
use crate::data::{PriceHandler, StreamError};
use crate::domain::{
    Action, FillEvent, OrderEvent, Portfolio, PortfolioError, Price, SignalEvent, Symbol,
    TransactOutcome,
};
use crate::risk::{InFlight, RiskManager};
use crate::sizers::{PositionSizer, SizingError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Venue tag on simulated fills.
pub const SIMULATED_VENUE: &str = "SIMULATED";

/// Reasons an order could not be filled.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("no quote: {0}")]
    NoQuote(#[from] StreamError),

    #[error("cost of {quantity} {symbol} at {price} overflows")]
    Overflow {
        symbol: Symbol,
        quantity: u64,
        price: Price,
    },
}

/// Counters for what the handler accepted and rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerStats {
    pub signals: u64,
    pub orders: u64,
    pub fills: u64,
    pub sizing_failures: u64,
    pub vetoed_signals: u64,
    pub unfilled_orders: u64,
    pub portfolio_errors: u64,
}

pub struct PortfolioHandler {
    portfolio: Portfolio,
    sizer: Box<dyn PositionSizer>,
    risk_manager: Box<dyn RiskManager>,
    commission: CommissionModel,
    in_flight: InFlight,
    stats: HandlerStats,
}

impl PortfolioHandler {
    pub fn new(
        portfolio: Portfolio,
        sizer: Box<dyn PositionSizer>,
        risk_manager: Box<dyn RiskManager>,
        commission: CommissionModel,
    ) -> Self {
        Self {
            portfolio,
            sizer,
            risk_manager,
            commission,
            in_flight: InFlight::new(),
            stats: HandlerStats::default(),
        }
    }

    /// Size and refine a signal, pushing the resulting orders.
    ///
    /// Returns how many orders were queued. Zero means the risk manager
    /// vetoed the signal.
    pub fn on_signal(
        &mut self,
        signal: &SignalEvent,
        queue: &mut EventQueue,
    ) -> Result<usize, SizingError> {
        self.stats.signals += 1;
        let order = match self.sizer.size_order(&self.portfolio, signal) {
            Ok(order) => order,
            Err(e) => {
                warn!(symbol = %signal.symbol, sizer = self.sizer.name(), error = %e, "sizing failed");
                self.stats.sizing_failures += 1;
                return Err(e);
            }
        };

        let orders = self
            .risk_manager
            .refine_orders(&self.portfolio, &self.in_flight, order);
        if orders.is_empty() {
            debug!(symbol = %signal.symbol, risk = self.risk_manager.name(), "signal vetoed");
            self.stats.vetoed_signals += 1;
        }
        let count = orders.len();
        for order in orders {
            self.stats.orders += 1;
            self.in_flight
                .commit(&order.symbol, order.action, order.quantity.get());
            queue.push(order);
        }
        Ok(count)
    }

    /// Simulate an immediate fill: BUY at the ask, SELL at the bid.
    ///
    /// Orders whose notional or commission would overflow a `Price` are
    /// left unfilled.
    pub fn on_order(
        &mut self,
        order: &OrderEvent,
        prices: &dyn PriceHandler,
        queue: &mut EventQueue,
    ) -> Result<FillEvent, FillError> {
        match self.simulate_fill(order, prices) {
            Ok(fill) => {
                queue.push(fill.clone());
                Ok(fill)
            }
            Err(e) => {
                warn!(symbol = %order.symbol, error = %e, "order left unfilled");
                self.stats.unfilled_orders += 1;
                self.in_flight
                    .release(&order.symbol, order.action, order.quantity.get());
                Err(e)
            }
        }
    }

    fn simulate_fill(
        &self,
        order: &OrderEvent,
        prices: &dyn PriceHandler,
    ) -> Result<FillEvent, FillError> {
        let (bid, ask) = prices.best_bid_ask(&order.symbol)?;
        let timestamp = prices.last_timestamp(&order.symbol)?;
        let price = match order.action {
            Action::Buy => ask,
            Action::Sell => bid,
        };

        let quantity = order.quantity.get();
        let overflow = || FillError::Overflow {
            symbol: order.symbol.clone(),
            quantity,
            price,
        };
        let notional = i64::try_from(quantity)
            .ok()
            .and_then(|q| price.checked_times(q))
            .ok_or_else(overflow)?;
        let commission = self.commission.compute(quantity, price).ok_or_else(overflow)?;
        notional
            .abs()
            .checked_add(commission.abs())
            .ok_or_else(overflow)?;

        Ok(FillEvent {
            timestamp,
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: order.quantity,
            venue: SIMULATED_VENUE.to_string(),
            price,
            commission,
        })
    }

    /// Book a fill into the portfolio.
    pub fn on_fill(
        &mut self,
        fill: &FillEvent,
        prices: &dyn PriceHandler,
    ) -> Result<TransactOutcome, PortfolioError> {
        self.in_flight
            .release(&fill.symbol, fill.action, fill.quantity.get());
        match self.portfolio.transact_position(fill, prices) {
            Ok(outcome) => {
                self.stats.fills += 1;
                Ok(outcome)
            }
            Err(e) => {
                warn!(symbol = %fill.symbol, error = %e, "fill rejected by portfolio");
                self.stats.portfolio_errors += 1;
                Err(e)
            }
        }
    }

    pub fn mark_to_market(&mut self, prices: &dyn PriceHandler) {
        self.portfolio.mark_to_market(prices);
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Orders queued but not yet booked.
    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn stats(&self) -> HandlerStats {
        self.stats
    }

    pub fn commission(&self) -> CommissionModel {
        self.commission
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }
}
