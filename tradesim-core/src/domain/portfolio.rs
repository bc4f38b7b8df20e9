//! Portfolio: cash, open positions, closed positions and equity.
//!
//! Equity is `initial_cash + realized_pnl + Σ unrealized_pnl` and is
//! recomputed from scratch after every mutation. Because positions carry PnL
//! net of commission, this always equals `cash + Σ market_value` exactly.

use super::event::{Action, FillEvent};
use super::position::{ClosedPosition, Position, PositionError};
use super::price::Price;
use super::Symbol;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU64;
use thiserror::Error;
use tracing::{debug, warn};

/// Source of current bid/ask quotes used for mark-to-market.
pub trait MarketQuotes {
    /// Best bid and ask for `symbol`, or `None` if no quote is available.
    fn quote(&self, symbol: &str) -> Option<(Price, Price)>;
}

/// Fixed quotes keyed by symbol. Useful when no price stream is attached.
#[derive(Debug, Clone, Default)]
pub struct StaticQuotes {
    quotes: HashMap<Symbol, (Price, Price)>,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bid == ask == `price` for `symbol`.
    pub fn set(&mut self, symbol: impl Into<Symbol>, price: Price) {
        self.quotes.insert(symbol.into(), (price, price));
    }

    pub fn set_bid_ask(&mut self, symbol: impl Into<Symbol>, bid: Price, ask: Price) {
        self.quotes.insert(symbol.into(), (bid, ask));
    }
}

impl MarketQuotes for StaticQuotes {
    fn quote(&self, symbol: &str) -> Option<(Price, Price)> {
        self.quotes.get(symbol).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortfolioError {
    #[error("'{symbol}' already has an open position; cannot add another")]
    AlreadyOpen { symbol: Symbol },

    #[error("'{symbol}' has no open position to modify")]
    NotOpen { symbol: Symbol },

    #[error(transparent)]
    Position(#[from] PositionError),
}

/// What a fill did to the instrument's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactOutcome {
    Opened,
    Increased,
    Reduced,
    Closed,
    /// Closed the existing position and opened one on the other side.
    Reversed,
}

/// Serializable point-in-time summary of portfolio money state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub initial_cash: Price,
    pub cash: Price,
    pub equity: Price,
    pub realized_pnl: Price,
    pub unrealized_pnl: Price,
    pub total_commission: Price,
    pub open_positions: usize,
    pub closed_positions: usize,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_cash: Price,
    cash: Price,
    positions: BTreeMap<Symbol, Position>,
    closed_positions: Vec<ClosedPosition>,
    /// Realized PnL folded in from retired positions.
    closed_realized_pnl: Price,
    realized_pnl: Price,
    unrealized_pnl: Price,
    equity: Price,
    total_commission: Price,
}

impl Portfolio {
    pub fn new(initial_cash: Price) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            closed_positions: Vec::new(),
            closed_realized_pnl: Price::ZERO,
            realized_pnl: Price::ZERO,
            unrealized_pnl: Price::ZERO,
            equity: initial_cash,
            total_commission: Price::ZERO,
        }
    }

    /// Apply a fill: adjust cash, open/modify/close the position, recompute equity.
    ///
    /// A fill that crosses zero is split into a closing leg (carrying the whole
    /// commission) and an opening leg for the remainder.
    pub fn transact_position<Q: MarketQuotes + ?Sized>(
        &mut self,
        fill: &FillEvent,
        quotes: &Q,
    ) -> Result<TransactOutcome, PortfolioError> {
        let held = self.positions.get(&fill.symbol).map(Position::quantity);

        let outcome = match held {
            None => {
                self.add_position(
                    fill.action,
                    &fill.symbol,
                    fill.quantity,
                    fill.price,
                    fill.commission,
                    fill.timestamp,
                    quotes,
                )?;
                TransactOutcome::Opened
            }
            Some(held) => {
                let signed = fill.action.sign() * fill.quantity.get() as i64;
                let crosses = held.signum() != signed.signum() && signed.abs() > held.abs();
                if crosses {
                    let closing = NonZeroU64::new(held.unsigned_abs())
                        .ok_or_else(|| PortfolioError::NotOpen {
                            symbol: fill.symbol.clone(),
                        })?;
                    let remainder = NonZeroU64::new(fill.quantity.get() - held.unsigned_abs())
                        .ok_or_else(|| PortfolioError::NotOpen {
                            symbol: fill.symbol.clone(),
                        })?;
                    self.modify_position(
                        fill.action,
                        &fill.symbol,
                        closing,
                        fill.price,
                        fill.commission,
                        fill.timestamp,
                        quotes,
                    )?;
                    self.add_position(
                        fill.action,
                        &fill.symbol,
                        remainder,
                        fill.price,
                        Price::ZERO,
                        fill.timestamp,
                        quotes,
                    )?;
                    TransactOutcome::Reversed
                } else {
                    self.modify_position(
                        fill.action,
                        &fill.symbol,
                        fill.quantity,
                        fill.price,
                        fill.commission,
                        fill.timestamp,
                        quotes,
                    )?
                }
            }
        };

        let notional = fill.notional();
        match fill.action {
            Action::Buy => self.cash -= notional + fill.commission,
            Action::Sell => self.cash += notional - fill.commission,
        }
        self.total_commission += fill.commission;
        self.update_portfolio();

        debug!(
            symbol = %fill.symbol,
            action = %fill.action,
            quantity = fill.quantity.get(),
            price = %fill.price,
            ?outcome,
            equity = %self.equity,
            "fill applied"
        );
        Ok(outcome)
    }

    /// Open a new position. Fails without mutation if one is already open.
    ///
    /// Does not touch cash; [`Portfolio::transact_position`] owns cash.
    #[allow(clippy::too_many_arguments)]
    pub fn add_position<Q: MarketQuotes + ?Sized>(
        &mut self,
        action: Action,
        symbol: &str,
        quantity: NonZeroU64,
        price: Price,
        commission: Price,
        timestamp: NaiveDateTime,
        quotes: &Q,
    ) -> Result<(), PortfolioError> {
        if self.positions.contains_key(symbol) {
            warn!(symbol, "position already open; refusing to add another");
            return Err(PortfolioError::AlreadyOpen {
                symbol: symbol.to_string(),
            });
        }
        let (bid, ask) = quote_or_fill_price(quotes, symbol, price);
        let position = Position::open(symbol, action, quantity, price, commission, bid, ask, timestamp);
        self.positions.insert(symbol.to_string(), position);
        self.update_portfolio();
        Ok(())
    }

    /// Apply a fill to an existing open position, retiring it if it goes flat.
    /// Fails without mutation if none is open or the fill would cross zero.
    #[allow(clippy::too_many_arguments)]
    pub fn modify_position<Q: MarketQuotes + ?Sized>(
        &mut self,
        action: Action,
        symbol: &str,
        quantity: NonZeroU64,
        price: Price,
        commission: Price,
        timestamp: NaiveDateTime,
        quotes: &Q,
    ) -> Result<TransactOutcome, PortfolioError> {
        let Some(position) = self.positions.get_mut(symbol) else {
            warn!(symbol, "no open position; refusing to modify");
            return Err(PortfolioError::NotOpen {
                symbol: symbol.to_string(),
            });
        };

        let before = position.quantity();
        if let Err(e) = position.transact(action, quantity, price, commission, timestamp) {
            warn!(symbol, error = %e, "position rejected fill");
            return Err(e.into());
        }
        let (bid, ask) = quote_or_fill_price(quotes, symbol, price);
        position.update_market_value(bid, ask);
        let after = position.quantity();

        let outcome = if after == 0 {
            self.retire(symbol)?;
            TransactOutcome::Closed
        } else if after.abs() > before.abs() {
            TransactOutcome::Increased
        } else {
            TransactOutcome::Reduced
        };

        self.update_portfolio();
        Ok(outcome)
    }

    /// Re-mark every open position and recompute equity.
    ///
    /// Positions without a current quote keep their previous mark.
    pub fn mark_to_market<Q: MarketQuotes + ?Sized>(&mut self, quotes: &Q) {
        for (symbol, position) in self.positions.iter_mut() {
            match quotes.quote(symbol) {
                Some((bid, ask)) => position.update_market_value(bid, ask),
                None => debug!(symbol = %symbol, "no quote; keeping previous mark"),
            }
        }
        self.update_portfolio();
    }

    /// Equity recomputed from the current fields without mutating anything.
    pub fn computed_equity(&self) -> Price {
        let open_realized: Price = self.positions.values().map(Position::realized_pnl).sum();
        let unrealized: Price = self.positions.values().map(Position::unrealized_pnl).sum();
        self.initial_cash + self.closed_realized_pnl + open_realized + unrealized
    }

    /// `cash + Σ market value`: must always equal [`Portfolio::equity`].
    pub fn net_liquidation_value(&self) -> Price {
        self.cash + self.market_value()
    }

    pub fn market_value(&self) -> Price {
        self.positions.values().map(Position::market_value).sum()
    }

    fn retire(&mut self, symbol: &str) -> Result<(), PortfolioError> {
        let Some(position) = self.positions.remove(symbol) else {
            return Err(PortfolioError::NotOpen {
                symbol: symbol.to_string(),
            });
        };
        let closed = position.into_closed()?;
        self.closed_realized_pnl += closed.realized_pnl;
        debug!(symbol, realized = %closed.realized_pnl, "position closed");
        self.closed_positions.push(closed);
        Ok(())
    }

    fn update_portfolio(&mut self) {
        let open_realized: Price = self.positions.values().map(Position::realized_pnl).sum();
        self.realized_pnl = self.closed_realized_pnl + open_realized;
        self.unrealized_pnl = self.positions.values().map(Position::unrealized_pnl).sum();
        self.equity = self.initial_cash + self.realized_pnl + self.unrealized_pnl;
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            initial_cash: self.initial_cash,
            cash: self.cash,
            equity: self.equity,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl,
            total_commission: self.total_commission,
            open_positions: self.positions.len(),
            closed_positions: self.closed_positions.len(),
        }
    }

    pub fn initial_cash(&self) -> Price {
        self.initial_cash
    }

    pub fn cash(&self) -> Price {
        self.cash
    }

    pub fn equity(&self) -> Price {
        self.equity
    }

    /// Realized PnL of closed positions plus partial closes of open ones.
    pub fn realized_pnl(&self) -> Price {
        self.realized_pnl
    }

    pub fn unrealized_pnl(&self) -> Price {
        self.unrealized_pnl
    }

    pub fn total_commission(&self) -> Price {
        self.total_commission
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Signed quantity held in `symbol` (0 when flat).
    pub fn net_quantity(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, Position::quantity)
    }

    /// Open positions in symbol order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Closed positions in the order they were closed.
    pub fn closed_positions(&self) -> &[ClosedPosition] {
        &self.closed_positions
    }
}

fn quote_or_fill_price<Q: MarketQuotes + ?Sized>(quotes: &Q, symbol: &str, price: Price) -> (Price, Price) {
    quotes.quote(symbol).unwrap_or_else(|| {
        debug!(symbol, "no quote; marking at fill price");
        (price, price)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn units(n: i64) -> Price {
        Price::from_units(n)
    }

    fn fill(action: Action, qty: u64, price: Price, commission: Price, day: u32) -> FillEvent {
        FillEvent {
            timestamp: ts(day),
            symbol: "AAA".into(),
            action,
            quantity: NonZeroU64::new(qty).unwrap(),
            venue: "SIMULATED".into(),
            price,
            commission,
        }
    }

    fn quotes_at(price: Price) -> StaticQuotes {
        let mut quotes = StaticQuotes::new();
        quotes.set("AAA", price);
        quotes
    }

    #[test]
    fn buy_opens_position_and_debits_cash() {
        let mut portfolio = Portfolio::new(units(10_000));
        let outcome = portfolio
            .transact_position(&fill(Action::Buy, 100, units(10), units(1), 2), &quotes_at(units(10)))
            .unwrap();

        assert_eq!(outcome, TransactOutcome::Opened);
        assert_eq!(portfolio.cash(), units(8_999));
        let pos = portfolio.position("AAA").unwrap();
        assert_eq!(pos.quantity(), 100);
        assert_eq!(pos.avg_price(), units(10));
        assert_eq!(portfolio.equity(), units(9_999));
        assert_eq!(portfolio.net_liquidation_value(), portfolio.equity());
    }

    #[test]
    fn closing_sell_archives_position() {
        let mut portfolio = Portfolio::new(units(10_000));
        portfolio
            .transact_position(&fill(Action::Buy, 100, units(10), units(1), 2), &quotes_at(units(10)))
            .unwrap();
        let outcome = portfolio
            .transact_position(&fill(Action::Sell, 100, units(12), units(1), 3), &quotes_at(units(12)))
            .unwrap();

        assert_eq!(outcome, TransactOutcome::Closed);
        assert!(!portfolio.has_position("AAA"));
        assert_eq!(portfolio.closed_positions().len(), 1);
        assert_eq!(portfolio.realized_pnl(), units(198));
        assert_eq!(portfolio.cash(), units(10_198));
        assert_eq!(portfolio.equity(), units(10_198));
    }

    #[test]
    fn add_position_twice_leaves_state_untouched() {
        let mut portfolio = Portfolio::new(units(10_000));
        let quotes = quotes_at(units(10));
        let q = NonZeroU64::new(100).unwrap();
        portfolio
            .add_position(Action::Buy, "AAA", q, units(10), units(1), ts(2), &quotes)
            .unwrap();
        let before = portfolio.snapshot();

        let err = portfolio
            .add_position(Action::Buy, "AAA", q, units(11), units(1), ts(3), &quotes)
            .unwrap_err();
        assert_eq!(err, PortfolioError::AlreadyOpen { symbol: "AAA".into() });
        assert_eq!(portfolio.snapshot(), before);
        assert_eq!(portfolio.position("AAA").unwrap().avg_price(), units(10));
    }

    #[test]
    fn modify_missing_position_is_rejected() {
        let mut portfolio = Portfolio::new(units(10_000));
        let before = portfolio.snapshot();
        let err = portfolio
            .modify_position(
                Action::Sell,
                "ZZZ",
                NonZeroU64::new(1).unwrap(),
                units(10),
                Price::ZERO,
                ts(2),
                &StaticQuotes::new(),
            )
            .unwrap_err();
        assert_eq!(err, PortfolioError::NotOpen { symbol: "ZZZ".into() });
        assert_eq!(portfolio.snapshot(), before);
    }

    #[test]
    fn crossing_fill_reverses_into_short() {
        let mut portfolio = Portfolio::new(units(10_000));
        portfolio
            .transact_position(&fill(Action::Buy, 100, units(10), Price::ZERO, 2), &quotes_at(units(10)))
            .unwrap();
        let outcome = portfolio
            .transact_position(&fill(Action::Sell, 150, units(11), units(2), 3), &quotes_at(units(11)))
            .unwrap();

        assert_eq!(outcome, TransactOutcome::Reversed);
        assert_eq!(portfolio.net_quantity("AAA"), -50);
        assert_eq!(portfolio.closed_positions().len(), 1);
        assert_eq!(portfolio.closed_positions()[0].realized_pnl, units(98));
        assert_eq!(portfolio.cash(), units(10_000) - units(1000) + units(1650) - units(2));
        assert_eq!(portfolio.net_liquidation_value(), portfolio.equity());
    }

    #[test]
    fn partial_close_counts_toward_realized_pnl() {
        let mut portfolio = Portfolio::new(units(10_000));
        portfolio
            .transact_position(&fill(Action::Buy, 100, units(10), Price::ZERO, 2), &quotes_at(units(10)))
            .unwrap();
        let outcome = portfolio
            .transact_position(&fill(Action::Sell, 25, units(14), Price::ZERO, 3), &quotes_at(units(14)))
            .unwrap();

        assert_eq!(outcome, TransactOutcome::Reduced);
        assert_eq!(portfolio.realized_pnl(), units(100));
        assert_eq!(portfolio.unrealized_pnl(), units(300));
        assert_eq!(portfolio.equity(), units(10_400));
        assert!(portfolio.closed_positions().is_empty());
    }

    #[test]
    fn mark_to_market_is_idempotent() {
        let mut portfolio = Portfolio::new(units(10_000));
        portfolio
            .transact_position(&fill(Action::Buy, 10, units(100), units(1), 2), &quotes_at(units(100)))
            .unwrap();

        let quotes = quotes_at(units(105));
        portfolio.mark_to_market(&quotes);
        let first = portfolio.snapshot();
        portfolio.mark_to_market(&quotes);
        assert_eq!(portfolio.snapshot(), first);
        assert_eq!(portfolio.equity(), units(10_049));
        assert_eq!(portfolio.computed_equity(), portfolio.equity());
    }

    #[test]
    fn missing_quote_keeps_previous_mark() {
        let mut portfolio = Portfolio::new(units(10_000));
        portfolio
            .transact_position(&fill(Action::Buy, 10, units(100), Price::ZERO, 2), &quotes_at(units(101)))
            .unwrap();
        portfolio.mark_to_market(&StaticQuotes::new());
        assert_eq!(portfolio.position("AAA").unwrap().market_value(), units(1010));
    }
}
