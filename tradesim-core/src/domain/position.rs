//! Position: one instrument's open holding with cost basis and PnL.
//!
//! Quantity is signed (long > 0, short < 0). Cost basis is the signed notional
//! of the open exposure, excluding commission; commission paid to open the
//! exposure is tracked separately and released pro rata as exposure closes.
//! Realized and unrealized PnL are both net of commission, so
//! `realized + unrealized == net cash flow + quantity × mark` exactly.

use super::event::Action;
use super::price::Price;
use super::Symbol;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("position in '{symbol}' is flat and can no longer be transacted")]
    Flat { symbol: Symbol },

    #[error("{action} {quantity} of '{symbol}' would cross zero (held {held})")]
    CrossesZero {
        symbol: Symbol,
        action: Action,
        quantity: u64,
        held: i64,
    },

    #[error("position in '{symbol}' is still open ({quantity})")]
    StillOpen { symbol: Symbol, quantity: i64 },
}

/// Direction of the exposure a position was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// Open holding in a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    symbol: Symbol,
    side: PositionSide,
    quantity: i64,
    cost_basis: Price,
    open_commission: Price,
    realized_pnl: Price,
    total_commission: Price,
    total_bought: u64,
    total_sold: u64,
    bid: Price,
    ask: Price,
    market_value: Price,
    unrealized_pnl: Price,
    opened_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    transactions: usize,
}

impl Position {
    /// Open a new position from its first fill, then mark it at `bid`/`ask`.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: impl Into<Symbol>,
        action: Action,
        quantity: NonZeroU64,
        price: Price,
        commission: Price,
        bid: Price,
        ask: Price,
        timestamp: NaiveDateTime,
    ) -> Self {
        let qty = action.sign() * quantity.get() as i64;
        let (total_bought, total_sold, side) = match action {
            Action::Buy => (quantity.get(), 0, PositionSide::Long),
            Action::Sell => (0, quantity.get(), PositionSide::Short),
        };
        let mut position = Self {
            symbol: symbol.into(),
            side,
            quantity: qty,
            cost_basis: price.times(qty),
            open_commission: commission,
            realized_pnl: Price::ZERO,
            total_commission: commission,
            total_bought,
            total_sold,
            bid,
            ask,
            market_value: Price::ZERO,
            unrealized_pnl: Price::ZERO,
            opened_at: timestamp,
            updated_at: timestamp,
            transactions: 1,
        };
        position.update_market_value(bid, ask);
        position
    }

    /// Apply a fill. Increases add to cost basis; reductions realize PnL on
    /// the closed portion. A fill larger than the held quantity in the
    /// opposite direction is rejected; callers split such fills.
    pub fn transact(
        &mut self,
        action: Action,
        quantity: NonZeroU64,
        price: Price,
        commission: Price,
        timestamp: NaiveDateTime,
    ) -> Result<(), PositionError> {
        if self.quantity == 0 {
            return Err(PositionError::Flat {
                symbol: self.symbol.clone(),
            });
        }

        let q = quantity.get() as i64;
        let signed = action.sign() * q;
        let held = self.quantity.abs();

        if self.quantity.signum() == signed.signum() {
            self.cost_basis += price.times(signed);
            self.open_commission += commission;
        } else {
            if q > held {
                return Err(PositionError::CrossesZero {
                    symbol: self.symbol.clone(),
                    action,
                    quantity: quantity.get(),
                    held: self.quantity,
                });
            }
            let (released_cost, released_commission) = if q == held {
                (self.cost_basis, self.open_commission)
            } else {
                (
                    self.cost_basis.mul_ratio(q, held),
                    self.open_commission.mul_ratio(q, held),
                )
            };
            // Sells bring cash in, buys-to-cover pay it out.
            let proceeds = -price.times(signed);
            self.realized_pnl += proceeds - released_cost - released_commission - commission;
            self.cost_basis -= released_cost;
            self.open_commission -= released_commission;
        }

        self.quantity += signed;
        self.total_commission += commission;
        match action {
            Action::Buy => self.total_bought += quantity.get(),
            Action::Sell => self.total_sold += quantity.get(),
        }
        self.updated_at = timestamp;
        self.transactions += 1;
        Ok(())
    }

    /// Mark to market at the given quote (mid price).
    pub fn update_market_value(&mut self, bid: Price, ask: Price) {
        self.bid = bid;
        self.ask = ask;
        let mark = Price::midpoint(bid, ask);
        self.market_value = mark.times(self.quantity);
        self.unrealized_pnl = self.market_value - self.cost_basis - self.open_commission;
    }

    /// Retire a flat position into its immutable closed record.
    pub fn into_closed(self) -> Result<ClosedPosition, PositionError> {
        if self.quantity != 0 {
            return Err(PositionError::StillOpen {
                symbol: self.symbol,
                quantity: self.quantity,
            });
        }
        Ok(ClosedPosition {
            symbol: self.symbol,
            side: self.side,
            total_bought: self.total_bought,
            total_sold: self.total_sold,
            realized_pnl: self.realized_pnl,
            total_commission: self.total_commission,
            opened_at: self.opened_at,
            closed_at: self.updated_at,
            transactions: self.transactions,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    /// Signed quantity (long > 0).
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Signed notional of the open exposure, excluding commission.
    pub fn cost_basis(&self) -> Price {
        self.cost_basis
    }

    /// Commission paid on the exposure that is still open.
    pub fn open_commission(&self) -> Price {
        self.open_commission
    }

    /// Average cost per unit of the open exposure (excluding commission).
    pub fn avg_price(&self) -> Price {
        if self.quantity == 0 {
            return Price::ZERO;
        }
        self.cost_basis.abs().mul_ratio(1, self.quantity.abs())
    }

    pub fn realized_pnl(&self) -> Price {
        self.realized_pnl
    }

    pub fn unrealized_pnl(&self) -> Price {
        self.unrealized_pnl
    }

    pub fn market_value(&self) -> Price {
        self.market_value
    }

    pub fn total_commission(&self) -> Price {
        self.total_commission
    }

    pub fn bid(&self) -> Price {
        self.bid
    }

    pub fn ask(&self) -> Price {
        self.ask
    }

    pub fn total_bought(&self) -> u64 {
        self.total_bought
    }

    pub fn total_sold(&self) -> u64 {
        self.total_sold
    }

    pub fn opened_at(&self) -> NaiveDateTime {
        self.opened_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    pub fn transactions(&self) -> usize {
        self.transactions
    }
}

/// Immutable record of a position whose quantity returned to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub total_bought: u64,
    pub total_sold: u64,
    /// Net of every commission paid over the position's life.
    pub realized_pnl: Price,
    pub total_commission: Price,
    pub opened_at: NaiveDateTime,
    pub closed_at: NaiveDateTime,
    pub transactions: usize,
}
