//! Domain types for TradeSim

pub mod event;
pub mod portfolio;
pub mod position;
pub mod price;

pub use event::{
    readable_period, Action, BarEvent, Event, EventError, EventKind, FillEvent, OrderEvent,
    SentimentEvent, SignalEvent, TickEvent,
};
pub use portfolio::{
    MarketQuotes, Portfolio, PortfolioError, PortfolioSnapshot, StaticQuotes, TransactOutcome,
};
pub use position::{ClosedPosition, Position, PositionError, PositionSide};
pub use price::{Price, PriceError, PRICE_DECIMALS};

/// Instrument identifier (ticker).
pub type Symbol = String;
