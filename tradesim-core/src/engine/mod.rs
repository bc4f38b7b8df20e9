//! Event-driven session engine.
//!
//! The session pops events from a FIFO queue and routes them: market events
//! to the strategy, signals/orders/fills through the portfolio handler. When
//! the queue is empty the price stream supplies the next bar.

pub mod commission;
pub mod portfolio_handler;
pub mod queue;
pub mod session;

pub use commission::CommissionModel;
pub use portfolio_handler::{FillError, HandlerStats, PortfolioHandler, SIMULATED_VENUE};
pub use queue::EventQueue;
pub use session::{
    Clock, DispatchCounts, EquityPoint, SessionConfig, SessionError, SessionMode, SessionReport,
    SessionState, SystemClock, TradingSession,
};
