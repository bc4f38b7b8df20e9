//! TradeSim Core: an event-driven backtesting kernel.
//!
//! This crate contains:
//! - Fixed-point prices and the closed `Event` enum
//! - Position and portfolio accounting (exact integer PnL)
//! - Data sources and a time-ordered multi-instrument price stream
//! - Position sizers and risk managers
//! - The portfolio handler and the trading session loop

pub mod data;
pub mod domain;
pub mod engine;
pub mod risk;
pub mod sizers;
pub mod strategy;

pub use data::{BarPriceHandler, BarStreamConfig, DataSource, PriceHandler};
pub use domain::{Action, Event, Portfolio, Price};
pub use engine::{EventQueue, PortfolioHandler, SessionConfig, SessionReport, TradingSession};
pub use strategy::{BuyAndHoldStrategy, Strategy};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: domain types are Send + Sync, and the session
    /// can be moved to a worker thread as a whole.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Price>();
        require_sync::<domain::Price>();
        require_send::<domain::Event>();
        require_sync::<domain::Event>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::ClosedPosition>();
        require_sync::<domain::ClosedPosition>();
        require_send::<domain::Portfolio>();
        require_sync::<domain::Portfolio>();
        require_send::<domain::PortfolioSnapshot>();
        require_sync::<domain::PortfolioSnapshot>();

        // Data
        require_send::<data::RawRow>();
        require_sync::<data::RawRow>();
        require_send::<data::InMemorySource>();
        require_sync::<data::InMemorySource>();
        require_send::<data::CsvDirSource>();
        require_sync::<data::CsvDirSource>();
        require_send::<data::BarPriceHandler>();

        // Components
        require_send::<sizers::FixedSizer>();
        require_sync::<sizers::FixedSizer>();
        require_send::<sizers::SuggestedSizer>();
        require_sync::<sizers::SuggestedSizer>();
        require_send::<risk::MaxOrderSizeRiskManager>();
        require_sync::<risk::MaxOrderSizeRiskManager>();
        require_send::<engine::CommissionModel>();
        require_sync::<engine::CommissionModel>();

        // Engine
        require_send::<engine::EventQueue>();
        require_sync::<engine::EventQueue>();
        require_send::<engine::PortfolioHandler>();
        require_send::<engine::TradingSession>();
        require_send::<engine::SessionReport>();
        require_sync::<engine::SessionReport>();
    }

    /// Architecture contract: strategies never see the portfolio.
    ///
    /// `calculate_signals` takes an event and the queue only. Adding a
    /// portfolio parameter breaks this function.
    #[test]
    fn strategy_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            strategy: &mut dyn Strategy,
            event: &Event,
            queue: &mut EventQueue,
        ) {
            strategy.calculate_signals(event, queue)
        }
    }
}
