//! TradeSim Runner: config-driven backtests on top of `tradesim-core`.
//!
//! This crate provides:
//! - TOML run configuration with validation and a content-hash run id
//! - Data source selection (CSV directory or deterministic synthetic walk)
//! - A single-run entry point producing a persistable `BacktestResult`
//! - JSON/CSV artifact export
//! - Logging setup

pub mod config;
pub mod export;
pub mod logging;
pub mod runner;
pub mod synthetic;

pub use config::{
    BacktestConfig, ConfigError, RiskConfig, RunId, SessionSection, SizerConfig, StrategyConfig,
    UniverseSection,
};
pub use export::{
    export_closed_positions_csv, export_equity_csv, export_json, import_json, load_artifacts,
    save_artifacts,
};
pub use logging::init_logging;
pub use runner::{run_backtest, run_with_source, BacktestResult, RunError, RunOptions, SCHEMA_VERSION};
pub use synthetic::{generate_synthetic_rows, SyntheticSource, SYNTHETIC_SOURCE_NAME};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_config_is_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
    }

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn synthetic_source_is_send_sync() {
        assert_send::<SyntheticSource>();
        assert_sync::<SyntheticSource>();
    }

    #[test]
    fn run_error_is_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
