//! Backtest runner: builds every component from a `BacktestConfig`, runs the
//! session, and packages the outcome as a persistable `BacktestResult`.
//!
//! Two entry points:
//! - `run_backtest()`: picks the data source from config and options. Used by the CLI.
//! - `run_with_source()`: takes any `DataSource`. Used by tests and embedders.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use tradesim_core::data::{BarPriceHandler, CsvDirSource, DataSource, PriceHandler};
use tradesim_core::domain::{ClosedPosition, Portfolio, Price};
use tradesim_core::engine::{
    DispatchCounts, EquityPoint, HandlerStats, PortfolioHandler, SessionError, SessionMode,
    TradingSession,
};
use tradesim_core::risk::RiskError;
use tradesim_core::sizers::SizingError;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::synthetic::{SyntheticSource, SYNTHETIC_SOURCE_NAME};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("sizer error: {0}")]
    Sizing(#[from] SizingError),
    #[error("risk manager error: {0}")]
    Risk(#[from] RiskError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("none of the configured instruments could be loaded from '{source_name}'")]
    NoData { source_name: String },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Options that change where data comes from, not what the run means.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Use the deterministic random walk instead of CSV files.
    pub synthetic: bool,
}

/// Complete result of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub mode: SessionMode,
    pub instruments: Vec<String>,
    pub data_source: String,
    pub has_synthetic: bool,
    pub initial_cash: Price,
    pub final_cash: Price,
    pub final_equity: Price,
    pub realized_pnl: Price,
    pub unrealized_pnl: Price,
    pub total_commission: Price,
    pub open_positions: usize,
    pub final_time: Option<NaiveDateTime>,
    pub equity_curve: Vec<EquityPoint>,
    pub closed_positions: Vec<ClosedPosition>,
    pub skipped_rows: usize,
    pub dispatch: DispatchCounts,
    pub handler: HandlerStats,
}

/// Default schema version for older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn total_return(&self) -> f64 {
        let initial = self.initial_cash.to_f64();
        if initial == 0.0 {
            return 0.0;
        }
        self.final_equity.to_f64() / initial - 1.0
    }
}

/// Run from config, reading CSV files or generating synthetic data.
pub fn run_backtest(config: &BacktestConfig, opts: &RunOptions) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let source: Box<dyn DataSource> = if opts.synthetic {
        let (start, end) = synthetic_range(config);
        Box::new(SyntheticSource::new(start, end))
    } else {
        Box::new(CsvDirSource::new(&config.universe.data_dir))
    };
    run_with_source(config, source)
}

/// Run from config against an arbitrary data source.
pub fn run_with_source(
    config: &BacktestConfig,
    source: Box<dyn DataSource>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;
    let source_name = source.name().to_string();

    let prices = BarPriceHandler::new(source, config.stream_config(), &config.universe.instruments);
    let instruments = prices.subscribed();
    if instruments.is_empty() {
        return Err(RunError::NoData { source_name });
    }

    let handler = PortfolioHandler::new(
        Portfolio::new(config.session.initial_cash),
        config.build_sizer()?,
        config.build_risk_manager()?,
        config.commission,
    );
    let mut session = TradingSession::new(
        config.session_config(),
        Box::new(prices),
        config.build_strategy(),
        handler,
    )?;

    info!(run_id = %&run_id[..12], source = %source_name, ?instruments, "starting run");
    let report = session.run()?;

    let snapshot = report.snapshot;
    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        mode: report.mode,
        instruments,
        has_synthetic: source_name == SYNTHETIC_SOURCE_NAME,
        data_source: source_name,
        initial_cash: snapshot.initial_cash,
        final_cash: snapshot.cash,
        final_equity: snapshot.equity,
        realized_pnl: snapshot.realized_pnl,
        unrealized_pnl: snapshot.unrealized_pnl,
        total_commission: snapshot.total_commission,
        open_positions: snapshot.open_positions,
        final_time: report.final_time,
        equity_curve: report.equity_curve,
        closed_positions: report.closed_positions,
        skipped_rows: report.skipped_rows,
        dispatch: report.dispatch,
        handler: report.handler,
    })
}

/// Synthetic data spans the configured bounds, or one year when unbounded.
fn synthetic_range(config: &BacktestConfig) -> (NaiveDate, NaiveDate) {
    let fallback_start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap_or_default();
    let start = config
        .session
        .start
        .map(|ts| ts.date())
        .unwrap_or(fallback_start);
    let end = config
        .session
        .end
        .map(|ts| ts.date())
        .unwrap_or(start + Duration::days(365));
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RiskConfig, SessionSection, SizerConfig, StrategyConfig, UniverseSection};
    use tradesim_core::data::{InMemorySource, RawRow};
    use tradesim_core::engine::CommissionModel;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            session: SessionSection {
                mode: SessionMode::Backtest,
                initial_cash: Price::from_units(10_000),
                start: None,
                end: None,
                end_session_time: None,
                period_secs: 86_400,
                idle_poll_ms: 250,
            },
            universe: UniverseSection {
                instruments: vec!["AAA".into()],
                data_dir: "unused".into(),
            },
            strategy: StrategyConfig::BuyAndHold {
                instrument: "AAA".into(),
                base_quantity: Some(100),
            },
            sizer: SizerConfig::Suggested {
                default_quantity: 10,
            },
            risk: RiskConfig::PassThrough,
            commission: CommissionModel::PerTrade {
                amount: Price::from_units(1),
            },
        }
    }

    #[test]
    fn run_with_in_memory_source() {
        let source = InMemorySource::new().with_series(
            "AAA",
            vec![
                RawRow::new(ts(2), 10, 10, 10, 10, 100),
                RawRow::new(ts(3), 12, 12, 12, 12, 100),
            ],
        );
        let result = run_with_source(&config(), Box::new(source)).unwrap();
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.instruments, vec!["AAA".to_string()]);
        assert_eq!(result.final_cash, Price::from_units(8_999));
        assert_eq!(result.final_equity, Price::from_units(10_199));
        assert_eq!(result.equity_curve.len(), 2);
        assert!(!result.has_synthetic);
        assert!((result.total_return() - 0.0199).abs() < 1e-9);
    }

    #[test]
    fn no_loadable_instruments_is_an_error() {
        let err = run_with_source(&config(), Box::new(InMemorySource::new())).unwrap_err();
        assert!(matches!(err, RunError::NoData { .. }));
    }

    #[test]
    fn synthetic_run_is_reproducible() {
        let mut cfg = config();
        cfg.session.start = Some(ts(1));
        cfg.session.end = Some(ts(31));
        let opts = RunOptions { synthetic: true };
        let a = run_backtest(&cfg, &opts).unwrap();
        let b = run_backtest(&cfg, &opts).unwrap();
        assert!(a.has_synthetic);
        // 23 weekdays in January, the bar on the 31st sits on the exclusive end
        assert_eq!(a.dispatch.bars, 22);
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_config_fails_before_loading() {
        let mut cfg = config();
        cfg.universe.instruments.clear();
        assert!(matches!(
            run_backtest(&cfg, &RunOptions::default()),
            Err(RunError::Config(ConfigError::EmptyUniverse))
        ));
    }
}
