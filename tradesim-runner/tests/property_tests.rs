//! Property-based tests for run configuration using proptest.
//!
//! Properties:
//! 1. A config survives a TOML write/read cycle unchanged, run id included
//! 2. Changing any setting changes the run id

use chrono::NaiveDate;
use proptest::prelude::*;
use std::path::PathBuf;
use tradesim_core::domain::Price;
use tradesim_core::engine::{CommissionModel, SessionMode};
use tradesim_runner::config::{
    BacktestConfig, RiskConfig, SessionSection, SizerConfig, StrategyConfig, UniverseSection,
};

fn arb_config() -> impl Strategy<Value = BacktestConfig> {
    (
        1i64..1_000_000,
        prop::collection::btree_set("[A-Z]{1,4}", 1..4),
        1u64..10_000,
        any::<bool>(),
        0u8..3,
        0u32..500,
        1u32..28,
    )
        .prop_map(|(cash, instruments, quantity, fixed, risk, bps, day)| {
            let instruments: Vec<String> = instruments.into_iter().collect();
            let start = NaiveDate::from_ymd_opt(2024, 2, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            BacktestConfig {
                session: SessionSection {
                    mode: SessionMode::Backtest,
                    initial_cash: Price::from_units(cash),
                    start: Some(start),
                    end: None,
                    end_session_time: None,
                    period_secs: 86_400,
                    idle_poll_ms: 250,
                },
                universe: UniverseSection {
                    data_dir: PathBuf::from("data"),
                    instruments: instruments.clone(),
                },
                strategy: StrategyConfig::BuyAndHold {
                    instrument: instruments[0].clone(),
                    base_quantity: Some(quantity),
                },
                sizer: if fixed {
                    SizerConfig::Fixed { quantity }
                } else {
                    SizerConfig::Suggested {
                        default_quantity: quantity,
                    }
                },
                risk: match risk {
                    0 => RiskConfig::PassThrough,
                    1 => RiskConfig::MaxOrderSize {
                        max_quantity: quantity,
                    },
                    _ => RiskConfig::LongOnly,
                },
                commission: CommissionModel::Percentage { bps },
            }
        })
}

proptest! {
    #[test]
    fn toml_round_trip_keeps_run_id(config in arb_config()) {
        let text = toml::to_string(&config).unwrap();
        let parsed = BacktestConfig::from_toml_str(&text).unwrap();
        prop_assert_eq!(&parsed, &config);
        prop_assert_eq!(parsed.run_id().unwrap(), config.run_id().unwrap());
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn run_id_tracks_settings(config in arb_config()) {
        let mut richer = config.clone();
        richer.session.initial_cash = config.session.initial_cash + Price::from_units(1);
        prop_assert_ne!(richer.run_id().unwrap(), config.run_id().unwrap());

        let mut later = config.clone();
        later.session.period_secs = 3_600;
        prop_assert_ne!(later.run_id().unwrap(), config.run_id().unwrap());
    }
}
