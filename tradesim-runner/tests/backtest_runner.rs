//! Integration tests for the runner: TOML config, CSV files on disk, artifacts.

use std::fs;
use std::path::Path;
use tradesim_core::domain::Price;
use tradesim_runner::config::{BacktestConfig, ConfigError};
use tradesim_runner::export::{load_artifacts, save_artifacts};
use tradesim_runner::runner::{run_backtest, RunError, RunOptions};

fn write_fixtures(dir: &Path) {
    fs::write(
        dir.join("AAA.csv"),
        "Date,Open,High,Low,Close,Volume\n\
         2024-01-02,10,10,10,10,1000\n\
         2024-01-03,11,11,11,11,1000\n\
         2024-01-04,12,12,12,12,1000\n\
         2024-01-05,9,9,9,9,1000\n",
    )
    .unwrap();
    fs::write(
        dir.join("BBB.csv"),
        "timestamp,open,high,low,close,volume\n\
         2024-01-03 00:00:00,50,51,49,50,10\n\
         2024-01-04 00:00:00,50,51,49,oops,10\n",
    )
    .unwrap();
}

fn config_toml(data_dir: &Path, risk: &str) -> String {
    format!(
        r#"
[session]
initial_cash = "10000"

[universe]
instruments = ["AAA", "BBB"]
data_dir = {data_dir:?}

[strategy]
type = "BUY_AND_HOLD"
instrument = "AAA"
base_quantity = 100

[sizer]
type = "SUGGESTED"
default_quantity = 10

{risk}

[commission]
type = "PER_TRADE"
amount = "1"
"#,
        data_dir = data_dir.display().to_string(),
    )
}

fn load(data_dir: &Path, risk: &str) -> BacktestConfig {
    BacktestConfig::from_toml_str(&config_toml(data_dir, risk)).unwrap()
}

#[test]
fn csv_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let result = run_backtest(&load(dir.path(), ""), &RunOptions::default()).unwrap();
    assert_eq!(result.instruments, vec!["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(result.data_source, "csv-dir");
    assert_eq!(result.dispatch.bars, 5);
    assert_eq!(result.skipped_rows, 1);
    assert_eq!(result.handler.fills, 1);
    // 100 @ 10 plus $1 commission, marked at 9 on the last bar
    assert_eq!(result.final_cash, Price::from_units(8_999));
    assert_eq!(result.final_equity, Price::from_units(9_899));
    assert_eq!(result.open_positions, 1);
    assert_eq!(
        result.final_equity,
        result.initial_cash + result.realized_pnl + result.unrealized_pnl
    );
}

#[test]
fn max_order_size_from_config() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let risk = "[risk]\ntype = \"MAX_ORDER_SIZE\"\nmax_quantity = 30";

    let result = run_backtest(&load(dir.path(), risk), &RunOptions::default()).unwrap();
    // 30 + 30 + 30 + 10
    assert_eq!(result.handler.fills, 4);
    assert_eq!(result.total_commission, Price::from_units(4));
}

#[test]
fn run_id_is_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());
    let config = load(dir.path(), "");
    let a = run_backtest(&config, &RunOptions::default()).unwrap();
    let b = run_backtest(&config, &RunOptions::default()).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.run_id.len(), 64);
}

#[test]
fn missing_data_dir_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = load(&dir.path().join("absent"), "");
    assert!(matches!(
        run_backtest(&config, &RunOptions::default()),
        Err(RunError::NoData { .. })
    ));
}

#[test]
fn zero_sizer_quantity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let text = config_toml(dir.path(), "").replace("default_quantity = 10", "default_quantity = 0");
    let config = BacktestConfig::from_toml_str(&text).unwrap();
    assert!(matches!(
        run_backtest(&config, &RunOptions::default()),
        Err(RunError::Config(ConfigError::ZeroSizerQuantity))
    ));
}

#[test]
fn artifacts_round_trip_through_disk() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_fixtures(data.path());
    let result = run_backtest(&load(data.path(), ""), &RunOptions::default()).unwrap();

    let run_dir = save_artifacts(&result, out.path()).unwrap();
    let equity = fs::read_to_string(run_dir.join("equity.csv")).unwrap();
    // header plus one row per distinct timestamp
    assert_eq!(equity.lines().count(), 5);
    assert_eq!(load_artifacts(&run_dir).unwrap(), result);
}
