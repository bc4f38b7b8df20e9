//! TradeSim CLI: run and validate commands.
//!
//! Commands:
//! - `run`: execute a session from a TOML config file and save artifacts
//! - `validate`: parse and check a config without loading any data

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tradesim_runner::{
    init_logging, run_backtest, save_artifacts, BacktestConfig, BacktestResult, RunOptions,
};

#[derive(Parser)]
#[command(name = "tradesim", about = "TradeSim CLI: event-driven backtesting engine")]
struct Cli {
    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a session from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Replace CSV files with a deterministic synthetic random walk.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Parse and validate a config file, then print its run id.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            synthetic,
            output_dir,
        } => run_cmd(&config, synthetic, &output_dir),
        Commands::Validate { config } => validate_cmd(&config),
    }
}

fn load_config(path: &Path) -> Result<BacktestConfig> {
    let config = BacktestConfig::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

fn run_cmd(config_path: &Path, synthetic: bool, output_dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let result = run_backtest(&config, &RunOptions { synthetic })?;

    print_summary(&result);

    let run_dir = save_artifacts(&result, output_dir)?;
    info!(dir = %run_dir.display(), "artifacts saved");
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn validate_cmd(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    println!("Config OK");
    println!("Run id:      {}", config.run_id()?);
    println!("Mode:        {:?}", config.session.mode);
    println!("Instruments: {}", config.universe.instruments.join(", "));
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Session Result ===");
    println!("Run id:         {}", result.run_id);
    println!("Mode:           {:?}", result.mode);
    println!("Instruments:    {}", result.instruments.join(", "));
    println!("Data source:    {}", result.data_source);
    match result.final_time {
        Some(ts) => println!("Final time:     {ts}"),
        None => println!("Final time:     (no data)"),
    }
    println!(
        "Events:         {} bars, {} signals, {} orders, {} fills",
        result.dispatch.bars, result.dispatch.signals, result.dispatch.orders, result.dispatch.fills
    );
    println!();
    println!("--- Portfolio ---");
    println!("Initial Cash:   {}", result.initial_cash);
    println!("Final Cash:     {}", result.final_cash);
    println!("Final Equity:   {}", result.final_equity);
    println!("Total Return:   {:.2}%", result.total_return() * 100.0);
    println!("Realized PnL:   {}", result.realized_pnl);
    println!("Unrealized PnL: {}", result.unrealized_pnl);
    println!("Commission:     {}", result.total_commission);
    println!("Open Positions: {}", result.open_positions);
    println!("Round Trips:    {}", result.closed_positions.len());
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    if result.skipped_rows > 0 {
        println!("WARNING: {} malformed rows skipped", result.skipped_rows);
    }
    let h = &result.handler;
    if h.sizing_failures + h.vetoed_signals + h.unfilled_orders + h.portfolio_errors > 0 {
        println!(
            "WARNING: {} sizing failures, {} vetoed signals, {} unfilled orders, {} portfolio errors",
            h.sizing_failures, h.vetoed_signals, h.unfilled_orders, h.portfolio_errors
        );
    }
}
