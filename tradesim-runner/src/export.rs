//! Export of run results: JSON manifest plus CSV equity curve and closed positions.
//!
//! Persisted manifests carry a `schema_version`. Versions newer than this
//! build understands are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradesim_core::domain::ClosedPosition;
use tradesim_core::engine::EquityPoint;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: timestamp, equity, cash
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "cash"])?;
    for point in equity_curve {
        wtr.write_record([
            point.timestamp.to_string(),
            point.equity.to_string(),
            point.cash.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: symbol, side, opened_at, closed_at, total_bought, total_sold,
/// transactions, total_commission, realized_pnl
pub fn export_closed_positions_csv(positions: &[ClosedPosition]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "side",
        "opened_at",
        "closed_at",
        "total_bought",
        "total_sold",
        "transactions",
        "total_commission",
        "realized_pnl",
    ])?;
    for p in positions {
        wtr.write_record([
            p.symbol.clone(),
            format!("{:?}", p.side),
            p.opened_at.to_string(),
            p.closed_at.to_string(),
            p.total_bought.to_string(),
            p.total_sold.to_string(),
            p.transactions.to_string(),
            p.total_commission.to_string(),
            p.realized_pnl.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact directory ─────────────────────────────────────────────

/// Write all artifacts for a run to a timestamped directory under `output_dir`:
///
/// - `manifest.json`: the full `BacktestResult`
/// - `equity.csv`: equity curve, one row per timestamp
/// - `closed_positions.csv`: one row per round trip
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = result.run_id.chars().take(12).collect();
    let dirname = format!(
        "{}_{}",
        short_id,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(result)?;
    std::fs::write(run_dir.join("manifest.json"), &json)?;

    let equity_csv = export_equity_csv(&result.equity_curve)?;
    std::fs::write(run_dir.join("equity.csv"), &equity_csv)?;

    let closed_csv = export_closed_positions_csv(&result.closed_positions)?;
    std::fs::write(run_dir.join("closed_positions.csv"), &closed_csv)?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}
