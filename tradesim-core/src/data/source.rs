//! Data source trait and raw row type.
//!
//! A `DataSource` hands back one instrument's OHLCV table, ordered by time.
//! Numeric fields are kept as raw text: parsing happens lazily when the price
//! stream turns a row into a bar, so one malformed row costs one bar rather
//! than the whole series.

use crate::domain::{BarEvent, Price, PriceError, Symbol};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading an instrument's series.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data for '{symbol}' at {}", path.display())]
    NotFound { symbol: String, path: PathBuf },

    #[error("no data for '{symbol}' in source '{source_name}'")]
    UnknownSymbol { symbol: String, source_name: String },

    #[error("'{symbol}' data is missing required column '{column}'")]
    MissingColumn { symbol: String, column: String },

    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Why a raw row could not become a bar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("field '{field}' = '{value}': {reason}")]
    BadField {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("inconsistent OHLC (open {open}, high {high}, low {low}, close {close})")]
    Inconsistent {
        open: Price,
        high: Price,
        low: Price,
        close: Price,
    },
}

/// One unparsed OHLCV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub timestamp: NaiveDateTime,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub adj_close: Option<String>,
}

impl RawRow {
    /// Build a row from already-formatted values.
    pub fn new(
        timestamp: NaiveDateTime,
        open: impl ToString,
        high: impl ToString,
        low: impl ToString,
        close: impl ToString,
        volume: impl ToString,
    ) -> Self {
        Self {
            timestamp,
            open: open.to_string(),
            high: high.to_string(),
            low: low.to_string(),
            close: close.to_string(),
            volume: volume.to_string(),
            adj_close: None,
        }
    }

    /// Parse into a bar event. Any unparseable, non-finite or inconsistent
    /// value makes the whole row unusable.
    pub fn to_bar(&self, symbol: &str, period_secs: u32) -> Result<BarEvent, RowError> {
        let open = parse_price("open", &self.open)?;
        let high = parse_price("high", &self.high)?;
        let low = parse_price("low", &self.low)?;
        let close = parse_price("close", &self.close)?;
        let volume = parse_volume(&self.volume)?;
        let adj_close = match self.adj_close.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_price("adj_close", raw)?),
        };

        let bar = BarEvent::new(
            symbol,
            self.timestamp,
            period_secs,
            open,
            high,
            low,
            close,
            volume,
            adj_close,
        );
        if !bar.is_sane() {
            return Err(RowError::Inconsistent {
                open,
                high,
                low,
                close,
            });
        }
        Ok(bar)
    }
}

fn parse_price(field: &'static str, raw: &str) -> Result<Price, RowError> {
    Price::parse(raw).map_err(|e: PriceError| RowError::BadField {
        field,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_volume(raw: &str) -> Result<u64, RowError> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<u64>() {
        return Ok(v);
    }
    let bad = |reason: &str| RowError::BadField {
        field: "volume",
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let v: f64 = trimmed.parse().map_err(|_| bad("not a number"))?;
    if !v.is_finite() {
        return Err(bad("not finite"));
    }
    if v < 0.0 {
        return Err(bad("negative"));
    }
    Ok(v.round() as u64)
}

/// Parse the timestamp formats found in vendor files: full datetimes
/// (space or `T` separated) or bare dates (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Per-instrument OHLCV table provider.
///
/// Implementations return rows sorted by timestamp with duplicates removed.
pub trait DataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Load every row available for `symbol`.
    fn load(&self, symbol: &str) -> Result<Vec<RawRow>, DataError>;
}

/// Rows held in memory, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<Symbol, Vec<RawRow>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series; rows are sorted and de-duplicated by timestamp.
    pub fn insert(&mut self, symbol: impl Into<Symbol>, rows: Vec<RawRow>) {
        self.series.insert(symbol.into(), normalize_rows(rows));
    }

    pub fn with_series(mut self, symbol: impl Into<Symbol>, rows: Vec<RawRow>) -> Self {
        self.insert(symbol, rows);
        self
    }
}

impl DataSource for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn load(&self, symbol: &str) -> Result<Vec<RawRow>, DataError> {
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::UnknownSymbol {
                symbol: symbol.to_string(),
                source_name: self.name().to_string(),
            })
    }
}

/// Stable sort by timestamp, keeping the first row of each duplicate timestamp.
pub fn normalize_rows(mut rows: Vec<RawRow>) -> Vec<RawRow> {
    rows.sort_by_key(|r| r.timestamp);
    rows.dedup_by_key(|r| r.timestamp);
    rows
}
