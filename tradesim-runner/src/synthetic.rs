//! Deterministic synthetic price data for runs without data files.
//!
//! Each instrument gets a seeded random walk: the RNG seed is the BLAKE3 hash
//! of the symbol, so the same symbol always yields the same series.

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tradesim_core::data::{DataError, DataSource, RawRow};

/// Name reported by [`SyntheticSource`].
pub const SYNTHETIC_SOURCE_NAME: &str = "synthetic";

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    start: NaiveDate,
    end: NaiveDate,
}

impl SyntheticSource {
    /// Weekday bars from `start` through `end`, both inclusive.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

impl DataSource for SyntheticSource {
    fn name(&self) -> &str {
        SYNTHETIC_SOURCE_NAME
    }

    fn load(&self, symbol: &str) -> Result<Vec<RawRow>, DataError> {
        Ok(generate_synthetic_rows(symbol, self.start, self.end))
    }
}

pub fn generate_synthetic_rows(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawRow> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut rows = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        // weekends have no bars
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        if let Some(timestamp) = current.and_hms_opt(0, 0, 0) {
            let mut row = RawRow::new(
                timestamp,
                format!("{open:.4}"),
                format!("{high:.4}"),
                format!("{low:.4}"),
                format!("{close:.4}"),
                volume,
            );
            row.adj_close = Some(format!("{close:.4}"));
            rows.push(row);
        }

        price = close;
        current += chrono::Duration::days(1);
    }

    rows
}
