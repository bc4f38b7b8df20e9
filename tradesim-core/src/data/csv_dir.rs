//! Directory of per-symbol CSV files (`<dir>/<SYMBOL>.csv`).
//!
//! Column names are matched case-insensitively. The timestamp column may be
//! called `timestamp`, `date`, `datetime` or `start`; `adj_close` is optional.
//! Rows whose timestamp cannot be parsed are dropped at load time because they
//! cannot be placed in time. Bad numeric fields are left for the price stream.

use super::source::{normalize_rows, parse_timestamp, DataError, DataSource, RawRow};
use csv::ByteRecord;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TIMESTAMP_COLUMNS: [&str; 4] = ["timestamp", "date", "datetime", "start"];
const ADJ_CLOSE_COLUMNS: [&str; 3] = ["adj_close", "adj close", "adjclose"];

#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    adj_close: Option<usize>,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Parse CSV text for `symbol`. Exposed for callers holding data in memory.
    pub fn parse_csv(symbol: &str, text: &str) -> Result<Vec<RawRow>, DataError> {
        Self::parse_reader(symbol, text.as_bytes())
    }

    /// Parse CSV from any byte source.
    ///
    /// Records are read as raw bytes, so invalid UTF-8 stays confined to its
    /// row: the bad bytes are replaced with U+FFFD and the row then fails
    /// numeric parsing in the price stream, where it is skipped and counted.
    pub fn parse_reader<R: Read>(symbol: &str, input: R) -> Result<Vec<RawRow>, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers = reader.byte_headers()?.clone();
        let columns = resolve_columns(symbol, &headers)?;

        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for (line, record) in reader.byte_records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!(symbol, line = line + 2, error = %e, "unreadable csv record, dropping row");
                    dropped += 1;
                    continue;
                }
            };
            if std::str::from_utf8(record.as_slice()).is_err() {
                warn!(symbol, line = line + 2, "invalid UTF-8 in row");
            }
            let field =
                |idx: usize| String::from_utf8_lossy(record.get(idx).unwrap_or(b"")).into_owned();

            let raw_ts = field(columns.timestamp);
            let Some(timestamp) = parse_timestamp(&raw_ts) else {
                warn!(symbol, line = line + 2, value = %raw_ts, "unparseable timestamp, dropping row");
                dropped += 1;
                continue;
            };

            rows.push(RawRow {
                timestamp,
                open: field(columns.open),
                high: field(columns.high),
                low: field(columns.low),
                close: field(columns.close),
                volume: field(columns.volume),
                adj_close: columns.adj_close.map(field),
            });
        }

        let loaded = rows.len();
        let rows = normalize_rows(rows);
        debug!(
            symbol,
            rows = rows.len(),
            duplicates = loaded - rows.len(),
            dropped,
            "parsed csv"
        );
        Ok(rows)
    }
}

fn resolve_columns(symbol: &str, headers: &ByteRecord) -> Result<Columns, DataError> {
    let names: Vec<String> = headers
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_lowercase())
        .collect();
    let find_any = |candidates: &[&str]| {
        names
            .iter()
            .position(|n| candidates.iter().any(|c| n == c))
    };
    let require = |candidates: &[&str]| {
        find_any(candidates).ok_or_else(|| DataError::MissingColumn {
            symbol: symbol.to_string(),
            column: candidates[0].to_string(),
        })
    };

    Ok(Columns {
        timestamp: require(&TIMESTAMP_COLUMNS)?,
        open: require(&["open"])?,
        high: require(&["high"])?,
        low: require(&["low"])?,
        close: require(&["close"])?,
        volume: require(&["volume"])?,
        adj_close: find_any(&ADJ_CLOSE_COLUMNS),
    })
}

impl DataSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv-dir"
    }

    fn load(&self, symbol: &str) -> Result<Vec<RawRow>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataError::NotFound {
                symbol: symbol.to_string(),
                path,
            });
        }
        let file = std::fs::File::open(&path).map_err(|source| DataError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse_reader(symbol, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
Date,Open,High,Low,Close,Volume,Adj Close
2024-01-03,101,102,100,101.5,1200,101.5
2024-01-02,100,101,99,100.5,1000,100.5
2024-01-02,999,999,999,999,1,999
not-a-date,1,1,1,1,1,1
2024-01-04,abc,103,101,102,1300,102
";

    #[test]
    fn parse_sorts_dedups_and_drops_bad_timestamps() {
        let rows = CsvDirSource::parse_csv("AAA", CSV).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].close, "100.5");
        assert_eq!(rows[1].close, "101.5");
        // malformed numerics survive loading
        assert_eq!(rows[2].open, "abc");
        assert_eq!(rows[0].adj_close.as_deref(), Some("100.5"));
    }

    #[test]
    fn invalid_utf8_is_confined_to_its_row() {
        let mut bytes = b"date,open,high,low,close,volume\n2024-01-02,10,10,10,10,100\n2024-01-03,1".to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b",11,11,11,100\n2024-01-04,12,12,12,12,100\n");

        let rows = CsvDirSource::parse_reader("AAA", bytes.as_slice()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].open, "1\u{FFFD}");
        assert_eq!(rows[2].close, "12");
    }

    #[test]
    fn missing_required_column() {
        let err = CsvDirSource::parse_csv("AAA", "date,open,high,low,close\n").unwrap_err();
        match err {
            DataError::MissingColumn { column, .. } => assert_eq!(column, "volume"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loads_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("AAA.csv")).unwrap();
        f.write_all(CSV.as_bytes()).unwrap();

        let source = CsvDirSource::new(dir.path());
        assert_eq!(source.load("AAA").unwrap().len(), 3);
        assert!(matches!(
            source.load("ZZZ").unwrap_err(),
            DataError::NotFound { .. }
        ));
    }
}
