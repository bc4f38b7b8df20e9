//! Market data: raw sources and the merged price stream

pub mod csv_dir;
pub mod price_stream;
pub mod source;

pub use csv_dir::CsvDirSource;
pub use price_stream::{
    BarPriceHandler, BarStreamConfig, PriceHandler, QuoteKind, StreamError, StreamOutcome,
};
pub use source::{normalize_rows, parse_timestamp, DataError, DataSource, InMemorySource, RawRow, RowError};
