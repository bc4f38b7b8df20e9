//! Time-ordered price stream over several instruments.
//!
//! `BarPriceHandler` keeps one merged index over every subscribed series,
//! sorted by `(timestamp, symbol)`, and a cursor into it. Each `stream_next`
//! parses the row under the cursor and pushes it as a `Bar` event. Rows that
//! fail to parse are skipped and counted; they never end the stream.

use super::source::{DataError, DataSource, RawRow};
use crate::domain::{Event, MarketQuotes, Price, Symbol};
use crate::engine::queue::EventQueue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("'{symbol}' is not subscribed")]
    NotSubscribed { symbol: String },

    #[error("'{symbol}' is already subscribed")]
    AlreadySubscribed { symbol: String },

    #[error("no price observed yet for '{symbol}'")]
    NoPrice { symbol: String },

    #[error("could not load data for '{symbol}': {source}")]
    Data {
        symbol: String,
        #[source]
        source: DataError,
    },
}

/// Whether quotes come from bars (bid == ask == close) or from ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteKind {
    Bar,
    Tick,
}

/// Result of one `stream_next` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A bar was pushed; `skipped` malformed rows were passed over first.
    Emitted { skipped: usize },
    /// Nothing left to emit.
    Exhausted { skipped: usize },
}

/// Price source capability consumed by the trading session.
pub trait PriceHandler: MarketQuotes + Send {
    fn quote_kind(&self) -> QuoteKind;

    fn is_tick(&self) -> bool {
        self.quote_kind() == QuoteKind::Tick
    }

    fn subscribe(&mut self, symbol: &str) -> Result<(), StreamError>;

    fn unsubscribe(&mut self, symbol: &str) -> Result<(), StreamError>;

    fn subscribed(&self) -> Vec<Symbol>;

    /// Push the next event onto `queue`, if any remain.
    fn stream_next(&mut self, queue: &mut EventQueue) -> StreamOutcome;

    /// False once the final row has been emitted.
    fn continue_backtest(&self) -> bool;

    /// Close of the most recent bar emitted for `symbol`.
    ///
    /// Subscribing seeds this from the instrument's first in-bounds row, so
    /// until that bar is streamed it reports a price (and `last_timestamp`
    /// a time) that lies ahead of the merged stream. Orders filled in that
    /// window use the seeded quote.
    fn last_close(&self, symbol: &str) -> Result<Price, StreamError>;

    fn last_timestamp(&self, symbol: &str) -> Result<NaiveDateTime, StreamError>;

    fn best_bid_ask(&self, symbol: &str) -> Result<(Price, Price), StreamError>;

    /// Malformed rows passed over so far.
    fn skipped_rows(&self) -> usize;
}

/// Bounds and bar period for a `BarPriceHandler`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarStreamConfig {
    /// Inclusive lower bound.
    pub start: Option<NaiveDateTime>,
    /// Exclusive upper bound: bars stamped exactly at `end` are left out.
    pub end: Option<NaiveDateTime>,
    pub period_secs: u32,
}

impl Default for BarStreamConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            period_secs: 86_400,
        }
    }
}

impl BarStreamConfig {
    fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts < e)
    }
}

#[derive(Debug, Clone, Copy)]
struct LastPrice {
    close: Price,
    timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RowKey {
    timestamp: NaiveDateTime,
    symbol: Symbol,
    row: usize,
}

impl RowKey {
    fn order(&self) -> (NaiveDateTime, &str) {
        (self.timestamp, self.symbol.as_str())
    }
}

pub struct BarPriceHandler {
    source: Box<dyn DataSource>,
    config: BarStreamConfig,
    series: HashMap<Symbol, Vec<RawRow>>,
    last: HashMap<Symbol, LastPrice>,
    pending: Vec<RowKey>,
    cursor: usize,
    last_emitted: Option<(NaiveDateTime, Symbol)>,
    continue_backtest: bool,
    skipped_rows: usize,
    emitted: usize,
}

impl BarPriceHandler {
    /// Build a stream over `symbols`. Symbols that fail to load are logged and
    /// left out; the stream runs over whatever did load.
    pub fn new<S: AsRef<str>>(
        source: Box<dyn DataSource>,
        config: BarStreamConfig,
        symbols: &[S],
    ) -> Self {
        let mut handler = Self {
            source,
            config,
            series: HashMap::new(),
            last: HashMap::new(),
            pending: Vec::new(),
            cursor: 0,
            last_emitted: None,
            continue_backtest: false,
            skipped_rows: 0,
            emitted: 0,
        };
        for symbol in symbols {
            // failures are already logged by subscribe
            let _ = handler.subscribe(symbol.as_ref());
        }
        info!(
            source = handler.source.name(),
            instruments = handler.series.len(),
            rows = handler.remaining(),
            "price stream ready"
        );
        handler
    }

    pub fn config(&self) -> &BarStreamConfig {
        &self.config
    }

    /// Rows still queued for emission (including any that will be skipped).
    pub fn remaining(&self) -> usize {
        self.pending.len() - self.cursor
    }

    pub fn emitted_bars(&self) -> usize {
        self.emitted
    }

    /// Merge `keys` into the unconsumed part of the index, re-sort, and clip to
    /// the configured bounds.
    fn merge_pending(&mut self, keys: Vec<RowKey>) {
        let mut merged: Vec<RowKey> = self.pending.drain(self.cursor..).collect();
        merged.extend(keys);
        merged.sort_by(|a, b| a.order().cmp(&b.order()));

        let lo = match self.config.start {
            Some(start) => merged.partition_point(|k| k.timestamp < start),
            None => 0,
        };
        let hi = match self.config.end {
            Some(end) => merged.partition_point(|k| k.timestamp < end),
            None => merged.len(),
        };
        merged.truncate(hi.max(lo));
        merged.drain(..lo);

        self.pending = merged;
        self.cursor = 0;
        self.continue_backtest = !self.pending.is_empty();
    }

    fn not_subscribed(&self, symbol: &str) -> StreamError {
        warn!(symbol, "price query for instrument that is not subscribed");
        StreamError::NotSubscribed {
            symbol: symbol.to_string(),
        }
    }

    fn last_price(&self, symbol: &str) -> Result<LastPrice, StreamError> {
        if !self.series.contains_key(symbol) {
            return Err(self.not_subscribed(symbol));
        }
        self.last
            .get(symbol)
            .copied()
            .ok_or_else(|| StreamError::NoPrice {
                symbol: symbol.to_string(),
            })
    }
}

impl MarketQuotes for BarPriceHandler {
    fn quote(&self, symbol: &str) -> Option<(Price, Price)> {
        self.last.get(symbol).map(|l| (l.close, l.close))
    }
}

impl PriceHandler for BarPriceHandler {
    fn quote_kind(&self) -> QuoteKind {
        QuoteKind::Bar
    }

    fn subscribe(&mut self, symbol: &str) -> Result<(), StreamError> {
        if self.series.contains_key(symbol) {
            warn!(symbol, "already subscribed");
            return Err(StreamError::AlreadySubscribed {
                symbol: symbol.to_string(),
            });
        }
        let rows = self.source.load(symbol).map_err(|source| {
            warn!(symbol, error = %source, "subscription failed");
            StreamError::Data {
                symbol: symbol.to_string(),
                source,
            }
        })?;

        let period = self.config.period_secs;
        let seed = rows
            .iter()
            .filter(|r| self.config.contains(r.timestamp))
            .find_map(|r| r.to_bar(symbol, period).ok())
            .map(|bar| LastPrice {
                close: bar.close,
                timestamp: bar.timestamp,
            });
        if let Some(seed) = seed {
            self.last.insert(symbol.to_string(), seed);
        }

        let keys: Vec<RowKey> = rows
            .iter()
            .enumerate()
            .map(|(row, r)| RowKey {
                timestamp: r.timestamp,
                symbol: symbol.to_string(),
                row,
            })
            .filter(|k| match &self.last_emitted {
                Some((ts, sym)) => k.order() > (*ts, sym.as_str()),
                None => true,
            })
            .collect();

        debug!(symbol, rows = rows.len(), queued = keys.len(), "subscribed");
        self.series.insert(symbol.to_string(), rows);
        self.merge_pending(keys);
        Ok(())
    }

    fn unsubscribe(&mut self, symbol: &str) -> Result<(), StreamError> {
        if self.series.remove(symbol).is_none() {
            warn!(symbol, "unsubscribe for instrument that is not subscribed");
            return Err(StreamError::NotSubscribed {
                symbol: symbol.to_string(),
            });
        }
        self.last.remove(symbol);
        self.pending.drain(..self.cursor);
        self.cursor = 0;
        self.pending.retain(|k| k.symbol != symbol);
        self.continue_backtest = !self.pending.is_empty();
        debug!(symbol, "unsubscribed");
        Ok(())
    }

    fn subscribed(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.series.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    fn stream_next(&mut self, queue: &mut EventQueue) -> StreamOutcome {
        let mut skipped = 0;
        while let Some(key) = self.pending.get(self.cursor) {
            self.cursor += 1;
            let parsed = match self.series.get(&key.symbol).and_then(|rows| rows.get(key.row)) {
                Some(row) => row.to_bar(&key.symbol, self.config.period_secs),
                None => continue,
            };
            match parsed {
                Ok(bar) => {
                    self.last.insert(
                        bar.symbol.clone(),
                        LastPrice {
                            close: bar.close,
                            timestamp: bar.timestamp,
                        },
                    );
                    self.last_emitted = Some((bar.timestamp, bar.symbol.clone()));
                    self.emitted += 1;
                    if self.cursor >= self.pending.len() {
                        self.continue_backtest = false;
                    }
                    queue.push(Event::Bar(bar));
                    return StreamOutcome::Emitted { skipped };
                }
                Err(e) => {
                    warn!(
                        symbol = %key.symbol,
                        timestamp = %key.timestamp,
                        error = %e,
                        "skipping malformed row"
                    );
                    self.skipped_rows += 1;
                    skipped += 1;
                }
            }
        }
        self.continue_backtest = false;
        StreamOutcome::Exhausted { skipped }
    }

    fn continue_backtest(&self) -> bool {
        self.continue_backtest
    }

    fn last_close(&self, symbol: &str) -> Result<Price, StreamError> {
        self.last_price(symbol).map(|l| l.close)
    }

    fn last_timestamp(&self, symbol: &str) -> Result<NaiveDateTime, StreamError> {
        self.last_price(symbol).map(|l| l.timestamp)
    }

    fn best_bid_ask(&self, symbol: &str) -> Result<(Price, Price), StreamError> {
        self.last_close(symbol).map(|c| (c, c))
    }

    fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}
