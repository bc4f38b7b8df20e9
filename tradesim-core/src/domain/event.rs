//! Event model: the closed set of messages that flow through the session queue.
//!
//! Events are built once and never mutated afterwards: the queue owns them,
//! handlers only ever see `&Event`.

use super::price::Price;
use super::Symbol;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use thiserror::Error;

/// Errors from constructing events with invalid contents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("order for '{symbol}' has zero quantity")]
    ZeroQuantity { symbol: Symbol },

    #[error("quote for '{symbol}' has bid {bid} above ask {ask}")]
    CrossedQuote { symbol: Symbol, bid: Price, ask: Price },
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> i64 {
        match self {
            Action::Buy => 1,
            Action::Sell => -1,
        }
    }

    pub fn opposite(self) -> Action {
        match self {
            Action::Buy => Action::Sell,
            Action::Sell => Action::Buy,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => f.write_str("BUY"),
            Action::Sell => f.write_str("SELL"),
        }
    }
}

/// Human-readable label for a bar period given in seconds.
pub fn readable_period(period_secs: u32) -> String {
    match period_secs {
        1 => "1sec".into(),
        5 => "5sec".into(),
        10 => "10sec".into(),
        15 => "15sec".into(),
        30 => "30sec".into(),
        60 => "1min".into(),
        300 => "5min".into(),
        600 => "10min".into(),
        900 => "15min".into(),
        1800 => "30min".into(),
        3600 => "1hr".into(),
        86400 => "1day".into(),
        604800 => "1wk".into(),
        other => format!("{other}sec"),
    }
}

/// OHLCV bar for one instrument over one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarEvent {
    pub symbol: Symbol,
    pub timestamp: NaiveDateTime,
    /// Period length in seconds.
    pub period: u32,
    pub period_label: String,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: u64,
    /// Vendor-adjusted close (e.g. back-adjusted for splits), if supplied.
    pub adj_close: Option<Price>,
}

impl BarEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<Symbol>,
        timestamp: NaiveDateTime,
        period: u32,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: u64,
        adj_close: Option<Price>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            period,
            period_label: readable_period(period),
            open,
            high,
            low,
            close,
            volume,
            adj_close,
        }
    }

    /// Basic OHLC sanity: high bounds everything from above, low from below.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Top-of-book quote. Reserved for tick-level price handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvent {
    pub symbol: Symbol,
    pub timestamp: NaiveDateTime,
    pub bid: Price,
    pub ask: Price,
}

impl TickEvent {
    pub fn new(
        symbol: impl Into<Symbol>,
        timestamp: NaiveDateTime,
        bid: Price,
        ask: Price,
    ) -> Result<Self, EventError> {
        let symbol = symbol.into();
        if bid > ask {
            return Err(EventError::CrossedQuote { symbol, bid, ask });
        }
        Ok(Self {
            symbol,
            timestamp,
            bid,
            ask,
        })
    }
}

/// Directional intent from a strategy. Size is optional; the sizer decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: Symbol,
    pub action: Action,
    /// Suggested quantity. `None` means "sizer decides"; `Some(0)` is
    /// rejected by every sizer.
    pub suggested_quantity: Option<u64>,
}

impl SignalEvent {
    pub fn new(symbol: impl Into<Symbol>, action: Action) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            suggested_quantity: None,
        }
    }

    pub fn with_quantity(symbol: impl Into<Symbol>, action: Action, quantity: u64) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            suggested_quantity: Some(quantity),
        }
    }
}

/// A sized instruction to transact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub symbol: Symbol,
    pub action: Action,
    pub quantity: NonZeroU64,
}

impl OrderEvent {
    pub fn new(symbol: impl Into<Symbol>, action: Action, quantity: u64) -> Result<Self, EventError> {
        let symbol = symbol.into();
        match NonZeroU64::new(quantity) {
            Some(quantity) => Ok(Self {
                symbol,
                action,
                quantity,
            }),
            None => Err(EventError::ZeroQuantity { symbol }),
        }
    }

    /// Quantity signed by direction (buys positive).
    pub fn signed_quantity(&self) -> i64 {
        self.action.sign() * self.quantity.get() as i64
    }
}

/// Execution result of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    pub timestamp: NaiveDateTime,
    pub symbol: Symbol,
    pub action: Action,
    pub quantity: NonZeroU64,
    pub venue: String,
    pub price: Price,
    pub commission: Price,
}

impl FillEvent {
    /// Gross notional (price × quantity), always non-negative for non-negative prices.
    pub fn notional(&self) -> Price {
        self.price.times(self.quantity.get() as i64)
    }
}

/// Sentiment score for an instrument. Reserved for sentiment feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentEvent {
    pub symbol: Symbol,
    pub timestamp: NaiveDateTime,
    pub score: f64,
}

/// Discriminant of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Tick,
    Bar,
    Signal,
    Order,
    Fill,
    Sentiment,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Tick => "TICK",
            EventKind::Bar => "BAR",
            EventKind::Signal => "SIGNAL",
            EventKind::Order => "ORDER",
            EventKind::Fill => "FILL",
            EventKind::Sentiment => "SENTIMENT",
        };
        f.write_str(name)
    }
}

/// Every message the session loop can dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Tick(TickEvent),
    Bar(BarEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
    Sentiment(SentimentEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Tick(_) => EventKind::Tick,
            Event::Bar(_) => EventKind::Bar,
            Event::Signal(_) => EventKind::Signal,
            Event::Order(_) => EventKind::Order,
            Event::Fill(_) => EventKind::Fill,
            Event::Sentiment(_) => EventKind::Sentiment,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Event::Tick(e) => &e.symbol,
            Event::Bar(e) => &e.symbol,
            Event::Signal(e) => &e.symbol,
            Event::Order(e) => &e.symbol,
            Event::Fill(e) => &e.symbol,
            Event::Sentiment(e) => &e.symbol,
        }
    }

    /// Market timestamp carried by the event, if any.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Event::Tick(e) => Some(e.timestamp),
            Event::Bar(e) => Some(e.timestamp),
            Event::Fill(e) => Some(e.timestamp),
            Event::Sentiment(e) => Some(e.timestamp),
            Event::Signal(_) | Event::Order(_) => None,
        }
    }
}

impl From<BarEvent> for Event {
    fn from(e: BarEvent) -> Self {
        Event::Bar(e)
    }
}

impl From<TickEvent> for Event {
    fn from(e: TickEvent) -> Self {
        Event::Tick(e)
    }
}

impl From<SignalEvent> for Event {
    fn from(e: SignalEvent) -> Self {
        Event::Signal(e)
    }
}

impl From<OrderEvent> for Event {
    fn from(e: OrderEvent) -> Self {
        Event::Order(e)
    }
}

impl From<FillEvent> for Event {
    fn from(e: FillEvent) -> Self {
        Event::Fill(e)
    }
}

impl From<SentimentEvent> for Event {
    fn from(e: SentimentEvent) -> Self {
        Event::Sentiment(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_bar() -> BarEvent {
        BarEvent::new(
            "AAA",
            ts(),
            86400,
            Price::from_units(100),
            Price::from_units(105),
            Price::from_units(98),
            Price::from_units(103),
            50_000,
            None,
        )
    }

    #[test]
    fn readable_period_lookup() {
        assert_eq!(readable_period(1), "1sec");
        assert_eq!(readable_period(60), "1min");
        assert_eq!(readable_period(3600), "1hr");
        assert_eq!(readable_period(86400), "1day");
        assert_eq!(readable_period(604800), "1wk");
        assert_eq!(readable_period(7), "7sec");
    }

    #[test]
    fn bar_carries_label_and_sanity() {
        let bar = sample_bar();
        assert_eq!(bar.period_label, "1day");
        assert!(bar.is_sane());

        let mut bad = bar.clone();
        bad.high = Price::from_units(97);
        assert!(!bad.is_sane());
    }

    #[test]
    fn order_rejects_zero_quantity() {
        let err = OrderEvent::new("AAA", Action::Buy, 0).unwrap_err();
        assert_eq!(err, EventError::ZeroQuantity { symbol: "AAA".into() });

        let order = OrderEvent::new("AAA", Action::Sell, 40).unwrap();
        assert_eq!(order.signed_quantity(), -40);
    }

    #[test]
    fn tick_rejects_crossed_quote() {
        assert!(TickEvent::new("AAA", ts(), Price::from_units(11), Price::from_units(10)).is_err());
        assert!(TickEvent::new("AAA", ts(), Price::from_units(10), Price::from_units(10)).is_ok());
    }

    #[test]
    fn event_kind_and_symbol() {
        let event: Event = sample_bar().into();
        assert_eq!(event.kind(), EventKind::Bar);
        assert_eq!(event.symbol(), "AAA");
        assert_eq!(event.timestamp(), Some(ts()));

        let signal: Event = SignalEvent::new("BBB", Action::Buy).into();
        assert_eq!(signal.kind(), EventKind::Signal);
        assert_eq!(signal.timestamp(), None);
        assert_eq!(EventKind::Signal.to_string(), "SIGNAL");
    }

    #[test]
    fn action_sign_and_serde() {
        assert_eq!(Action::Buy.sign(), 1);
        assert_eq!(Action::Sell.opposite(), Action::Buy);
        assert_eq!(serde_json::to_string(&Action::Sell).unwrap(), "\"SELL\"");
    }
}
