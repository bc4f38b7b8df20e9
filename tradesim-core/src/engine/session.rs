//! Trading session: the event dispatch loop.
//!
//! Each iteration pops one event and routes it by an exhaustive match. An
//! empty queue asks the price stream for the next bar. A backtest ends when
//! the stream is exhausted and the queue has drained, so the consequences of
//! the final bar are still processed. A live session ends when the clock
//! passes its deadline.

use super::portfolio_handler::{HandlerStats, PortfolioHandler};
use super::queue::EventQueue;
use crate::data::PriceHandler;
use crate::domain::{ClosedPosition, Event, Portfolio, PortfolioSnapshot, Price};
use crate::strategy::Strategy;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a live session needs an end_session_time")]
    MissingEndTime,

    #[error("session has already run")]
    AlreadyRun,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Backtest,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Ready,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub mode: SessionMode,
    /// Deadline for live sessions. Ignored in backtests.
    pub end_session_time: Option<NaiveDateTime>,
    /// Sleep between polls when a live session has nothing to do.
    pub idle_poll_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Backtest,
            end_session_time: None,
            idle_poll_ms: 250,
        }
    }
}

impl SessionConfig {
    pub fn backtest() -> Self {
        Self::default()
    }

    pub fn live(end_session_time: NaiveDateTime) -> Self {
        Self {
            mode: SessionMode::Live,
            end_session_time: Some(end_session_time),
            ..Self::default()
        }
    }
}

/// Wall-clock source for live sessions.
pub trait Clock: Send {
    fn now(&self) -> NaiveDateTime;

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: Price,
    pub cash: Price,
}

/// How many events of each kind the loop dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchCounts {
    pub bars: u64,
    pub ticks: u64,
    pub signals: u64,
    pub orders: u64,
    pub fills: u64,
    pub sentiments: u64,
    pub stream_polls: u64,
    pub idle_polls: u64,
}

impl DispatchCounts {
    pub fn total_events(&self) -> u64 {
        self.bars + self.ticks + self.signals + self.orders + self.fills + self.sentiments
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub mode: SessionMode,
    pub final_time: Option<NaiveDateTime>,
    pub equity_curve: Vec<EquityPoint>,
    pub snapshot: PortfolioSnapshot,
    pub closed_positions: Vec<ClosedPosition>,
    pub dispatch: DispatchCounts,
    pub handler: HandlerStats,
    pub skipped_rows: usize,
    pub events_pushed: u64,
}

pub struct TradingSession {
    config: SessionConfig,
    queue: EventQueue,
    prices: Box<dyn PriceHandler>,
    strategy: Box<dyn Strategy>,
    handler: PortfolioHandler,
    clock: Box<dyn Clock>,
    state: SessionState,
    cur_time: Option<NaiveDateTime>,
    equity_curve: Vec<EquityPoint>,
    dispatch: DispatchCounts,
}

impl TradingSession {
    pub fn new(
        config: SessionConfig,
        prices: Box<dyn PriceHandler>,
        strategy: Box<dyn Strategy>,
        handler: PortfolioHandler,
    ) -> Result<Self, SessionError> {
        if config.mode == SessionMode::Live && config.end_session_time.is_none() {
            return Err(SessionError::MissingEndTime);
        }
        Ok(Self {
            config,
            queue: EventQueue::new(),
            prices,
            strategy,
            handler,
            clock: Box::new(SystemClock),
            state: SessionState::Ready,
            cur_time: None,
            equity_curve: Vec::new(),
            dispatch: DispatchCounts::default(),
        })
    }

    /// Replace the wall clock used by live sessions.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run to completion. A session runs at most once.
    pub fn run(&mut self) -> Result<SessionReport, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::AlreadyRun);
        }
        self.state = SessionState::Running;
        match self.config.mode {
            SessionMode::Backtest => info!(
                strategy = self.strategy.name(),
                instruments = ?self.prices.subscribed(),
                "running backtest"
            ),
            SessionMode::Live => info!(
                strategy = self.strategy.name(),
                until = ?self.config.end_session_time,
                "running live session"
            ),
        }

        while self.continue_loop() {
            match self.queue.pop_nonblocking() {
                Some(event) => self.dispatch(event),
                None => self.advance(),
            }
        }

        self.state = SessionState::Stopped;
        let report = self.report();
        info!(
            events = report.dispatch.total_events(),
            fills = report.dispatch.fills,
            skipped_rows = report.skipped_rows,
            equity = %report.snapshot.equity,
            "session stopped"
        );
        Ok(report)
    }

    fn continue_loop(&self) -> bool {
        match self.config.mode {
            SessionMode::Backtest => self.prices.continue_backtest() || !self.queue.is_empty(),
            SessionMode::Live => match self.config.end_session_time {
                Some(end) => self.clock.now() < end,
                None => false,
            },
        }
    }

    /// Queue is empty: pull the next bar, or idle in live mode.
    fn advance(&mut self) {
        if self.prices.continue_backtest() {
            self.dispatch.stream_polls += 1;
            self.prices.stream_next(&mut self.queue);
        } else if self.config.mode == SessionMode::Live {
            self.dispatch.idle_polls += 1;
            self.clock
                .sleep(Duration::from_millis(self.config.idle_poll_ms));
        }
    }

    fn dispatch(&mut self, event: Event) {
        debug!(kind = %event.kind(), symbol = event.symbol(), "dispatch");
        match &event {
            Event::Tick(tick) => {
                self.dispatch.ticks += 1;
                self.on_market_event(tick.timestamp, &event);
            }
            Event::Bar(bar) => {
                self.dispatch.bars += 1;
                self.on_market_event(bar.timestamp, &event);
            }
            Event::Sentiment(_) => {
                self.dispatch.sentiments += 1;
                self.strategy.calculate_signals(&event, &mut self.queue);
            }
            Event::Signal(signal) => {
                self.dispatch.signals += 1;
                // failures are logged and counted by the handler
                let _ = self.handler.on_signal(signal, &mut self.queue);
            }
            Event::Order(order) => {
                self.dispatch.orders += 1;
                let _ = self
                    .handler
                    .on_order(order, self.prices.as_ref(), &mut self.queue);
            }
            Event::Fill(fill) => {
                self.dispatch.fills += 1;
                let _ = self.handler.on_fill(fill, self.prices.as_ref());
            }
        }
    }

    fn on_market_event(&mut self, timestamp: NaiveDateTime, event: &Event) {
        self.cur_time = Some(timestamp);
        self.strategy.calculate_signals(event, &mut self.queue);
        self.handler.mark_to_market(self.prices.as_ref());

        let portfolio = self.handler.portfolio();
        let point = EquityPoint {
            timestamp,
            equity: portfolio.equity(),
            cash: portfolio.cash(),
        };
        // one point per timestamp; later instruments at the same time overwrite
        match self.equity_curve.last_mut() {
            Some(last) if last.timestamp == timestamp => *last = point,
            _ => self.equity_curve.push(point),
        }
    }

    pub fn report(&self) -> SessionReport {
        let portfolio = self.handler.portfolio();
        SessionReport {
            mode: self.config.mode,
            final_time: self.cur_time,
            equity_curve: self.equity_curve.clone(),
            snapshot: portfolio.snapshot(),
            closed_positions: portfolio.closed_positions().to_vec(),
            dispatch: self.dispatch,
            handler: self.handler.stats(),
            skipped_rows: self.prices.skipped_rows(),
            events_pushed: self.queue.total_pushed(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cur_time(&self) -> Option<NaiveDateTime> {
        self.cur_time
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.handler.portfolio()
    }

    pub fn prices(&self) -> &dyn PriceHandler {
        self.prices.as_ref()
    }

    /// Queue access for injecting events (e.g. sentiment) before `run`.
    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }
}
