//! Replay Session
//!
//! Holds the in-memory candle window for one `(ticker, interval)` selection and
//! the anchor that marks simulated "now". Every load is split into a
//! `begin_*` call that returns a tagged [`LoadRequest`] and an [`apply`] call
//! that accepts the result only while the tag still matches the selection.
//!
//! [`apply`]: ReplaySession::apply

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use replay_core::{
    Candle, CandleSource, CandleWindow, Interval, ReplayError, INITIAL_LOOKBACK_CANDLES,
    PAGINATION_LIMIT,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::calendar::skip_weekend;
use crate::context::{commission_percent, TradeContext};

/// Interval every new random session starts on.
pub const RESET_INTERVAL: Interval = Interval::Min5;

/// How close (seconds) the visible range may get to the oldest loaded candle before more history is fetched.
pub const PAGINATION_TRIGGER_SECS: i64 = 60;

/// Identity of the selection a load was issued for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    pub ticker: String,
    pub interval: Interval,
    /// Bumped on every reset or selection change
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadKind {
    /// Fresh random window.
    Random,
    /// Window re-aligned to a bar boundary after a timeframe or ticker switch.
    Aligned { target: DateTime<Utc> },
    /// Older history for infinite scroll.
    Before { before: DateTime<Utc>, limit: usize },
}

/// One asynchronous store query, tagged with the selection it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub key: SelectionKey,
    pub kind: LoadKind,
}

impl LoadRequest {
    pub async fn run(&self, source: &dyn CandleSource) -> Result<CandleWindow, ReplayError> {
        let ticker = self.key.ticker.as_str();
        let interval = self.key.interval;
        match self.kind {
            LoadKind::Random => source.random_window(Some(ticker), interval).await,
            LoadKind::Aligned { target } => source.window_aligned(ticker, interval, target).await,
            LoadKind::Before { before, limit } => {
                source.window_before(ticker, interval, before, limit).await
            }
        }
    }
}

/// What [`ReplaySession::apply`] did with a load result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Result belonged to a superseded selection and was dropped.
    Stale,
    Replaced,
    Prepended(usize),
    /// Pagination found nothing older.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    WindowReplaced { key: SelectionKey, len: usize },
    WindowExtended { key: SelectionKey, added: usize },
    AnchorChanged { index: usize, time: DateTime<Utc> },
    LoadFailed { key: SelectionKey, message: String },
}

pub struct ReplaySession {
    tickers: Vec<String>,
    ticker: Option<String>,
    interval: Interval,
    window: CandleWindow,
    anchor: usize,
    /// Anchor time carried across a selection switch until the new window lands
    moment: Option<DateTime<Utc>>,
    epoch: u64,
    paginating: bool,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for ReplaySession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplaySession {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            tickers: Vec::new(),
            ticker: None,
            interval: RESET_INTERVAL,
            window: CandleWindow::empty(),
            anchor: 0,
            moment: None,
            epoch: 0,
            paginating: false,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn set_tickers(&mut self, tickers: Vec<String>) {
        self.tickers = tickers;
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn ticker(&self) -> Option<&str> {
        self.ticker.as_deref()
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    pub fn anchor_index(&self) -> usize {
        self.anchor
    }

    pub fn anchor_candle(&self) -> Option<&Candle> {
        self.window.candles.get(self.anchor)
    }

    pub fn anchor_time(&self) -> Option<DateTime<Utc>> {
        self.anchor_candle().map(|c| c.time)
    }

    /// Index of the last loaded candle, 0 for an empty window.
    pub fn last_index(&self) -> usize {
        self.window.len().saturating_sub(1)
    }

    /// Candles up to and including the anchor.
    pub fn visible(&self) -> &[Candle] {
        if self.window.is_empty() {
            &[]
        } else {
            &self.window.candles[..=self.anchor]
        }
    }

    pub fn is_paginating(&self) -> bool {
        self.paginating
    }

    pub fn key(&self) -> Option<SelectionKey> {
        self.ticker.as_ref().map(|ticker| SelectionKey {
            ticker: ticker.clone(),
            interval: self.interval,
            epoch: self.epoch,
        })
    }

    fn switch_to(&mut self, ticker: String, interval: Interval) -> SelectionKey {
        self.epoch += 1;
        self.ticker = Some(ticker.clone());
        self.interval = interval;
        self.window = CandleWindow::empty();
        self.anchor = 0;
        self.paginating = false;
        SelectionKey {
            ticker,
            interval,
            epoch: self.epoch,
        }
    }

    /// Start a new random session on a random ticker at [`RESET_INTERVAL`].
    pub fn begin_reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<LoadRequest, ReplayError> {
        let ticker = self
            .tickers
            .choose(rng)
            .cloned()
            .ok_or_else(|| ReplayError::InsufficientData("no tickers available".to_string()))?;

        let key = self.switch_to(ticker, RESET_INTERVAL);
        self.moment = None;
        tracing::debug!("Reset to {} {} (epoch {})", key.ticker, key.interval, key.epoch);
        Ok(LoadRequest {
            key,
            kind: LoadKind::Random,
        })
    }

    /// Switch timeframe, keeping the current moment in view.
    pub fn begin_select_interval(&mut self, interval: Interval) -> Result<LoadRequest, ReplayError> {
        let ticker = self
            .ticker
            .clone()
            .ok_or_else(|| ReplayError::InvalidData("no ticker selected".to_string()))?;
        Ok(self.begin_aligned(ticker, interval))
    }

    /// Switch ticker at the current interval, keeping the current moment in view.
    pub fn begin_select_ticker(&mut self, ticker: &str) -> Result<LoadRequest, ReplayError> {
        if !self.tickers.is_empty() && !self.tickers.iter().any(|t| t == ticker) {
            return Err(ReplayError::UnknownTicker(ticker.to_string()));
        }
        Ok(self.begin_aligned(ticker.to_string(), self.interval))
    }

    fn begin_aligned(&mut self, ticker: String, interval: Interval) -> LoadRequest {
        let moment = self.anchor_time().or(self.moment);
        let key = self.switch_to(ticker, interval);
        self.moment = moment;
        let kind = match moment.map(|t| interval.floor(t)) {
            Some(target) => LoadKind::Aligned { target },
            None => LoadKind::Random,
        };
        LoadRequest { key, kind }
    }

    /// Request older history when the visible range nears the oldest loaded candle.
    pub fn begin_load_more(&mut self, visible_from: DateTime<Utc>) -> Option<LoadRequest> {
        if self.paginating || !self.window.has_more_past {
            return None;
        }
        let oldest = self.window.first_time()?;
        if visible_from > oldest + Duration::seconds(PAGINATION_TRIGGER_SECS) {
            return None;
        }
        let key = self.key()?;
        self.paginating = true;
        Some(LoadRequest {
            key,
            kind: LoadKind::Before {
                before: oldest,
                limit: PAGINATION_LIMIT,
            },
        })
    }

    /// Apply a finished load. Results for a superseded selection are ignored.
    pub fn apply(
        &mut self,
        request: &LoadRequest,
        result: Result<CandleWindow, ReplayError>,
    ) -> Result<Applied, ReplayError> {
        if self.key().as_ref() != Some(&request.key) {
            tracing::debug!("Dropping stale {:?} load for epoch {}", request.kind, request.key.epoch);
            return Ok(Applied::Stale);
        }

        let window = match result {
            Ok(window) => window,
            Err(e) => {
                if matches!(request.kind, LoadKind::Before { .. }) {
                    self.paginating = false;
                }
                self.emit(SessionEvent::LoadFailed {
                    key: request.key.clone(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        match request.kind {
            LoadKind::Random => {
                self.window = window;
                let candidate = self.last_index().min(INITIAL_LOOKBACK_CANDLES - 1);
                self.anchor = skip_weekend(&self.window.candles, candidate);
                self.emit(SessionEvent::WindowReplaced {
                    key: request.key.clone(),
                    len: self.window.len(),
                });
                self.emit_anchor();
                Ok(Applied::Replaced)
            }
            LoadKind::Aligned { target } => {
                self.anchor = window
                    .candles
                    .iter()
                    .rposition(|c| c.time <= target)
                    .unwrap_or(0);
                self.window = window;
                self.emit(SessionEvent::WindowReplaced {
                    key: request.key.clone(),
                    len: self.window.len(),
                });
                Ok(Applied::Replaced)
            }
            LoadKind::Before { .. } => {
                self.paginating = false;
                let oldest = self.window.first_time();
                let mut older: Vec<Candle> = window
                    .candles
                    .into_iter()
                    .filter(|c| oldest.map_or(true, |o| c.time < o))
                    .collect();

                if older.is_empty() {
                    self.window.has_more_past = false;
                    return Ok(Applied::Exhausted);
                }

                let added = older.len();
                older.append(&mut self.window.candles);
                self.window.candles = older;
                self.window.has_more_past = window.has_more_past;
                self.anchor += added;
                self.emit(SessionEvent::WindowExtended {
                    key: request.key.clone(),
                    added,
                });
                Ok(Applied::Prepended(added))
            }
        }
    }

    fn emit_anchor(&self) {
        if let Some(time) = self.anchor_time() {
            self.emit(SessionEvent::AnchorChanged {
                index: self.anchor,
                time,
            });
        }
    }

    /// One playback step. Returns `false` when already at the last candle.
    pub fn advance(&mut self) -> bool {
        if self.window.is_empty() || self.anchor >= self.last_index() {
            return false;
        }
        self.anchor += 1;
        self.emit_anchor();
        true
    }

    /// Move the anchor to the candle with exactly `time`, if loaded.
    pub fn jump_to_time(&mut self, time: DateTime<Utc>) -> bool {
        match self.window.candles.iter().position(|c| c.time == time) {
            Some(index) => {
                self.anchor = index;
                self.emit_anchor();
                true
            }
            None => false,
        }
    }

    pub fn trade_context(&self) -> Option<TradeContext> {
        let ticker = self.ticker.as_ref()?;
        let candle = self.anchor_candle()?;
        Some(TradeContext {
            ticker: ticker.clone(),
            interval: self.interval,
            current_time: candle.time,
            current_price: candle.close,
            commission_percent: commission_percent(ticker),
        })
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
