use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::{CandlePage, CandleWindow, Interval, PageRequest, ReplayError};

/// Read side of the candle store as seen by a replay session
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Random window for `interval`; a ticker is picked when `ticker` is `None`.
    async fn random_window(
        &self,
        ticker: Option<&str>,
        interval: Interval,
    ) -> Result<CandleWindow, ReplayError>;

    /// Up to `limit` candles strictly older than `before`, ascending.
    async fn window_before(
        &self,
        ticker: &str,
        interval: Interval,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleWindow, ReplayError>;

    /// Window around a boundary-aligned `target`.
    async fn window_aligned(
        &self,
        ticker: &str,
        interval: Interval,
        target: DateTime<Utc>,
    ) -> Result<CandleWindow, ReplayError>;

    async fn list_tickers(&self) -> Result<Vec<String>, ReplayError>;

    async fn list_intervals(&self, ticker: &str) -> Result<Vec<Interval>, ReplayError>;
}

/// Upstream candle history, one page per call
#[async_trait]
pub trait CandlePageSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<CandlePage, ReplayError>;
}
