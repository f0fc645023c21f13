pub mod store;

pub use store::CandleStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use replay_core::{CandleSource, CandleWindow, Interval, ReplayError};

#[async_trait]
impl CandleSource for CandleStore {
    async fn random_window(
        &self,
        ticker: Option<&str>,
        interval: Interval,
    ) -> Result<CandleWindow, ReplayError> {
        CandleStore::random_window(self, ticker, interval).await
    }

    async fn window_before(
        &self,
        ticker: &str,
        interval: Interval,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleWindow, ReplayError> {
        self.before(ticker, interval, before, limit).await
    }

    async fn window_aligned(
        &self,
        ticker: &str,
        interval: Interval,
        target: DateTime<Utc>,
    ) -> Result<CandleWindow, ReplayError> {
        self.aligned_window(ticker, interval, target).await
    }

    async fn list_tickers(&self) -> Result<Vec<String>, ReplayError> {
        CandleStore::list_tickers(self).await
    }

    async fn list_intervals(&self, ticker: &str) -> Result<Vec<Interval>, ReplayError> {
        CandleStore::list_intervals(self, ticker).await
    }
}
