use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use replay_core::{
    Candle, CandleSource, CandleWindow, Interval, ReplayError, INITIAL_LOOKBACK_CANDLES,
    RANDOM_FUTURE_CANDLES,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Monday 2024-01-08 07:00 UTC
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 7, 0, 0).unwrap()
}

pub fn candle(ticker: &str, interval: Interval, time: DateTime<Utc>, close: f64) -> Candle {
    Candle {
        ticker: ticker.to_string(),
        interval,
        time,
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 100,
        buy_volume: 60,
        sell_volume: 40,
    }
}

/// `n` back-to-back bars starting at `start`.
pub fn series(ticker: &str, interval: Interval, start: DateTime<Utc>, n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let time = start + interval.duration() * i as i32;
            candle(ticker, interval, time, 100.0 + (i % 7) as f64)
        })
        .collect()
}

/// Candle source over fixed in-memory series, with store-like window semantics.
/// `random_window` always picks the newest possible window so tests stay deterministic.
#[derive(Default)]
pub struct InMemorySource {
    series: HashMap<(String, Interval), Vec<Candle>>,
    failing: AtomicBool,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, candles: Vec<Candle>) -> Self {
        if let Some(first) = candles.first() {
            let key = (first.ticker.clone(), first.interval);
            self.series.insert(key, candles);
        }
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn get(&self, ticker: &str, interval: Interval) -> Result<&[Candle], ReplayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReplayError::Database("store unavailable".to_string()));
        }
        Ok(self
            .series
            .get(&(ticker.to_string(), interval))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    fn window_of(all: &[Candle], slice: &[Candle]) -> CandleWindow {
        let has_more_past = match (all.first(), slice.first()) {
            (Some(a), Some(s)) => a.time < s.time,
            _ => false,
        };
        CandleWindow::new(slice.to_vec(), has_more_past)
    }
}

#[async_trait]
impl CandleSource for InMemorySource {
    async fn random_window(
        &self,
        ticker: Option<&str>,
        interval: Interval,
    ) -> Result<CandleWindow, ReplayError> {
        let ticker = match ticker {
            Some(t) => t.to_string(),
            None => self
                .series
                .keys()
                .find(|(_, i)| *i == interval)
                .map(|(t, _)| t.clone())
                .ok_or_else(|| ReplayError::InsufficientData("empty".to_string()))?,
        };
        let all = self.get(&ticker, interval)?;
        if all.is_empty() {
            return Err(ReplayError::InsufficientData(ticker));
        }
        let span = INITIAL_LOOKBACK_CANDLES + RANDOM_FUTURE_CANDLES;
        let start = all.len().saturating_sub(span);
        Ok(Self::window_of(all, &all[start..]))
    }

    async fn window_before(
        &self,
        ticker: &str,
        interval: Interval,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleWindow, ReplayError> {
        let all = self.get(ticker, interval)?;
        let end = all.iter().position(|c| c.time >= before).unwrap_or(all.len());
        let start = end.saturating_sub(limit);
        Ok(Self::window_of(all, &all[start..end]))
    }

    async fn window_aligned(
        &self,
        ticker: &str,
        interval: Interval,
        target: DateTime<Utc>,
    ) -> Result<CandleWindow, ReplayError> {
        let all = self.get(ticker, interval)?;
        let split = all.iter().position(|c| c.time > target).unwrap_or(all.len());
        let start = split.saturating_sub(INITIAL_LOOKBACK_CANDLES);
        let end = (split + RANDOM_FUTURE_CANDLES).min(all.len());
        Ok(Self::window_of(all, &all[start..end]))
    }

    async fn list_tickers(&self) -> Result<Vec<String>, ReplayError> {
        let mut tickers: Vec<String> = self.series.keys().map(|(t, _)| t.clone()).collect();
        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }

    async fn list_intervals(&self, ticker: &str) -> Result<Vec<Interval>, ReplayError> {
        let mut intervals: Vec<Interval> = self
            .series
            .keys()
            .filter(|(t, _)| t == ticker)
            .map(|(_, i)| *i)
            .collect();
        intervals.sort();
        Ok(intervals)
    }
}
