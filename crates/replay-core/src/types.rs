use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ReplayError;

/// Candles at or before the anchor in a freshly selected random window.
pub const INITIAL_LOOKBACK_CANDLES: usize = 3000;
/// Candles guaranteed after the anchor of a random window.
pub const RANDOM_FUTURE_CANDLES: usize = 500;
/// Older candles requested per infinite-scroll page.
pub const PAGINATION_LIMIT: usize = 500;
/// Upstream page size.
pub const UPSTREAM_PAGE_LIMIT: u32 = 600;
/// Pause between consecutive upstream page requests.
pub const UPSTREAM_PAGE_DELAY_MS: u64 = 80;

/// Bar resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "5min")]
    Min5,
    #[serde(rename = "15min")]
    Min15,
    #[serde(rename = "hour")]
    Hour1,
    #[serde(rename = "4hour")]
    Hour4,
    #[serde(rename = "day")]
    Day1,
}

impl Interval {
    /// Name used both in the store and on the upstream wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min5 => "5min",
            Interval::Min15 => "15min",
            Interval::Hour1 => "hour",
            Interval::Hour4 => "4hour",
            Interval::Day1 => "day",
        }
    }

    /// Length of one bar
    pub fn duration(&self) -> Duration {
        match self {
            Interval::Min5 => Duration::minutes(5),
            Interval::Min15 => Duration::minutes(15),
            Interval::Hour1 => Duration::hours(1),
            Interval::Hour4 => Duration::hours(4),
            Interval::Day1 => Duration::days(1),
        }
    }

    /// Snap `time` down to the start of the bar that contains it (UTC).
    pub fn floor(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let (hour, minute) = match self {
            Interval::Min5 => (time.hour(), time.minute() / 5 * 5),
            Interval::Min15 => (time.hour(), time.minute() / 15 * 15),
            Interval::Hour1 => (time.hour(), 0),
            Interval::Hour4 => (time.hour() / 4 * 4, 0),
            Interval::Day1 => (0, 0),
        };
        // hour < 24 and minute < 60 by construction
        let clock = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
        time.date_naive().and_time(clock).and_utc()
    }

    pub fn all() -> &'static [Interval] {
        &[
            Interval::Min5,
            Interval::Min15,
            Interval::Hour1,
            Interval::Hour4,
            Interval::Day1,
        ]
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5min" => Ok(Interval::Min5),
            "15min" => Ok(Interval::Min15),
            "hour" | "1h" | "1hour" => Ok(Interval::Hour1),
            "4hour" | "4h" => Ok(Interval::Hour4),
            "day" | "1d" | "daily" => Ok(Interval::Day1),
            other => Err(ReplayError::InvalidData(format!("Unknown interval: {}", other))),
        }
    }
}

/// OHLCV bar for one `(ticker, interval, time)` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ticker: String,
    pub interval: Interval,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub buy_volume: i64,
    pub sell_volume: i64,
}

/// Ascending run of candles for one `(ticker, interval)` as returned by window queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleWindow {
    pub candles: Vec<Candle>,
    pub has_more_past: bool,
}

impl CandleWindow {
    pub fn new(candles: Vec<Candle>, has_more_past: bool) -> Self {
        Self { candles, has_more_past }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first_time(&self) -> Option<DateTime<Utc>> {
        self.candles.first().map(|c| c.time)
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.time)
    }
}

/// One request against the upstream candle history API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub ticker: String,
    pub instrument_id: String,
    pub series_id: Option<String>,
    pub interval: Interval,
    pub limit: u32,
    /// Exclusive upper bound; `None` asks for the newest page.
    pub to: Option<DateTime<Utc>>,
    pub session_id: String,
}

/// One upstream page, already converted to candles for the requested key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandlePage {
    pub candles: Vec<Candle>,
    pub has_more_past: bool,
}

impl CandlePage {
    /// Earliest time in the page regardless of the order the upstream sent it in.
    pub fn oldest_time(&self) -> Option<DateTime<Utc>> {
        self.candles.iter().map(|c| c.time).min()
    }
}
