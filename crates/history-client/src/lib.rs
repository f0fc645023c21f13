pub mod instruments;

pub use instruments::{Instrument, InstrumentRegistry};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use replay_core::{Candle, CandlePage, CandlePageSource, Interval, PageRequest, ReplayError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str =
    "https://api-invest-gw.tinkoff.ru/market-data-history/api/public/v1";
const APP_NAME: &str = "invest_terminal";
const APP_VERSION: &str = "2.0.0";

#[derive(Clone)]
pub struct HistoryClient {
    base_url: String,
    client: Client,
}

impl HistoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("instrument_id", request.instrument_id.clone()),
            ("interval", request.interval.as_str().to_string()),
            ("limit", request.limit.to_string()),
            ("appName", APP_NAME.to_string()),
            ("appVersion", APP_VERSION.to_string()),
            ("sessionId", request.session_id.clone()),
        ];
        if let Some(series) = &request.series_id {
            params.push(("seriesUid", series.clone()));
        }
        if let Some(to) = request.to {
            params.push(("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        params
    }

    /// Fetch one page of history ending before `request.to` (newest page when unset).
    pub async fn get_candles(&self, request: &PageRequest) -> Result<CandlePage, ReplayError> {
        let url = format!("{}/candles", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&Self::query_params(request))
            .send()
            .await
            .map_err(|e| ReplayError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReplayError::Api(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body: CandlesResponse = response
            .json()
            .await
            .map_err(|e| ReplayError::Api(e.to_string()))?;

        let page = body.into_page(&request.ticker, request.interval)?;
        tracing::debug!(
            "{} {} page: {} candles, more={}",
            request.ticker,
            request.interval,
            page.candles.len(),
            page.has_more_past
        );
        Ok(page)
    }
}

#[async_trait]
impl CandlePageSource for HistoryClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<CandlePage, ReplayError> {
        self.get_candles(request).await
    }
}

// Response structures
#[derive(Debug, Deserialize)]
struct CandlesResponse {
    payload: CandlesPayload,
}

#[derive(Debug, Deserialize)]
struct CandlesPayload {
    #[serde(default)]
    candles: Vec<UpstreamCandle>,
    #[serde(default)]
    has_prev_candles: bool,
}

#[derive(Debug, Deserialize)]
struct UpstreamCandle {
    time: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: i64,
    #[serde(default)]
    vb: i64,
    #[serde(default)]
    vs: i64,
}

impl CandlesResponse {
    fn into_page(self, ticker: &str, interval: Interval) -> Result<CandlePage, ReplayError> {
        let candles = self
            .payload
            .candles
            .into_iter()
            .map(|raw| {
                let time = DateTime::parse_from_rfc3339(&raw.time)
                    .map_err(|e| {
                        ReplayError::InvalidData(format!("bad candle time {:?}: {}", raw.time, e))
                    })?
                    .with_timezone(&Utc);
                Ok(Candle {
                    ticker: ticker.to_string(),
                    interval,
                    time,
                    open: raw.o,
                    high: raw.h,
                    low: raw.l,
                    close: raw.c,
                    volume: raw.v,
                    buy_volume: raw.vb,
                    sell_volume: raw.vs,
                })
            })
            .collect::<Result<Vec<_>, ReplayError>>()?;

        Ok(CandlePage {
            candles,
            has_more_past: self.payload.has_prev_candles,
        })
    }
}
