use candle_store::CandleStore;
use chrono::{DateTime, Utc};
use history_client::{Instrument, InstrumentRegistry};
use replay_core::{
    Candle, CandlePageSource, Interval, PageRequest, ReplayError, UPSTREAM_PAGE_DELAY_MS,
    UPSTREAM_PAGE_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Intervals covered by a full sweep.
pub const DEFAULT_SYNC_INTERVALS: &[Interval] = &[Interval::Min5, Interval::Hour1, Interval::Day1];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upstream session credential; required for any run.
    pub session_id: Option<String>,
    pub page_limit: u32,
    pub page_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            session_id: None,
            page_limit: UPSTREAM_PAGE_LIMIT,
            page_delay: Duration::from_millis(UPSTREAM_PAGE_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Backfill,
    Incremental,
}

/// Outcome of one `(ticker, interval)` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub ticker: String,
    pub interval: Interval,
    pub mode: SyncMode,
    pub pages: usize,
    pub fetched: usize,
    pub persisted: usize,
}

struct Fetched {
    candles: Vec<Candle>,
    pages: usize,
    fetched: usize,
}

/// Pages upstream history into the candle store
pub struct IngestionPipeline {
    store: CandleStore,
    source: Arc<dyn CandlePageSource>,
    registry: InstrumentRegistry,
    config: PipelineConfig,
}

impl IngestionPipeline {
    pub fn new(
        store: CandleStore,
        source: Arc<dyn CandlePageSource>,
        registry: InstrumentRegistry,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            source,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    fn session_id(&self) -> Result<String, ReplayError> {
        match self.config.session_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(ReplayError::MissingCredential),
        }
    }

    /// Backfill when nothing is stored for the key, otherwise fetch only newer candles.
    pub async fn sync(&self, ticker: &str, interval: Interval) -> Result<SyncReport, ReplayError> {
        let instrument = self.registry.resolve(ticker)?;
        let session_id = self.session_id()?;

        let latest = self.store.latest_time(ticker, interval).await?;
        let report = self.run(instrument, interval, &session_id, latest).await?;

        tracing::info!(
            "{} {} {:?}: {} pages, {} fetched, {} persisted",
            report.ticker,
            report.interval,
            report.mode,
            report.pages,
            report.fetched,
            report.persisted
        );
        Ok(report)
    }

    /// Full history load regardless of what is already stored.
    pub async fn backfill(
        &self,
        ticker: &str,
        interval: Interval,
    ) -> Result<SyncReport, ReplayError> {
        let instrument = self.registry.resolve(ticker)?;
        let session_id = self.session_id()?;
        self.run(instrument, interval, &session_id, None).await
    }

    /// Fetch candles strictly newer than `latest`.
    pub async fn update(
        &self,
        ticker: &str,
        interval: Interval,
        latest: DateTime<Utc>,
    ) -> Result<SyncReport, ReplayError> {
        let instrument = self.registry.resolve(ticker)?;
        let session_id = self.session_id()?;
        self.run(instrument, interval, &session_id, Some(latest)).await
    }

    /// Sync every registered ticker for each of `intervals`, one key at a time.
    /// The first failing key aborts the sweep.
    pub async fn sync_all(&self, intervals: &[Interval]) -> Result<Vec<SyncReport>, ReplayError> {
        let mut reports = Vec::new();
        for ticker in self.registry.tickers() {
            for &interval in intervals {
                match self.sync(&ticker, interval).await {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        tracing::error!("Sync of {} {} failed: {}", ticker, interval, e);
                        return Err(e);
                    }
                }
            }
        }
        Ok(reports)
    }

    async fn run(
        &self,
        instrument: &Instrument,
        interval: Interval,
        session_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncReport, ReplayError> {
        let mode = if since.is_some() {
            SyncMode::Incremental
        } else {
            SyncMode::Backfill
        };

        let Fetched {
            candles,
            pages,
            fetched,
        } = self.fetch_pages(instrument, interval, session_id, since).await?;

        let batch = prepare_batch(candles);
        let persisted = self.store.upsert_batch(&batch).await?;

        Ok(SyncReport {
            ticker: instrument.ticker.clone(),
            interval,
            mode,
            pages,
            fetched,
            persisted,
        })
    }

    async fn fetch_pages(
        &self,
        instrument: &Instrument,
        interval: Interval,
        session_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Fetched, ReplayError> {
        let mut request = PageRequest {
            ticker: instrument.ticker.clone(),
            instrument_id: instrument.instrument_id.clone(),
            series_id: instrument.series_id.clone(),
            interval,
            limit: self.config.page_limit,
            to: None,
            session_id: session_id.to_string(),
        };

        let mut candles = Vec::new();
        let mut pages = 0;
        let mut fetched = 0;

        loop {
            if pages > 0 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }

            let page = self.source.fetch_page(&request).await?;
            pages += 1;
            fetched += page.candles.len();

            let Some(oldest) = page.oldest_time() else {
                break;
            };
            let more = page.has_more_past;
            tracing::debug!(
                "{} {} page {}: {} candles, oldest {}",
                instrument.ticker,
                interval,
                pages,
                page.candles.len(),
                oldest
            );

            match since {
                Some(latest) => candles.extend(page.candles.into_iter().filter(|c| c.time > latest)),
                None => candles.extend(page.candles),
            }

            if !more || since.is_some_and(|latest| oldest <= latest) {
                break;
            }
            if request.to == Some(oldest) {
                tracing::warn!(
                    "{} {}: cursor stuck at {}, stopping",
                    instrument.ticker,
                    interval,
                    oldest
                );
                break;
            }
            request.to = Some(oldest);
        }

        Ok(Fetched {
            candles,
            pages,
            fetched,
        })
    }
}

/// Sort ascending, drop repeated times from cursor overlap and leave out the newest bar,
/// which may still be forming upstream.
pub fn prepare_batch(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.time);
    candles.dedup_by_key(|c| c.time);
    candles.pop();
    candles
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
