use anyhow::{Context, Result};
use history_client::DEFAULT_BASE_URL;
use replay_core::{UPSTREAM_PAGE_DELAY_MS, UPSTREAM_PAGE_LIMIT};
use std::env;
use std::time::Duration;

use crate::PipelineConfig;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    pub session_id: Option<String>,
    pub base_url: String,
    pub page_limit: u32,
    pub page_delay_ms: u64,
    pub timeout_secs: u64,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("CANDLE_DB_URL")
                .unwrap_or_else(|_| "sqlite:candles.db".to_string()),
            session_id: env::var("CANDLE_SYNC_SESSION_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            base_url: env::var("CANDLE_SYNC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            page_limit: env::var("CANDLE_SYNC_PAGE_LIMIT")
                .unwrap_or_else(|_| UPSTREAM_PAGE_LIMIT.to_string())
                .parse()
                .context("CANDLE_SYNC_PAGE_LIMIT must be a positive integer")?,
            page_delay_ms: env::var("CANDLE_SYNC_PAGE_DELAY_MS")
                .unwrap_or_else(|_| UPSTREAM_PAGE_DELAY_MS.to_string())
                .parse()
                .context("CANDLE_SYNC_PAGE_DELAY_MS must be a whole number of milliseconds")?,
            timeout_secs: env::var("CANDLE_SYNC_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("CANDLE_SYNC_TIMEOUT_SECS must be a whole number of seconds")?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            session_id: self.session_id.clone(),
            page_limit: self.page_limit,
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }
}
