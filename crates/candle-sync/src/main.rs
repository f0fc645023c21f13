//! candle-sync: bring the local candle store up to date with the upstream history API.
//!
//! Usage:
//!   candle-sync SBER 5min
//!   candle-sync ALL --session <ID>
//!   candle-sync GAZP day --db sqlite:/data/candles.db

use anyhow::{Context, Result};
use candle_store::CandleStore;
use candle_sync::{IngestionPipeline, SyncConfig, DEFAULT_SYNC_INTERVALS};
use history_client::{HistoryClient, InstrumentRegistry};
use replay_core::Interval;
use std::sync::Arc;

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  candle-sync <TICKER> <INTERVAL>   Sync one ticker (intervals: 5min, 15min, hour, 4hour, day)");
    eprintln!("  candle-sync ALL                   Sync every known ticker for 5min, hour and day");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --session ID   Upstream session id (default: $CANDLE_SYNC_SESSION_ID)");
    eprintln!("  --db URL       SQLite URL (default: $CANDLE_DB_URL or sqlite:candles.db)");
    std::process::exit(1);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "candle_sync=info,history_client=warn".into())
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = SyncConfig::from_env()?;
    if let Some(session) = flag_value(&args, "--session") {
        config.session_id = Some(session.to_string());
    }
    if let Some(db) = flag_value(&args, "--db") {
        config.database_url = db.to_string();
    }

    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--session" || arg == "--db" {
            iter.next();
        } else if !arg.starts_with("--") {
            positional.push(arg.as_str());
        }
    }

    let store = CandleStore::open(&config.database_url)
        .await
        .with_context(|| format!("Failed to open candle store at {}", config.database_url))?;
    let client = HistoryClient::new(config.base_url.clone(), config.timeout());
    let pipeline = IngestionPipeline::new(
        store,
        Arc::new(client),
        InstrumentRegistry::default_universe(),
        config.pipeline_config(),
    );

    match positional.as_slice() {
        [all] if all.eq_ignore_ascii_case("ALL") => {
            tracing::info!(
                "Syncing {} tickers x {} intervals",
                pipeline.registry().len(),
                DEFAULT_SYNC_INTERVALS.len()
            );
            let reports = pipeline.sync_all(DEFAULT_SYNC_INTERVALS).await?;
            let persisted: usize = reports.iter().map(|r| r.persisted).sum();
            tracing::info!("Done: {} keys, {} candles persisted", reports.len(), persisted);
        }
        [ticker, interval] => {
            let interval: Interval = interval.parse()?;
            let ticker = ticker.to_uppercase();
            pipeline
                .sync(&ticker, interval)
                .await
                .with_context(|| format!("Sync of {} {} failed", ticker, interval))?;
        }
        _ => usage(),
    }

    Ok(())
}
