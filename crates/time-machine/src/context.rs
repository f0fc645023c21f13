use chrono::{DateTime, Utc};
use replay_core::Interval;
use serde::{Deserialize, Serialize};

/// Tickers quoted as futures contracts.
pub const FUTURES_TICKERS: &[&str] = &["IMOEXF"];
/// Commission on futures, in percent of notional.
pub const FUTURES_COMMISSION_PERCENT: f64 = 0.025;
/// Commission on shares, in percent of notional.
pub const STOCK_COMMISSION_PERCENT: f64 = 0.04;

pub fn commission_percent(ticker: &str) -> f64 {
    if FUTURES_TICKERS.contains(&ticker) {
        FUTURES_COMMISSION_PERCENT
    } else {
        STOCK_COMMISSION_PERCENT
    }
}

/// Live market context handed to the order sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeContext {
    pub ticker: String,
    pub interval: Interval,
    /// Real (never obfuscated) time of the anchor candle
    pub current_time: DateTime<Utc>,
    pub current_price: f64,
    pub commission_percent: f64,
}
