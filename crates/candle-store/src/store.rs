use chrono::{DateTime, Utc};
use rand::Rng;
use replay_core::{
    Candle, CandleWindow, Interval, ReplayError, INITIAL_LOOKBACK_CANDLES, RANDOM_FUTURE_CANDLES,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

fn db_err(e: sqlx::Error) -> ReplayError {
    ReplayError::Database(e.to_string())
}

#[derive(Debug, sqlx::FromRow)]
struct CandleRow {
    ticker: String,
    interval: String,
    time: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: i64,
    vb: i64,
    vs: i64,
}

impl CandleRow {
    fn into_candle(self) -> Result<Candle, ReplayError> {
        Ok(Candle {
            interval: self.interval.parse()?,
            ticker: self.ticker,
            time: self.time,
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            volume: self.v,
            buy_volume: self.vb,
            sell_volume: self.vs,
        })
    }
}

fn into_candles(rows: Vec<CandleRow>) -> Result<Vec<Candle>, ReplayError> {
    rows.into_iter().map(CandleRow::into_candle).collect()
}

const SELECT_CANDLES: &str =
    "SELECT ticker, interval, time, o, h, l, c, v, vb, vs FROM candles";

/// Durable candle table with the window queries a replay session needs
#[derive(Clone)]
pub struct CandleStore {
    pool: SqlitePool,
}

impl CandleStore {
    /// Open (creating if missing) the database and make sure the schema exists.
    pub async fn open(database_url: &str) -> Result<Self, ReplayError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true);

        // every connection to :memory: is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ReplayError> {
        let schema = include_str!("../schema.sql");

        // sqlx runs one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace one candle by its `(ticker, interval, time)` key.
    pub async fn upsert(&self, candle: &Candle) -> Result<(), ReplayError> {
        sqlx::query(UPSERT_CANDLE)
            .bind(&candle.ticker)
            .bind(candle.interval.as_str())
            .bind(candle.time)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .bind(candle.buy_volume)
            .bind(candle.sell_volume)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Upsert every candle inside a single transaction.
    pub async fn upsert_batch(&self, candles: &[Candle]) -> Result<usize, ReplayError> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for candle in candles {
            sqlx::query(UPSERT_CANDLE)
                .bind(&candle.ticker)
                .bind(candle.interval.as_str())
                .bind(candle.time)
                .bind(candle.open)
                .bind(candle.high)
                .bind(candle.low)
                .bind(candle.close)
                .bind(candle.volume)
                .bind(candle.buy_volume)
                .bind(candle.sell_volume)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        tracing::debug!("Committed {} candles", candles.len());
        Ok(candles.len())
    }

    pub async fn latest_time(
        &self,
        ticker: &str,
        interval: Interval,
    ) -> Result<Option<DateTime<Utc>>, ReplayError> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT time FROM candles WHERE ticker = ? AND interval = ? ORDER BY time DESC LIMIT 1",
        )
        .bind(ticker)
        .bind(interval.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|(t,)| t))
    }

    pub async fn count(&self, ticker: &str, interval: Interval) -> Result<u64, ReplayError> {
        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM candles WHERE ticker = ? AND interval = ?")
                .bind(ticker)
                .bind(interval.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(n.max(0) as u64)
    }

    async fn has_older(
        &self,
        ticker: &str,
        interval: Interval,
        time: DateTime<Utc>,
    ) -> Result<bool, ReplayError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM candles WHERE ticker = ? AND interval = ? AND time < ? LIMIT 1",
        )
        .bind(ticker)
        .bind(interval.as_str())
        .bind(time)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn window_from(
        &self,
        ticker: &str,
        interval: Interval,
        candles: Vec<Candle>,
    ) -> Result<CandleWindow, ReplayError> {
        let has_more_past = match candles.first() {
            Some(first) => self.has_older(ticker, interval, first.time).await?,
            None => false,
        };
        Ok(CandleWindow::new(candles, has_more_past))
    }

    /// Up to `limit` candles strictly older than `before`, oldest first.
    pub async fn before(
        &self,
        ticker: &str,
        interval: Interval,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<CandleWindow, ReplayError> {
        let rows = sqlx::query_as::<_, CandleRow>(&format!(
            "{} WHERE ticker = ? AND interval = ? AND time < ? ORDER BY time DESC LIMIT ?",
            SELECT_CANDLES
        ))
        .bind(ticker)
        .bind(interval.as_str())
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut candles = into_candles(rows)?;
        candles.reverse();
        self.window_from(ticker, interval, candles).await
    }

    /// Contiguous random slice of `INITIAL_LOOKBACK_CANDLES + RANDOM_FUTURE_CANDLES` candles.
    pub async fn random_window(
        &self,
        ticker: Option<&str>,
        interval: Interval,
    ) -> Result<CandleWindow, ReplayError> {
        let ticker = match ticker {
            Some(t) => t.to_string(),
            None => {
                let tickers = self.tickers_with(interval).await?;
                if tickers.is_empty() {
                    return Err(ReplayError::InsufficientData(format!(
                        "no candles stored for interval {}",
                        interval
                    )));
                }
                let idx = rand::thread_rng().gen_range(0..tickers.len());
                tickers[idx].clone()
            }
        };

        let total = self.count(&ticker, interval).await?;
        if total == 0 {
            return Err(ReplayError::InsufficientData(format!(
                "no candles stored for {} {}",
                ticker, interval
            )));
        }

        let span = (INITIAL_LOOKBACK_CANDLES + RANDOM_FUTURE_CANDLES) as u64;
        let offset = if total <= span {
            0
        } else {
            rand::thread_rng().gen_range(0..=total - span)
        };

        let rows = sqlx::query_as::<_, CandleRow>(&format!(
            "{} WHERE ticker = ? AND interval = ? ORDER BY time ASC LIMIT ? OFFSET ?",
            SELECT_CANDLES
        ))
        .bind(&ticker)
        .bind(interval.as_str())
        .bind(span as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(
            "Random window {} {}: offset {} of {}",
            ticker,
            interval,
            offset,
            total
        );
        Ok(CandleWindow::new(into_candles(rows)?, offset > 0))
    }

    /// History up to and including `target` plus a bounded run of candles after it.
    pub async fn aligned_window(
        &self,
        ticker: &str,
        interval: Interval,
        target: DateTime<Utc>,
    ) -> Result<CandleWindow, ReplayError> {
        let past_rows = sqlx::query_as::<_, CandleRow>(&format!(
            "{} WHERE ticker = ? AND interval = ? AND time <= ? ORDER BY time DESC LIMIT ?",
            SELECT_CANDLES
        ))
        .bind(ticker)
        .bind(interval.as_str())
        .bind(target)
        .bind(INITIAL_LOOKBACK_CANDLES as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let future_rows = sqlx::query_as::<_, CandleRow>(&format!(
            "{} WHERE ticker = ? AND interval = ? AND time > ? ORDER BY time ASC LIMIT ?",
            SELECT_CANDLES
        ))
        .bind(ticker)
        .bind(interval.as_str())
        .bind(target)
        .bind(RANDOM_FUTURE_CANDLES as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut candles = into_candles(past_rows)?;
        candles.reverse();
        candles.extend(into_candles(future_rows)?);

        self.window_from(ticker, interval, candles).await
    }

    async fn tickers_with(&self, interval: Interval) -> Result<Vec<String>, ReplayError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT ticker FROM candles WHERE interval = ? ORDER BY ticker",
        )
        .bind(interval.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    pub async fn list_tickers(&self) -> Result<Vec<String>, ReplayError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT ticker FROM candles ORDER BY ticker")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    /// Intervals stored for `ticker`, shortest bar first.
    pub async fn list_intervals(&self, ticker: &str) -> Result<Vec<Interval>, ReplayError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT interval FROM candles WHERE ticker = ?")
                .bind(ticker)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        let mut intervals = Vec::with_capacity(rows.len());
        for (name,) in rows {
            match name.parse::<Interval>() {
                Ok(interval) => intervals.push(interval),
                Err(_) => tracing::warn!("Ignoring unknown interval {:?} for {}", name, ticker),
            }
        }
        intervals.sort();
        Ok(intervals)
    }

    /// Full ascending series for one key.
    pub async fn all(&self, ticker: &str, interval: Interval) -> Result<Vec<Candle>, ReplayError> {
        let rows = sqlx::query_as::<_, CandleRow>(&format!(
            "{} WHERE ticker = ? AND interval = ? ORDER BY time ASC",
            SELECT_CANDLES
        ))
        .bind(ticker)
        .bind(interval.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        into_candles(rows)
    }
}

const UPSERT_CANDLE: &str = r#"
    INSERT INTO candles (ticker, interval, time, o, h, l, c, v, vb, vs)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(ticker, interval, time) DO UPDATE SET
        o = excluded.o,
        h = excluded.h,
        l = excluded.l,
        c = excluded.c,
        v = excluded.v,
        vb = excluded.vb,
        vs = excluded.vs
"#;

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
