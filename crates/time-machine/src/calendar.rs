//! Weekend handling for freshly loaded replay windows.
//!
//! The exchange runs a thin weekend session, so a random anchor that lands
//! between Friday evening and Sunday afternoon is moved forward to the first
//! bar after the weekend.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use replay_core::Candle;

const WEEKEND_START_HOUR: u32 = 17;
const WEEKEND_END_HOUR: u32 = 14;

/// `[Friday 17:00, Sunday 14:00]` UTC for the weekend `time` belongs to.
///
/// Friday, Saturday and Sunday all map to the same weekend; other days have none.
/// A Sunday morning bar therefore counts as weekend, unlike a lookup that takes the
/// coming Friday for Sunday.
pub fn weekend_window(time: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let days_after_friday = match time.weekday() {
        Weekday::Fri => 0,
        Weekday::Sat => 1,
        Weekday::Sun => 2,
        _ => return None,
    };
    let friday = time.date_naive() - Duration::days(days_after_friday);
    let start = friday.and_time(NaiveTime::from_hms_opt(WEEKEND_START_HOUR, 0, 0)?).and_utc();
    let end = (friday + Duration::days(2))
        .and_time(NaiveTime::from_hms_opt(WEEKEND_END_HOUR, 0, 0)?)
        .and_utc();
    Some((start, end))
}

/// Cutoff to skip past when `time` falls inside a weekend window.
pub fn weekend_cutoff(time: DateTime<Utc>) -> Option<DateTime<Utc>> {
    weekend_window(time)
        .filter(|(start, end)| *start <= time && time <= *end)
        .map(|(_, end)| end)
}

/// Move `idx` to the first candle after the weekend cutoff when it sits inside a weekend.
/// Keeps `idx` if there is no such candle.
pub fn skip_weekend(candles: &[Candle], idx: usize) -> usize {
    let Some(candidate) = candles.get(idx) else {
        return idx;
    };
    let Some(cutoff) = weekend_cutoff(candidate.time) else {
        return idx;
    };
    candles[idx..]
        .iter()
        .position(|c| c.time > cutoff)
        .map(|offset| idx + offset)
        .unwrap_or(idx)
}
