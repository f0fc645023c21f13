//! Display Projector
//!
//! Turns the visible part of a replay window into what the chart draws:
//! optionally obfuscated timestamps and labels, an RSI pane, volume bars and
//! a synthetic "forming" last bar while playback is paused.

use chrono::{DateTime, Duration, Utc};
use replay_core::{Candle, Interval};
use serde::{Deserialize, Serialize};
use technical_analysis::{rsi_display_series, RSI_PERIOD};

use crate::context::TradeContext;
use crate::session::ReplaySession;

/// Whole number of 28-year calendar cycles; weekday and time of day survive the shift.
pub const OBFUSCATE_DAYS_OFFSET: i64 = 77 * 28 * 10227;

/// Label shown instead of the ticker and interval when obfuscating.
pub const MASK: &str = "***";

pub fn obfuscate_time(time: DateTime<Utc>) -> DateTime<Utc> {
    time + Duration::days(OBFUSCATE_DAYS_OFFSET)
}

pub fn reveal_time(time: DateTime<Utc>) -> DateTime<Utc> {
    time - Duration::days(OBFUSCATE_DAYS_OFFSET)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayCandle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// In-memory only forming bar
    pub synthetic: bool,
}

impl From<&Candle> for DisplayCandle {
    fn from(c: &Candle) -> Self {
        Self {
            time: c.time,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            synthetic: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeBar {
    pub time: DateTime<Utc>,
    pub value: i64,
    pub direction: VolumeDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiPoint {
    pub time: DateTime<Utc>,
    /// 0 for bars before the first computable value
    pub value: f64,
}

/// Everything the chart and trading sidebar need for one render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayFrame {
    pub ticker_label: String,
    pub interval_label: String,
    pub candles: Vec<DisplayCandle>,
    pub rsi: Vec<RsiPoint>,
    pub volume: Vec<VolumeBar>,
    pub context: Option<TradeContext>,
    pub playing: bool,
}

/// Forming bar seen at `current`, built on top of the completed `real` bar.
///
/// `None` when `current` is a whole interval or more past the start of `real`.
pub fn build_synthetic(real: &Candle, current: &Candle, interval: Interval) -> Option<DisplayCandle> {
    if current.time - real.time >= interval.duration() {
        return None;
    }
    Some(DisplayCandle {
        time: real.time,
        open: real.open,
        high: real.high.max(current.high),
        low: real.low.min(current.low),
        close: current.close,
        volume: real.volume,
        synthetic: true,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayProjector {
    pub obfuscate: bool,
}

impl DisplayProjector {
    pub fn new(obfuscate: bool) -> Self {
        Self { obfuscate }
    }

    fn display_time(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        if self.obfuscate {
            obfuscate_time(time)
        } else {
            time
        }
    }

    pub fn project(
        &self,
        ticker: &str,
        interval: Interval,
        visible: &[Candle],
        playing: bool,
        context: Option<TradeContext>,
    ) -> DisplayFrame {
        let mut candles: Vec<DisplayCandle> = visible.iter().map(DisplayCandle::from).collect();

        if !playing && visible.len() > 2 {
            if let Some(last) = visible.last() {
                if let Some(forming) = build_synthetic(last, last, interval) {
                    let end = candles.len() - 1;
                    candles[end] = forming;
                }
            }
        }

        let closes: Vec<f64> = visible.iter().map(|c| c.close).collect();
        let rsi = rsi_display_series(&closes, RSI_PERIOD)
            .into_iter()
            .zip(visible)
            .map(|(value, c)| RsiPoint {
                time: self.display_time(c.time),
                value,
            })
            .collect();

        let volume = visible
            .iter()
            .map(|c| VolumeBar {
                time: self.display_time(c.time),
                value: c.volume,
                direction: if c.close > c.open {
                    VolumeDirection::Up
                } else if c.close < c.open {
                    VolumeDirection::Down
                } else {
                    VolumeDirection::Flat
                },
            })
            .collect();

        for candle in &mut candles {
            candle.time = self.display_time(candle.time);
        }

        let (ticker_label, interval_label) = if self.obfuscate {
            (MASK.to_string(), MASK.to_string())
        } else {
            (ticker.to_string(), interval.as_str().to_string())
        };

        DisplayFrame {
            ticker_label,
            interval_label,
            candles,
            rsi,
            volume,
            context,
            playing,
        }
    }

    pub fn project_session(&self, session: &ReplaySession, playing: bool) -> DisplayFrame {
        self.project(
            session.ticker().unwrap_or_default(),
            session.interval(),
            session.visible(),
            playing,
            session.trade_context(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candle, monday, series};
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_obfuscation_round_trips_and_keeps_weekday() {
        let t = monday() + Duration::minutes(37);
        let shifted = obfuscate_time(t);

        assert_ne!(shifted, t);
        assert_eq!(reveal_time(shifted), t);
        assert_eq!(shifted.weekday(), t.weekday());
        assert_eq!((shifted.hour(), shifted.minute()), (t.hour(), t.minute()));
    }

    #[test]
    fn test_synthetic_bar_merges_extremes() {
        let real = candle("SBER", Interval::Hour1, monday(), 100.0);
        let mut current = candle("SBER", Interval::Hour1, monday() + Duration::minutes(20), 103.0);
        current.high = 104.5;
        current.low = 98.0;

        let forming = build_synthetic(&real, &current, Interval::Hour1).unwrap();

        assert!(forming.synthetic);
        assert_eq!(forming.time, real.time);
        assert_eq!(forming.open, real.open);
        assert_eq!(forming.high, 104.5);
        assert_eq!(forming.low, 98.0);
        assert_eq!(forming.close, 103.0);
    }

    #[test]
    fn test_no_synthetic_bar_after_full_interval() {
        let real = candle("SBER", Interval::Min5, monday(), 100.0);
        let current = candle("SBER", Interval::Min5, monday() + Duration::minutes(5), 101.0);
        assert!(build_synthetic(&real, &current, Interval::Min5).is_none());
    }

    #[test]
    fn test_paused_frame_has_synthetic_last_bar() {
        let visible = series("SBER", Interval::Min5, monday(), 20);
        let projector = DisplayProjector::new(false);

        let paused = projector.project("SBER", Interval::Min5, &visible, false, None);
        assert_eq!(paused.candles.len(), 20);
        assert!(paused.candles[19].synthetic);
        assert!(paused.candles[..19].iter().all(|c| !c.synthetic));
        assert_eq!(paused.candles[19].close, visible[19].close);

        let playing = projector.project("SBER", Interval::Min5, &visible, true, None);
        assert!(playing.candles.iter().all(|c| !c.synthetic));

        let tiny = projector.project("SBER", Interval::Min5, &visible[..2], false, None);
        assert!(tiny.candles.iter().all(|c| !c.synthetic));
    }

    #[test]
    fn test_frame_labels_and_series_alignment() {
        let visible = series("SBER", Interval::Min5, monday(), 30);
        let frame = DisplayProjector::new(false).project("SBER", Interval::Min5, &visible, true, None);

        assert_eq!(frame.ticker_label, "SBER");
        assert_eq!(frame.interval_label, "5min");
        assert_eq!(frame.rsi.len(), 30);
        assert_eq!(frame.volume.len(), 30);
        assert!(frame.rsi[..RSI_PERIOD].iter().all(|p| p.value == 0.0));
        assert_eq!(frame.rsi[29].time, visible[29].time);
    }

    #[test]
    fn test_obfuscated_frame_masks_labels_and_times_only() {
        let visible = series("SBER", Interval::Hour1, monday(), 5);
        let frame = DisplayProjector::new(true).project("SBER", Interval::Hour1, &visible, true, None);

        assert_eq!(frame.ticker_label, MASK);
        assert_eq!(frame.interval_label, MASK);
        for (shown, real) in frame.candles.iter().zip(&visible) {
            assert_eq!(reveal_time(shown.time), real.time);
            assert_eq!(shown.close, real.close);
            assert_eq!(shown.volume, real.volume);
        }
        assert_eq!(reveal_time(frame.volume[0].time), visible[0].time);
    }

    #[test]
    fn test_volume_direction() {
        let mut up = candle("SBER", Interval::Min5, monday(), 100.0);
        up.open = 99.0;
        let mut down = candle("SBER", Interval::Min5, monday() + Duration::minutes(5), 100.0);
        down.open = 101.0;
        let mut flat = candle("SBER", Interval::Min5, monday() + Duration::minutes(10), 100.0);
        flat.open = 100.0;

        let frame = DisplayProjector::new(false).project(
            "SBER",
            Interval::Min5,
            &[up, down, flat],
            true,
            None,
        );
        let directions: Vec<_> = frame.volume.iter().map(|v| v.direction).collect();
        assert_eq!(
            directions,
            vec![VolumeDirection::Up, VolumeDirection::Down, VolumeDirection::Flat]
        );
    }
}
