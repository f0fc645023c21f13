//! Time Machine
//!
//! Randomized historical replay. A session picks a window of stored candles,
//! keeps it aligned across timeframes, pages older history in on demand and
//! steps an anchor forward with a fast-forward clock. The controller wires the
//! session to a candle source and publishes display frames for the chart.

pub mod calendar;
pub mod clock;
pub mod context;
pub mod controller;
pub mod prefs;
pub mod projector;
pub mod session;

#[cfg(test)]
mod testing;

pub use calendar::{skip_weekend, weekend_window};
pub use clock::{PlaybackClock, PlaybackState};
pub use context::{commission_percent, TradeContext};
pub use controller::{ReplayCommand, ReplayController, ReplayHandle};
pub use prefs::ReplayPrefs;
pub use projector::{
    build_synthetic, obfuscate_time, reveal_time, DisplayCandle, DisplayFrame, DisplayProjector,
    RsiPoint, VolumeBar, VolumeDirection,
};
pub use session::{Applied, LoadKind, LoadRequest, ReplaySession, SelectionKey, SessionEvent};
