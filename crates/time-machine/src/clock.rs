//! Fast-forward playback clock.
//!
//! At most one tick is pending at a time. The next tick is scheduled only after
//! the previous one has been handled, so ticks never overlap.

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Running,
}

pub struct PlaybackClock {
    state: PlaybackState,
    speed: Duration,
    pending: Option<Pin<Box<Sleep>>>,
}

impl PlaybackClock {
    pub fn new(speed: Duration) -> Self {
        Self {
            state: PlaybackState::Stopped,
            speed,
            pending: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn speed(&self) -> Duration {
        self.speed
    }

    pub fn has_pending_tick(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes effect from the next scheduled tick; a pending tick keeps its deadline.
    pub fn set_speed(&mut self, speed: Duration) {
        self.speed = speed;
    }

    fn schedule(&mut self) {
        self.pending = Some(Box::pin(sleep(self.speed)));
    }

    /// Start playing from `anchor`. Stays stopped when `anchor` is already the last index.
    pub fn start(&mut self, anchor: usize, last: usize) -> PlaybackState {
        if anchor >= last {
            self.stop();
        } else {
            self.state = PlaybackState::Running;
            if self.pending.is_none() {
                self.schedule();
            }
        }
        self.state
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.pending = None;
    }

    pub fn toggle(&mut self, anchor: usize, last: usize) -> PlaybackState {
        match self.state {
            PlaybackState::Running => {
                self.stop();
                self.state
            }
            PlaybackState::Stopped => self.start(anchor, last),
        }
    }

    /// Resolves when the pending tick is due; never resolves while nothing is scheduled.
    ///
    /// Cancel safe: dropping the future keeps the pending tick and its deadline.
    pub async fn wait_tick(&mut self) {
        match self.pending.as_mut() {
            Some(tick) => {
                tick.as_mut().await;
                self.pending = None;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Call once the session has advanced for a tick: schedules the next one, or stops at the end.
    pub fn after_tick(&mut self, anchor: usize, last: usize) -> PlaybackState {
        if self.is_running() {
            if anchor >= last {
                self.stop();
            } else {
                self.schedule();
            }
        }
        self.state
    }
}
