//! Replay Controller
//!
//! Actor that owns a [`ReplaySession`] and a [`PlaybackClock`]. Commands arrive
//! over an mpsc channel, store queries run as spawned tasks whose tagged
//! results come back through an internal channel, and the latest
//! [`DisplayFrame`] is published on a watch channel after every step.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use replay_core::{CandleSource, CandleWindow, Interval, ReplayError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::clock::PlaybackClock;
use crate::prefs::ReplayPrefs;
use crate::projector::{DisplayFrame, DisplayProjector};
use crate::session::{Applied, LoadRequest, ReplaySession, SessionEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayCommand {
    /// New random session.
    Reset,
    SelectTicker(String),
    SelectInterval(Interval),
    TogglePlayback,
    /// Manual single step.
    Step,
    JumpTo(DateTime<Utc>),
    /// Earliest time currently on screen; may trigger infinite scroll.
    VisibleFrom(DateTime<Utc>),
    SetSpeed(u64),
    SetObfuscate(bool),
    RefreshTickers,
    Shutdown,
}

type LoadResult = (LoadRequest, Result<CandleWindow, ReplayError>);

/// Cloneable front end for a running controller
#[derive(Clone)]
pub struct ReplayHandle {
    commands: mpsc::Sender<ReplayCommand>,
    frames: watch::Receiver<DisplayFrame>,
    events: broadcast::Sender<SessionEvent>,
}

impl ReplayHandle {
    pub async fn send(&self, command: ReplayCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .context("replay controller has stopped")
    }

    pub fn frames(&self) -> watch::Receiver<DisplayFrame> {
        self.frames.clone()
    }

    pub fn latest_frame(&self) -> DisplayFrame {
        self.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

pub struct ReplayController {
    session: ReplaySession,
    clock: PlaybackClock,
    prefs: ReplayPrefs,
    prefs_path: Option<PathBuf>,
    projector: DisplayProjector,
    source: Arc<dyn CandleSource>,
    rng: StdRng,
    commands: mpsc::Receiver<ReplayCommand>,
    loads_tx: mpsc::UnboundedSender<LoadResult>,
    loads_rx: mpsc::UnboundedReceiver<LoadResult>,
    frames: watch::Sender<DisplayFrame>,
}

impl ReplayController {
    pub fn new(
        source: Arc<dyn CandleSource>,
        prefs: ReplayPrefs,
        prefs_path: Option<PathBuf>,
    ) -> (Self, ReplayHandle) {
        let (commands_tx, commands) = mpsc::channel(64);
        let (loads_tx, loads_rx) = mpsc::unbounded_channel();
        let (frames, frames_rx) = watch::channel(DisplayFrame::default());
        let session = ReplaySession::new();

        let handle = ReplayHandle {
            commands: commands_tx,
            frames: frames_rx,
            events: session.event_sender(),
        };
        let controller = Self {
            session,
            clock: PlaybackClock::new(prefs.ff_speed()),
            prefs,
            prefs_path,
            projector: DisplayProjector::new(prefs.obfuscate),
            source,
            rng: StdRng::from_entropy(),
            commands,
            loads_tx,
            loads_rx,
            frames,
        };
        (controller, handle)
    }

    /// Fixed seed for reproducible ticker picks.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Replay controller started");
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        None | Some(ReplayCommand::Shutdown) => break,
                        Some(command) => {
                            if let Err(e) = self.handle_command(command).await {
                                tracing::warn!("Replay command failed: {:#}", e);
                            }
                        }
                    }
                }
                Some((request, result)) = self.loads_rx.recv() => {
                    self.handle_load(request, result);
                }
                _ = self.clock.wait_tick() => {
                    self.handle_tick();
                }
            }
            self.publish();
        }
        tracing::info!("Replay controller stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: ReplayCommand) -> Result<()> {
        match command {
            ReplayCommand::Reset => {
                self.clock.stop();
                if self.session.tickers().is_empty() {
                    self.refresh_tickers().await?;
                }
                let request = self.session.begin_reset(&mut self.rng)?;
                self.dispatch(request);
            }
            ReplayCommand::SelectTicker(ticker) => {
                self.clock.stop();
                let request = self.session.begin_select_ticker(&ticker)?;
                self.dispatch(request);
            }
            ReplayCommand::SelectInterval(interval) => {
                self.clock.stop();
                let request = self.session.begin_select_interval(interval)?;
                self.dispatch(request);
            }
            ReplayCommand::TogglePlayback => {
                let state = self
                    .clock
                    .toggle(self.session.anchor_index(), self.session.last_index());
                tracing::debug!("Playback {:?}", state);
            }
            ReplayCommand::Step => {
                self.session.advance();
            }
            ReplayCommand::JumpTo(time) => {
                if !self.session.jump_to_time(time) {
                    tracing::debug!("No candle at {} in the loaded window", time);
                }
            }
            ReplayCommand::VisibleFrom(from) => {
                if let Some(request) = self.session.begin_load_more(from) {
                    self.dispatch(request);
                }
            }
            ReplayCommand::SetSpeed(ms) => {
                self.prefs.set_ff_speed_ms(ms);
                self.clock.set_speed(self.prefs.ff_speed());
                self.save_prefs();
            }
            ReplayCommand::SetObfuscate(obfuscate) => {
                self.prefs.obfuscate = obfuscate;
                self.projector.obfuscate = obfuscate;
                self.save_prefs();
            }
            ReplayCommand::RefreshTickers => self.refresh_tickers().await?,
            ReplayCommand::Shutdown => {}
        }
        Ok(())
    }

    async fn refresh_tickers(&mut self) -> Result<()> {
        let tickers = self
            .source
            .list_tickers()
            .await
            .context("Failed to list tickers")?;
        tracing::debug!("{} tickers available", tickers.len());
        self.session.set_tickers(tickers);
        Ok(())
    }

    fn dispatch(&self, request: LoadRequest) {
        let source = Arc::clone(&self.source);
        let results = self.loads_tx.clone();
        tokio::spawn(async move {
            let result = request.run(source.as_ref()).await;
            // controller gone means nobody wants the result
            let _ = results.send((request, result));
        });
    }

    fn handle_load(&mut self, request: LoadRequest, result: Result<CandleWindow, ReplayError>) {
        match self.session.apply(&request, result) {
            Ok(Applied::Stale) => {}
            Ok(applied) => tracing::debug!("{:?} -> {:?}", request.kind, applied),
            Err(e) => tracing::warn!(
                "Load for {} {} failed: {}",
                request.key.ticker,
                request.key.interval,
                e
            ),
        }
    }

    fn handle_tick(&mut self) {
        self.session.advance();
        self.clock
            .after_tick(self.session.anchor_index(), self.session.last_index());
    }

    fn save_prefs(&self) {
        if let Some(path) = &self.prefs_path {
            if let Err(e) = self.prefs.save(path) {
                tracing::warn!("{:#}", e);
            }
        }
    }

    fn publish(&self) {
        let frame = self
            .projector
            .project_session(&self.session, self.clock.is_running());
        self.frames.send_replace(frame);
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
