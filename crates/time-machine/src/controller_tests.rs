use super::*;
use crate::projector::MASK;
use crate::testing::{monday, series, InMemorySource};
use std::time::Duration;
use tokio::time::{timeout, Instant};

fn plain_prefs() -> ReplayPrefs {
    ReplayPrefs {
        ff_speed_ms: 300,
        obfuscate: false,
    }
}

fn start(source: Arc<InMemorySource>, prefs: ReplayPrefs) -> (ReplayHandle, JoinHandle<Result<()>>) {
    let (controller, handle) = ReplayController::new(source, prefs, None);
    let task = controller.with_seed(11).spawn();
    (handle, task)
}

async fn wait_for<F>(frames: &mut watch::Receiver<DisplayFrame>, pred: F) -> DisplayFrame
where
    F: Fn(&DisplayFrame) -> bool,
{
    loop {
        {
            let frame = frames.borrow_and_update();
            if pred(&frame) {
                return frame.clone();
            }
        }
        timeout(Duration::from_secs(60), frames.changed())
            .await
            .expect("timed out waiting for frame")
            .expect("controller dropped");
    }
}

#[tokio::test(start_paused = true)]
async fn test_reset_publishes_loaded_window() {
    let source = Arc::new(
        InMemorySource::new().with_series(series("SBER", Interval::Min5, monday(), 100)),
    );
    let (handle, _task) = start(source, plain_prefs());
    let mut frames = handle.frames();

    handle.send(ReplayCommand::Reset).await.unwrap();
    let frame = wait_for(&mut frames, |f| !f.candles.is_empty()).await;

    assert_eq!(frame.ticker_label, "SBER");
    assert_eq!(frame.interval_label, "5min");
    assert_eq!(frame.candles.len(), 100);
    assert!(!frame.playing);
    assert!(frame.candles[99].synthetic);
    let context = frame.context.unwrap();
    assert_eq!(context.commission_percent, 0.04);
}

#[tokio::test(start_paused = true)]
async fn test_obfuscation_on_by_default() {
    let source = Arc::new(
        InMemorySource::new().with_series(series("SBER", Interval::Min5, monday(), 10)),
    );
    let (handle, _task) = start(source, ReplayPrefs::default());
    let mut frames = handle.frames();

    handle.send(ReplayCommand::Reset).await.unwrap();
    let frame = wait_for(&mut frames, |f| !f.candles.is_empty()).await;

    assert_eq!(frame.ticker_label, MASK);
    assert_eq!(frame.interval_label, MASK);
    assert_ne!(frame.candles[0].time, monday());
}

#[tokio::test(start_paused = true)]
async fn test_playback_runs_to_end_and_stops() {
    let candles = series("SBER", Interval::Min5, monday(), 100);
    let source = Arc::new(InMemorySource::new().with_series(candles.clone()));
    let (handle, _task) = start(source, plain_prefs());
    let mut frames = handle.frames();

    handle.send(ReplayCommand::Reset).await.unwrap();
    wait_for(&mut frames, |f| f.candles.len() == 100).await;
    handle.send(ReplayCommand::JumpTo(candles[95].time)).await.unwrap();
    wait_for(&mut frames, |f| f.candles.len() == 96).await;

    let started = Instant::now();
    handle.send(ReplayCommand::TogglePlayback).await.unwrap();
    let running = wait_for(&mut frames, |f| f.playing).await;
    assert!(running.candles.iter().all(|c| !c.synthetic));

    let done = wait_for(&mut frames, |f| f.candles.len() == 100 && !f.playing).await;
    assert!(started.elapsed() >= Duration::from_millis(4 * 300));
    assert!(done.candles[99].synthetic);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_at_last_candle_stays_stopped() {
    let source = Arc::new(
        InMemorySource::new().with_series(series("SBER", Interval::Min5, monday(), 10)),
    );
    let (handle, _task) = start(source, plain_prefs());
    let mut frames = handle.frames();

    handle.send(ReplayCommand::Reset).await.unwrap();
    wait_for(&mut frames, |f| f.candles.len() == 10).await;

    handle.send(ReplayCommand::TogglePlayback).await.unwrap();
    frames.changed().await.unwrap();
    assert!(!frames.borrow_and_update().playing);
}

#[tokio::test(start_paused = true)]
async fn test_interval_switch_realigns_window() {
    let source = Arc::new(
        InMemorySource::new()
            .with_series(series("SBER", Interval::Min5, monday(), 100))
            .with_series(series("SBER", Interval::Hour1, monday(), 48)),
    );
    let (handle, _task) = start(source, plain_prefs());
    let mut frames = handle.frames();

    handle.send(ReplayCommand::Reset).await.unwrap();
    wait_for(&mut frames, |f| f.candles.len() == 100).await;

    handle
        .send(ReplayCommand::SelectInterval(Interval::Hour1))
        .await
        .unwrap();
    let frame = wait_for(&mut frames, |f| f.interval_label == "hour" && !f.candles.is_empty()).await;

    // last 5min bar is 15:15, so the hourly anchor is the 15:00 bar
    let context = frame.context.unwrap();
    assert_eq!(context.current_time, monday() + chrono::Duration::hours(8));
    assert_eq!(frame.candles.len(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_scrolling_back_prepends_history() {
    let candles = series("SBER", Interval::Min5, monday(), 3600);
    let source = Arc::new(InMemorySource::new().with_series(candles.clone()));
    let (handle, _task) = start(source, plain_prefs());
    let mut frames = handle.frames();

    handle.send(ReplayCommand::Reset).await.unwrap();
    wait_for(&mut frames, |f| f.candles.len() == 3000).await;

    handle
        .send(ReplayCommand::VisibleFrom(candles[100].time))
        .await
        .unwrap();
    let frame = wait_for(&mut frames, |f| f.candles.len() == 3100).await;

    assert_eq!(frame.candles[0].time, candles[0].time);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_is_reported() {
    let source = Arc::new(
        InMemorySource::new().with_series(series("SBER", Interval::Min5, monday(), 10)),
    );
    source.set_failing(true);
    let (handle, _task) = start(source, plain_prefs());
    let mut events = handle.subscribe();

    handle.send(ReplayCommand::Reset).await.unwrap();
    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(event, SessionEvent::LoadFailed { .. }));
    assert!(handle.latest_frame().candles.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_speed_and_obfuscation_are_persisted() {
    let path = std::env::temp_dir()
        .join(format!("candle-replay-controller-{}", std::process::id()))
        .join("prefs.json");
    let source = Arc::new(InMemorySource::new());
    let (controller, handle) =
        ReplayController::new(source, plain_prefs(), Some(path.clone()));
    let _task = controller.spawn();
    let mut frames = handle.frames();

    handle.send(ReplayCommand::SetSpeed(120)).await.unwrap();
    handle.send(ReplayCommand::SetObfuscate(true)).await.unwrap();
    wait_for(&mut frames, |f| f.ticker_label == MASK).await;

    let saved = ReplayPrefs::load(&path);
    assert_eq!(saved.ff_speed_ms, 120);
    assert!(saved.obfuscate);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_loop() {
    let (handle, task) = start(Arc::new(InMemorySource::new()), plain_prefs());

    handle.send(ReplayCommand::Shutdown).await.unwrap();

    assert!(task.await.unwrap().is_ok());
    assert!(handle.send(ReplayCommand::Step).await.is_err());
}
