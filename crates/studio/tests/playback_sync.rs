//! Playback synchronization and preview navigation.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{audio_asset, vocal_asset};
use studio::sync::{spawn_configured_ticker, spawn_sync_ticker, ManualClock, MediaClock, SimulatedClock, TrackSynchronizer};
use studio::{Asset, AssetContent, MediaRef, PreviewCursor, PreviewNavigator, TrackSlot};
use tokio_util::sync::CancellationToken;

fn video_asset(id: &str) -> Asset {
    Asset::new(id, "Director", AssetContent::video(MediaRef::url("https://cdn.test/loop.mp4")))
        .with_id(id)
}

#[test]
fn test_drift_bound_after_check() {
    for offset in [0.0, 0.3, 0.5, 0.51, 1.0, 4.0, -2.5] {
        let vocal = ManualClock::at(12.0);
        let audio = ManualClock::at(12.0 + offset);
        let visual = ManualClock::at(12.0 - offset);

        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Vocal, &vocal_asset("v"), Box::new(vocal.clone()));
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));
        sync.attach(TrackSlot::Visual, &video_asset("x"), Box::new(visual.clone()));

        sync.check_drift();

        for secondary in [&audio, &visual] {
            let drift = (secondary.position() - vocal.position()).abs();
            assert!(drift <= 0.5, "offset={offset} drift={drift}");
        }
        assert!(vocal.seeks().is_empty());
    }
}

#[test]
fn test_failed_track_does_not_stop_others() {
    let audio = ManualClock::at(3.0);
    let vocal = ManualClock::at(0.0);
    let visual = ManualClock::at(9.0);

    let mut sync = TrackSynchronizer::new();
    sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));
    sync.attach(TrackSlot::Vocal, &vocal_asset("v"), Box::new(vocal.clone()));
    sync.attach(TrackSlot::Visual, &video_asset("x"), Box::new(visual.clone()));
    sync.play();

    audio.fail();
    let report = sync.check_drift();

    assert_eq!(report.reference, Some(TrackSlot::Vocal));
    assert!(sync.is_failed(TrackSlot::Audio));
    assert_eq!(visual.position(), 0.0);

    sync.pause();
    assert!(!vocal.is_playing());
    assert!(!visual.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_ticker_keeps_fast_track_in_bounds() {
    let mut sync = TrackSynchronizer::new();
    sync.attach(TrackSlot::Vocal, &vocal_asset("v"), Box::new(SimulatedClock::new()));
    sync.attach(
        TrackSlot::Audio,
        &audio_asset("a"),
        Box::new(SimulatedClock::new().with_rate(1.2)),
    );
    sync.play();

    let sync = Arc::new(Mutex::new(sync));
    let cancel = CancellationToken::new();
    let ticker = spawn_sync_ticker(sync.clone(), Duration::from_millis(250), cancel.clone());

    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let guard = sync.lock().unwrap();
        let reference = guard.position(TrackSlot::Vocal).unwrap();
        let secondary = guard.position(TrackSlot::Audio).unwrap();
        // Drift grows 0.05s per tick; corrections start once it passes 0.5s
        assert!((secondary - reference).abs() <= 0.55 + 1e-9);
    }

    cancel.cancel();
    ticker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_ticker_idle_while_paused() {
    let drifting = ManualClock::at(30.0);
    let mut sync = TrackSynchronizer::new();
    sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(ManualClock::at(0.0)));
    sync.attach(TrackSlot::Visual, &video_asset("x"), Box::new(drifting.clone()));

    let sync = Arc::new(Mutex::new(sync));
    let cancel = CancellationToken::new();
    let ticker = spawn_sync_ticker(sync, Duration::from_millis(100), cancel.clone());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(drifting.seeks().is_empty());

    cancel.cancel();
    ticker.await.unwrap();
}

#[test]
fn test_threshold_from_engine_config() {
    let engine = studioconf::EngineConfig {
        drift_threshold_secs: 2.0,
        ..Default::default()
    };
    let vocal = ManualClock::at(10.0);
    let audio = ManualClock::at(11.5);

    let mut sync = TrackSynchronizer::from_config(&engine);
    sync.attach(TrackSlot::Vocal, &vocal_asset("v"), Box::new(vocal.clone()));
    sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));

    assert!(sync.check_drift().corrections.is_empty());
    assert!(audio.seeks().is_empty());

    audio.set_position(12.5);
    assert_eq!(sync.check_drift().corrections.len(), 1);
    assert_eq!(audio.position(), 10.0);
}

#[tokio::test(start_paused = true)]
async fn test_configured_ticker_period() {
    let engine = studioconf::EngineConfig {
        sync_tick_ms: 1_000,
        ..Default::default()
    };
    let vocal = ManualClock::at(0.0);
    let audio = ManualClock::at(5.0);

    let mut sync = TrackSynchronizer::from_config(&engine);
    sync.attach(TrackSlot::Vocal, &vocal_asset("v"), Box::new(vocal.clone()));
    sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));
    sync.play();

    let sync = Arc::new(Mutex::new(sync));
    let cancel = CancellationToken::new();
    let ticker = spawn_configured_ticker(sync, &engine, cancel.clone());

    // First tick fires immediately, the next one a full period later
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(audio.seeks().len(), 1);

    audio.set_position(5.0);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(audio.seeks().len(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(audio.seeks().len(), 2);

    cancel.cancel();
    ticker.await.unwrap();
}

#[test]
fn test_simulated_clock_is_a_media_clock() {
    let mut clock: Box<dyn MediaClock> = Box::new(SimulatedClock::new());
    clock.seek_to(4.0).unwrap();
    assert_eq!(clock.current_position().unwrap(), 4.0);
}

fn assets(n: usize) -> Vec<Asset> {
    (0..n).map(|i| audio_asset(&format!("a{i}"))).collect()
}

#[test]
fn test_preview_wraps_both_ways() {
    let mut cursor = PreviewCursor::new(assets(4), 3);
    cursor.next();
    assert_eq!(cursor.current_index(), 0);
    cursor.previous();
    assert_eq!(cursor.current_index(), 3);
}

#[test]
fn test_preview_full_cycle() {
    for n in 1..=6 {
        for start in 0..n {
            let mut nav = PreviewNavigator::new();
            nav.open(assets(n), start);
            for _ in 0..n {
                nav.next();
            }
            assert_eq!(nav.current_index(), Some(start));
            for _ in 0..n {
                nav.previous();
            }
            assert_eq!(nav.current_index(), Some(start));
        }
    }
}
