use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use studioconf::EngineConfig;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::MediaClock;
use crate::asset::{Asset, AssetId};
use crate::error::MediaError;
use crate::session::{SessionState, TrackSlot};

/// Drift beyond this many seconds is corrected.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.5;

struct BoundTrack {
    asset_id: AssetId,
    /// None for assets with nothing to play (image-only visuals, text)
    clock: Option<Box<dyn MediaClock>>,
    failed: bool,
}

impl BoundTrack {
    fn is_synced(&self) -> bool {
        self.clock.is_some() && !self.failed
    }
}

/// A secondary track that was seeked back to the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftCorrection {
    pub slot: TrackSlot,
    pub drift: f64,
    pub target: f64,
}

/// Result of one correction check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub reference: Option<TrackSlot>,
    pub corrections: Vec<DriftCorrection>,
}

/// Keeps per-track clocks aligned to a reference track.
///
/// The vocal track is the reference when it is playable, otherwise the audio
/// track. A track whose media errors is dropped from synchronization; the
/// others carry on without it.
pub struct TrackSynchronizer {
    tracks: BTreeMap<TrackSlot, BoundTrack>,
    threshold: f64,
    playing: bool,
}

impl Default for TrackSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackSynchronizer {
    pub fn new() -> Self {
        Self {
            tracks: BTreeMap::new(),
            threshold: DEFAULT_DRIFT_THRESHOLD,
            playing: false,
        }
    }

    /// Drift threshold from the engine config.
    pub fn from_config(engine: &EngineConfig) -> Self {
        Self::new().with_threshold(engine.drift_threshold_secs)
    }

    pub fn with_threshold(mut self, seconds: f64) -> Self {
        self.threshold = seconds;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Bind a track's media. Image-only and text assets are recorded but get no
    /// clock. Video visuals loop. Joining mid-playback starts at the reference
    /// position.
    pub fn attach(&mut self, slot: TrackSlot, asset: &Asset, mut clock: Box<dyn MediaClock>) {
        let playable = asset.content.video_ref().is_some() || asset.content.audio_ref().is_some();

        if !playable {
            debug!(track.slot = %slot, asset.id = %asset.id, "Track has no playback clock, exempt from sync");
            self.tracks.insert(
                slot,
                BoundTrack {
                    asset_id: asset.id.clone(),
                    clock: None,
                    failed: false,
                },
            );
            return;
        }

        if slot == TrackSlot::Visual && asset.content.video_ref().is_some() {
            clock.set_looping(true);
        }

        let mut failed = false;
        if self.playing {
            let reference = self.reference_position();
            let started = match reference {
                Some(position) => clock.seek_to(position).and_then(|_| clock.play()),
                None => clock.play(),
            };
            if let Err(e) = started {
                warn!(track.slot = %slot, error = %e, "Track failed to start, dropping from sync");
                failed = true;
            }
        }

        self.tracks.insert(
            slot,
            BoundTrack {
                asset_id: asset.id.clone(),
                clock: Some(clock),
                failed,
            },
        );
    }

    /// Record that a slot's media could not be loaded.
    pub fn attach_failed(&mut self, slot: TrackSlot, asset: &Asset, error: &MediaError) {
        warn!(track.slot = %slot, asset.id = %asset.id, error = %error, "Track media failed to load");
        self.tracks.insert(
            slot,
            BoundTrack {
                asset_id: asset.id.clone(),
                clock: None,
                failed: true,
            },
        );
    }

    pub fn detach(&mut self, slot: TrackSlot) {
        if let Some(mut track) = self.tracks.remove(&slot) {
            if let Some(clock) = track.clock.as_mut() {
                let _ = clock.pause();
            }
        }
    }

    /// Match bound tracks to the session's assignments. Slots whose asset
    /// changed are reopened through `open`; cleared slots are detached.
    pub fn bind<F>(&mut self, state: &SessionState, mut open: F)
    where
        F: FnMut(TrackSlot, &Asset) -> Result<Box<dyn MediaClock>, MediaError>,
    {
        for slot in TrackSlot::ALL {
            match state.track(slot) {
                None => self.detach(slot),
                Some(asset) => {
                    let unchanged = self
                        .tracks
                        .get(&slot)
                        .is_some_and(|t| t.asset_id == asset.id);
                    if unchanged {
                        continue;
                    }
                    self.detach(slot);
                    match open(slot, asset) {
                        Ok(clock) => self.attach(slot, asset, clock),
                        Err(e) => self.attach_failed(slot, asset, &e),
                    }
                }
            }
        }
    }

    pub fn is_attached(&self, slot: TrackSlot) -> bool {
        self.tracks.contains_key(&slot)
    }

    /// Attached with a working clock.
    pub fn is_synced(&self, slot: TrackSlot) -> bool {
        self.tracks.get(&slot).is_some_and(BoundTrack::is_synced)
    }

    pub fn is_failed(&self, slot: TrackSlot) -> bool {
        self.tracks.get(&slot).is_some_and(|t| t.failed)
    }

    pub fn reference_slot(&self) -> Option<TrackSlot> {
        [TrackSlot::Vocal, TrackSlot::Audio]
            .into_iter()
            .find(|slot| self.is_synced(*slot))
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.broadcast(true);
        info!(tracks = self.tracks.len(), "Playback started");
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.broadcast(false);
        info!("Playback paused");
    }

    /// Flip play state; returns the new state.
    pub fn toggle(&mut self) -> bool {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
        self.playing
    }

    fn broadcast(&mut self, play: bool) {
        for (slot, track) in self.tracks.iter_mut() {
            if track.failed {
                continue;
            }
            let Some(clock) = track.clock.as_mut() else {
                continue;
            };
            let result = if play { clock.play() } else { clock.pause() };
            if let Err(e) = result {
                warn!(track.slot = %slot, error = %e, "Track failed on play/pause, dropping from sync");
                track.failed = true;
            }
        }
    }

    pub fn position(&self, slot: TrackSlot) -> Option<f64> {
        let track = self.tracks.get(&slot)?;
        if track.failed {
            return None;
        }
        track.clock.as_ref()?.current_position().ok()
    }

    /// Read the reference position, dropping references that error.
    fn reference_position(&mut self) -> Option<f64> {
        self.reference().map(|(_, position)| position)
    }

    fn reference(&mut self) -> Option<(TrackSlot, f64)> {
        loop {
            let slot = self.reference_slot()?;
            let track = self.tracks.get_mut(&slot)?;
            let clock = track.clock.as_ref()?;
            match clock.current_position() {
                Ok(position) => return Some((slot, position)),
                Err(e) => {
                    warn!(track.slot = %slot, error = %e, "Reference track failed, dropping from sync");
                    track.failed = true;
                }
            }
        }
    }

    /// Seek every secondary track that strayed more than the threshold from
    /// the reference. The reference itself is never touched.
    pub fn check_drift(&mut self) -> SyncReport {
        let mut report = SyncReport::default();
        let Some((reference, target)) = self.reference() else {
            return report;
        };
        report.reference = Some(reference);

        for (slot, track) in self.tracks.iter_mut() {
            if *slot == reference || track.failed {
                continue;
            }
            let Some(clock) = track.clock.as_mut() else {
                continue;
            };

            let position = match clock.current_position() {
                Ok(position) => position,
                Err(e) => {
                    warn!(track.slot = %slot, error = %e, "Track failed, dropping from sync");
                    track.failed = true;
                    continue;
                }
            };

            let drift = (position - target).abs();
            if drift <= self.threshold {
                continue;
            }

            match clock.seek_to(target) {
                Ok(()) => {
                    debug!(
                        track.slot = %slot,
                        track.reference = %reference,
                        sync.drift = drift,
                        sync.target = target,
                        "Drift corrected"
                    );
                    report.corrections.push(DriftCorrection {
                        slot: *slot,
                        drift,
                        target,
                    });
                }
                Err(e) => {
                    warn!(track.slot = %slot, error = %e, "Seek failed, dropping from sync");
                    track.failed = true;
                }
            }
        }

        report
    }
}

/// [`spawn_sync_ticker`] at the engine config's tick period.
pub fn spawn_configured_ticker(
    synchronizer: Arc<Mutex<TrackSynchronizer>>,
    engine: &EngineConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    spawn_sync_ticker(synchronizer, engine.sync_tick(), cancel)
}

/// Run `check_drift` every `period` while playing, until cancelled.
pub fn spawn_sync_ticker(
    synchronizer: Arc<Mutex<TrackSynchronizer>>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Sync ticker cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let Ok(mut sync) = synchronizer.lock() else {
                        warn!("Synchronizer lock poisoned, stopping ticker");
                        break;
                    };
                    if sync.is_playing() {
                        sync.check_drift();
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetContent, MediaRef};
    use crate::sync::ManualClock;

    fn audio_asset(id: &str) -> Asset {
        Asset::new(id, "test", AssetContent::audio(MediaRef::url(format!("https://a/{id}.mp3"))))
            .with_id(id)
    }

    fn video_asset(id: &str) -> Asset {
        Asset::new(id, "test", AssetContent::video(MediaRef::url("https://v/loop.mp4"))).with_id(id)
    }

    fn image_asset(id: &str) -> Asset {
        Asset::new(id, "test", AssetContent::image(MediaRef::url("https://i/still.png"))).with_id(id)
    }

    #[test]
    fn test_vocal_is_reference_when_present() {
        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(ManualClock::new()));
        assert_eq!(sync.reference_slot(), Some(TrackSlot::Audio));

        sync.attach(TrackSlot::Vocal, &audio_asset("v"), Box::new(ManualClock::new()));
        assert_eq!(sync.reference_slot(), Some(TrackSlot::Vocal));
    }

    #[test]
    fn test_small_drift_left_alone() {
        let vocal = ManualClock::at(10.0);
        let audio = ManualClock::at(10.4);
        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Vocal, &audio_asset("v"), Box::new(vocal));
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));

        let report = sync.check_drift();
        assert!(report.corrections.is_empty());
        assert!(audio.seeks().is_empty());
    }

    #[test]
    fn test_large_drift_seeks_secondary_only() {
        let vocal = ManualClock::at(10.0);
        let audio = ManualClock::at(11.2);
        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Vocal, &audio_asset("v"), Box::new(vocal.clone()));
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));

        let report = sync.check_drift();
        assert_eq!(report.reference, Some(TrackSlot::Vocal));
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.corrections[0].slot, TrackSlot::Audio);
        assert_eq!(audio.position(), 10.0);
        assert!(vocal.seeks().is_empty());
    }

    #[test]
    fn test_image_visual_exempt() {
        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(ManualClock::at(0.0)));
        let still = ManualClock::at(99.0);
        sync.attach(TrackSlot::Visual, &image_asset("i"), Box::new(still.clone()));

        assert!(sync.is_attached(TrackSlot::Visual));
        assert!(!sync.is_synced(TrackSlot::Visual));
        assert!(sync.check_drift().corrections.is_empty());
        assert!(still.seeks().is_empty());
    }

    #[test]
    fn test_video_visual_loops() {
        let clip = ManualClock::new();
        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Visual, &video_asset("vid"), Box::new(clip.clone()));
        assert!(clip.is_looping());
    }

    #[test]
    fn test_play_pause_broadcast_skips_failed() {
        let audio = ManualClock::new();
        let vocal = ManualClock::new();
        let broken = ManualClock::new();
        broken.fail();

        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));
        sync.attach(TrackSlot::Vocal, &audio_asset("v"), Box::new(vocal.clone()));
        sync.attach(TrackSlot::Visual, &video_asset("x"), Box::new(broken));

        assert!(sync.toggle());
        assert!(audio.is_playing());
        assert!(vocal.is_playing());
        assert!(sync.is_failed(TrackSlot::Visual));

        assert!(!sync.toggle());
        assert!(!audio.is_playing());
        assert!(!vocal.is_playing());
    }

    #[test]
    fn test_failed_reference_falls_back_to_audio() {
        let vocal = ManualClock::at(5.0);
        let audio = ManualClock::at(20.0);
        let visual = ManualClock::at(0.0);
        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Vocal, &audio_asset("v"), Box::new(vocal.clone()));
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio.clone()));
        sync.attach(TrackSlot::Visual, &video_asset("x"), Box::new(visual.clone()));

        vocal.fail();
        let report = sync.check_drift();

        assert_eq!(report.reference, Some(TrackSlot::Audio));
        assert!(sync.is_failed(TrackSlot::Vocal));
        assert_eq!(visual.position(), 20.0);
        assert!(audio.seeks().is_empty());
    }

    #[test]
    fn test_join_mid_playback_starts_at_reference() {
        let audio = ManualClock::at(7.5);
        let mut sync = TrackSynchronizer::new();
        sync.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio));
        sync.play();

        let late = ManualClock::at(0.0);
        sync.attach(TrackSlot::Visual, &video_asset("x"), Box::new(late.clone()));
        assert!(late.is_playing());
        assert_eq!(late.position(), 7.5);
    }

    #[test]
    fn test_bind_follows_session_assignments() {
        let mut state = SessionState::default()
            .with_track(TrackSlot::Audio, Some(audio_asset("a")))
            .with_track(TrackSlot::Vocal, Some(audio_asset("v")));

        let mut sync = TrackSynchronizer::new();
        let mut opened = Vec::new();
        sync.bind(&state, |slot, _| {
            opened.push(slot);
            if slot == TrackSlot::Vocal {
                Err(MediaError::new("404"))
            } else {
                Ok(Box::new(ManualClock::new()))
            }
        });

        assert_eq!(opened, vec![TrackSlot::Audio, TrackSlot::Vocal]);
        assert!(sync.is_failed(TrackSlot::Vocal));
        assert_eq!(sync.reference_slot(), Some(TrackSlot::Audio));

        state = state.with_track(TrackSlot::Vocal, None);
        let mut reopened = 0;
        sync.bind(&state, |_, _| {
            reopened += 1;
            Ok(Box::new(ManualClock::new()))
        });
        assert_eq!(reopened, 0);
        assert!(!sync.is_attached(TrackSlot::Vocal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_corrects_while_playing() {
        let audio = ManualClock::at(0.0);
        let visual = ManualClock::at(3.0);
        let mut inner = TrackSynchronizer::new();
        inner.attach(TrackSlot::Audio, &audio_asset("a"), Box::new(audio));
        inner.attach(TrackSlot::Visual, &video_asset("x"), Box::new(visual.clone()));
        inner.play();

        let sync = Arc::new(Mutex::new(inner));
        let cancel = CancellationToken::new();
        let handle = spawn_sync_ticker(sync.clone(), Duration::from_millis(250), cancel.clone());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(visual.position(), 0.0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
