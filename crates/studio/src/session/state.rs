use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::Asset;

/// Renders allowed per session.
pub const MAX_RENDERS: u32 = 3;

fn default_max_renders() -> u32 {
    MAX_RENDERS
}

fn default_volume() -> f32 {
    1.0
}

/// One of the three mixing positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSlot {
    Audio,
    Vocal,
    Visual,
}

impl TrackSlot {
    pub const ALL: [TrackSlot; 3] = [TrackSlot::Audio, TrackSlot::Vocal, TrackSlot::Visual];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSlot::Audio => "audio",
            TrackSlot::Vocal => "vocal",
            TrackSlot::Visual => "visual",
        }
    }
}

impl std::fmt::Display for TrackSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tempo and output-format parameters shared by every track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncParameters {
    pub bpm: u32,
    pub time_signature: String,
    pub key: String,
    pub frame_rate: u32,
    pub aspect_ratio: String,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub sync_locked: bool,
}

impl Default for SyncParameters {
    fn default() -> Self {
        Self {
            bpm: 120,
            time_signature: "4/4".to_string(),
            key: "C major".to_string(),
            frame_rate: 30,
            aspect_ratio: "16:9".to_string(),
            sample_rate: 44_100,
            bit_depth: 24,
            sync_locked: true,
        }
    }
}

/// One entry of the render log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRecord {
    pub pass: u32,
    pub timestamp: DateTime<Utc>,
}

/// Working state of a mixing session.
///
/// Values are snapshots: every edit produces a new `SessionState` that the
/// [`SessionStore`](super::SessionStore) records in its history. The `with_*`
/// methods consume and return so edits compose inside an update closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub audio: Option<Asset>,
    #[serde(default)]
    pub vocal: Option<Asset>,
    #[serde(default)]
    pub visual: Option<Asset>,

    #[serde(default = "default_volume")]
    pub audio_volume: f32,
    #[serde(default = "default_volume")]
    pub vocal_volume: f32,

    #[serde(default)]
    pub sync: SyncParameters,

    #[serde(default)]
    pub generate_real_assets: bool,

    #[serde(default)]
    pub render_count: u32,
    /// Always [`MAX_RENDERS`]; a saved value is ignored on load.
    #[serde(skip_deserializing, default = "default_max_renders")]
    pub max_renders: u32,
    #[serde(default)]
    pub last_render_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub render_history: Vec<RenderRecord>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            audio: None,
            vocal: None,
            visual: None,
            audio_volume: default_volume(),
            vocal_volume: default_volume(),
            sync: SyncParameters::default(),
            generate_real_assets: false,
            render_count: 0,
            max_renders: MAX_RENDERS,
            last_render_time: None,
            render_history: Vec::new(),
        }
    }
}

impl SessionState {
    pub fn track(&self, slot: TrackSlot) -> Option<&Asset> {
        match slot {
            TrackSlot::Audio => self.audio.as_ref(),
            TrackSlot::Vocal => self.vocal.as_ref(),
            TrackSlot::Visual => self.visual.as_ref(),
        }
    }

    /// Assign (or with `None`, clear) a track slot.
    pub fn with_track(mut self, slot: TrackSlot, asset: Option<Asset>) -> Self {
        match slot {
            TrackSlot::Audio => self.audio = asset,
            TrackSlot::Vocal => self.vocal = asset,
            TrackSlot::Visual => self.visual = asset,
        }
        self
    }

    /// Playback gain for a slot. Visual tracks have none.
    pub fn volume(&self, slot: TrackSlot) -> Option<f32> {
        match slot {
            TrackSlot::Audio => Some(self.audio_volume),
            TrackSlot::Vocal => Some(self.vocal_volume),
            TrackSlot::Visual => None,
        }
    }

    /// Set a slot's gain, clamped to [0.0, 1.0]. Ignored for the visual slot.
    pub fn with_volume(mut self, slot: TrackSlot, volume: f32) -> Self {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        match slot {
            TrackSlot::Audio => self.audio_volume = volume,
            TrackSlot::Vocal => self.vocal_volume = volume,
            TrackSlot::Visual => {}
        }
        self
    }

    pub fn with_sync(mut self, sync: SyncParameters) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_generate_real_assets(mut self, enabled: bool) -> Self {
        self.generate_real_assets = enabled;
        self
    }

    /// Assigned tracks in slot order (audio, vocal, visual).
    pub fn assigned_tracks(&self) -> Vec<(TrackSlot, &Asset)> {
        TrackSlot::ALL
            .iter()
            .filter_map(|slot| self.track(*slot).map(|asset| (*slot, asset)))
            .collect()
    }

    pub fn has_tracks(&self) -> bool {
        TrackSlot::ALL.iter().any(|slot| self.track(*slot).is_some())
    }
}
