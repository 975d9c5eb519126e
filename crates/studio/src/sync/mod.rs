//! Multi-track playback synchronization.

mod clock;
mod synchronizer;

pub use clock::{ManualClock, MediaClock, SimulatedClock};
pub use synchronizer::{
    spawn_configured_ticker, spawn_sync_ticker, DriftCorrection, SyncReport, TrackSynchronizer, DEFAULT_DRIFT_THRESHOLD,
};
