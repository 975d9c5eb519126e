//! Studio session engine.
//!
//! Mixes independently generated audio, vocal and visual assets into one
//! session with undo/redo, keeps their playback clocks aligned, and runs a
//! capped number of render passes against remote generation services with
//! text fallbacks.
//!
//! - [`session`] - session state and undo/redo history
//! - [`sync`] - track clocks and drift correction
//! - [`quota`] - per-session render cap
//! - [`orchestrator`] - render passes and fallback policies
//! - [`preview`] - circular asset browsing
//! - [`persistence`] - project stores, timed saves, debounced sync
//! - [`studio`] - the facade tying these together

pub mod asset;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod persistence;
pub mod preview;
pub mod project;
pub mod quota;
pub mod session;
pub mod studio;
pub mod sync;
pub mod telemetry;

pub use asset::{Asset, AssetContent, AssetId, AssetKind, MediaRef};
pub use error::{BackendError, MediaError, RenderError};
pub use notify::{ChannelSink, Notice, NoticeLevel, NotificationSink, StudioEvent, TracingSink};
pub use orchestrator::{GenerationBackend, GenerationOrchestrator, HttpBackend, RenderOutcome};
pub use persistence::{
    save_with_timeout, DebouncedSync, FileProjectStore, InMemoryProjectStore, ProjectStore,
    SaveOutcome,
};
pub use preview::{PreviewCursor, PreviewNavigator};
pub use project::Project;
pub use session::{SessionState, SessionStore, SyncParameters, TrackSlot, MAX_RENDERS};
pub use studio::Studio;
pub use sync::{MediaClock, TrackSynchronizer};
