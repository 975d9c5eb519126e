//! Session state and its undo/redo history.
//!
//! All mutation goes through [`SessionStore::apply`], [`SessionStore::undo`]
//! and [`SessionStore::redo`]. Callers never write fields of the current
//! state directly; they hand the store a replacement or an updater.

mod history;
mod state;

pub use history::{HistoryStack, SessionStore, SessionUpdate};
pub use state::{RenderRecord, SessionState, SyncParameters, TrackSlot, MAX_RENDERS};
