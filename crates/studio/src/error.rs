//! Error types shared across the session engine.
//!
//! Render preconditions and remote failures are typed so callers can tell a
//! rejected request (nothing happened) from a failed one (safe to retry).

use thiserror::Error;

/// Why a render pass produced no master asset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The per-session render cap has been reached. No remote call was made.
    #[error("render quota exceeded ({render_count}/{max_renders} renders used)")]
    QuotaExceeded { render_count: u32, max_renders: u32 },

    /// No track slot holds an asset. No remote call was made.
    #[error("no tracks selected: assign at least one track before rendering")]
    NoTracksSelected,

    /// The orchestration call failed and the text fallback failed too.
    #[error("orchestration failed: {reason}")]
    OrchestrationFailed { reason: String },
}

/// Failure talking to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode backend response: {0}")]
    Decode(String),

    /// The backend answered but reported an error payload.
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// A track's media element could not load, play, or seek.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("media unavailable: {0}")]
pub struct MediaError(pub String);

impl MediaError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
