//! Semantic user-facing events.
//!
//! The engine only says what happened; presentation (toasts, banners, logs)
//! belongs to whatever [`NotificationSink`] is plugged in. Sending never fails
//! and never blocks.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::asset::AssetId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StudioEvent {
    RenderSucceeded { asset_id: AssetId, render_pass: u32, remaining: u32 },
    RenderDegraded { asset_id: AssetId, render_pass: u32, notes: Vec<String> },
    QuotaExceeded { render_count: u32, max_renders: u32 },
    NoTracksSelected,
    RenderFailed { reason: String },
    SaveConfirmed { project_id: String },
    SaveTimedOut { project_id: String },
    SaveFailed { project_id: String, reason: String },
    FallbackUsed { kind: String, note: String },
}

impl StudioEvent {
    pub fn level(&self) -> NoticeLevel {
        match self {
            StudioEvent::RenderSucceeded { .. } | StudioEvent::SaveConfirmed { .. } => {
                NoticeLevel::Success
            }
            StudioEvent::FallbackUsed { .. } => NoticeLevel::Info,
            StudioEvent::RenderDegraded { .. }
            | StudioEvent::QuotaExceeded { .. }
            | StudioEvent::NoTracksSelected
            | StudioEvent::SaveTimedOut { .. } => NoticeLevel::Warning,
            StudioEvent::RenderFailed { .. } | StudioEvent::SaveFailed { .. } => NoticeLevel::Error,
        }
    }

    /// Short human-readable message.
    pub fn message(&self) -> String {
        match self {
            StudioEvent::RenderSucceeded { render_pass, remaining, .. } => {
                format!("Render pass {} complete ({} remaining)", render_pass, remaining)
            }
            StudioEvent::RenderDegraded { render_pass, notes, .. } => {
                format!("Render pass {} complete with notes: {}", render_pass, notes.join("; "))
            }
            StudioEvent::QuotaExceeded { render_count, max_renders } => {
                format!("Render limit reached ({}/{})", render_count, max_renders)
            }
            StudioEvent::NoTracksSelected => "Assign at least one track before rendering".to_string(),
            StudioEvent::RenderFailed { reason } => format!("Render failed: {}", reason),
            StudioEvent::SaveConfirmed { .. } => "Project saved".to_string(),
            StudioEvent::SaveTimedOut { .. } => {
                "Save is taking longer than expected; your work is safe locally".to_string()
            }
            StudioEvent::SaveFailed { reason, .. } => {
                format!("Save failed ({}); your work is safe locally", reason)
            }
            StudioEvent::FallbackUsed { note, .. } => note.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub event: StudioEvent,
}

impl From<StudioEvent> for Notice {
    fn from(event: StudioEvent) -> Self {
        Self {
            level: event.level(),
            event,
        }
    }
}

/// Fire-and-forget notification channel.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notice: Notice) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(notice);
    }
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notice: Notice) {
        let message = notice.event.message();
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => tracing::info!(notice.level = ?notice.level, "{}", message),
            NoticeLevel::Warning => tracing::warn!("{}", message),
            NoticeLevel::Error => tracing::error!("{}", message),
        }
    }
}
