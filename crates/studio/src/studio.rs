//! One project's live mixing session.
//!
//! [`Studio`] is the single owner of the session store, so every edit and
//! render is totally ordered through `&mut self`. Each change mirrors the
//! current session into the project and, when a [`DebouncedSync`] is
//! attached, schedules a background save.
//!
//! Renders are admitted against a [`RenderBudget`] held beside the undo
//! history, so undoing a render never frees a pass.

use std::sync::Arc;

use chrono::Utc;
use studioconf::EngineConfig;
use tracing::info;

use crate::asset::{Asset, AssetId};
use crate::error::RenderError;
use crate::notify::{NotificationSink, StudioEvent};
use crate::orchestrator::{GenerationBackend, GenerationOrchestrator, RenderOutcome};
use crate::persistence::{DebouncedSync, SaveOutcome};
use crate::preview::PreviewNavigator;
use crate::project::Project;
use crate::quota::RenderBudget;
use crate::session::{SessionState, SessionStore, SessionUpdate, SyncParameters, TrackSlot};

pub struct Studio {
    session: SessionStore,
    budget: RenderBudget,
    project: Project,
    orchestrator: GenerationOrchestrator,
    notifier: Arc<dyn NotificationSink>,
    preview: PreviewNavigator,
    sync: Option<DebouncedSync>,
}

impl Studio {
    /// Resume `project`'s saved session.
    pub fn new(
        project: Project,
        backend: Arc<dyn GenerationBackend>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            session: SessionStore::new(project.session.clone()),
            budget: RenderBudget::resume(&project.session, project.render_passes),
            project,
            orchestrator: GenerationOrchestrator::new(backend),
            notifier,
            preview: PreviewNavigator::new(),
            sync: None,
        }
    }

    /// Builder: bound the undo history. Resets history to the current state.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.session = SessionStore::with_limit(self.session.current().clone(), limit);
        self
    }

    /// Builder: apply the engine config's history limit.
    pub fn configure(self, engine: &EngineConfig) -> Self {
        self.with_history_limit(engine.history_limit())
    }

    /// Builder: schedule a background save after every change
    pub fn with_sync(mut self, sync: DebouncedSync) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn session(&self) -> &SessionState {
        self.session.current()
    }

    pub fn store(&self) -> &SessionStore {
        &self.session
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn preview(&self) -> &PreviewNavigator {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut PreviewNavigator {
        &mut self.preview
    }

    pub fn remaining_renders(&self) -> u32 {
        self.budget.remaining()
    }

    /// Passes used so far, including undone ones.
    pub fn renders_used(&self) -> u32 {
        self.budget.consumed()
    }

    pub fn assign_track(&mut self, slot: TrackSlot, asset: Asset) {
        info!(track.slot = %slot, asset.id = %asset.id, "Track assigned");
        self.edit(move |s: &SessionState| s.clone().with_track(slot, Some(asset)));
    }

    pub fn clear_track(&mut self, slot: TrackSlot) {
        self.edit(move |s: &SessionState| s.clone().with_track(slot, None));
    }

    pub fn set_volume(&mut self, slot: TrackSlot, volume: f32) {
        self.edit(move |s: &SessionState| s.clone().with_volume(slot, volume));
    }

    pub fn set_generate_real_assets(&mut self, enabled: bool) {
        self.edit(move |s: &SessionState| s.clone().with_generate_real_assets(enabled));
    }

    pub fn update_sync(&mut self, change: impl FnOnce(&mut SyncParameters)) {
        self.edit(move |s: &SessionState| {
            let mut sync = s.sync.clone();
            change(&mut sync);
            s.clone().with_sync(sync)
        });
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.session.undo();
        if moved {
            self.changed();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.session.redo();
        if moved {
            self.changed();
        }
        moved
    }

    /// Add an uploaded or separately generated asset to the project.
    pub fn add_asset(&mut self, asset: Asset) {
        self.project.add_asset(asset);
        self.changed();
    }

    pub fn remove_asset(&mut self, id: &AssetId) -> Option<Asset> {
        let removed = self.project.remove_asset(id);
        if removed.is_some() {
            self.changed();
        }
        removed
    }

    /// Browse the project's assets, or only the playable ones.
    pub fn open_preview(&mut self, playable_only: bool, start_index: usize) -> Option<&Asset> {
        let assets = if playable_only {
            self.project.playable_assets()
        } else {
            self.project.assets.clone()
        };
        self.preview.open(assets, start_index)
    }

    /// Run one render pass and commit it.
    ///
    /// On success the pass is spent from the budget, the render is recorded
    /// through the session store (so the snapshot change is undoable), the
    /// master is appended to the project, and any open preview is closed. On
    /// failure nothing changes.
    #[tracing::instrument(name = "studio.session_render", skip(self), fields(project.id = %self.project.id))]
    pub async fn render(&mut self) -> Result<Asset, RenderError> {
        if let Err(e) = self.budget.check() {
            self.notify_render_error(&e);
            return Err(e);
        }

        let state = self.session.current().clone();
        let pass = self.budget.next_pass();
        let outcome = match self.orchestrator.compose_pass(&state, pass).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notify_render_error(&e);
                return Err(e);
            }
        };

        let next = match self.budget.record(self.session.current(), Utc::now()) {
            Ok(next) => next,
            Err(e) => {
                self.notify_render_error(&e);
                return Err(e);
            }
        };
        self.session.apply(next);

        let RenderOutcome {
            master,
            render_pass,
            fallback_used,
        } = outcome;

        self.project.add_asset(master.clone());
        self.preview.close();
        self.changed();

        if fallback_used {
            if let Some(note) = master.notes.first() {
                self.notify(StudioEvent::FallbackUsed {
                    kind: "mix".to_string(),
                    note: note.clone(),
                });
            }
        }

        if master.notes.is_empty() {
            self.notify(StudioEvent::RenderSucceeded {
                asset_id: master.id.clone(),
                render_pass,
                remaining: self.remaining_renders(),
            });
        } else {
            self.notify(StudioEvent::RenderDegraded {
                asset_id: master.id.clone(),
                render_pass,
                notes: master.notes.clone(),
            });
        }

        Ok(master)
    }

    /// Save any change waiting on the background sync now. `None` when no sync
    /// is attached or nothing was pending.
    pub async fn flush_sync(&self) -> Option<SaveOutcome> {
        self.sync.as_ref()?.flush().await
    }

    /// Stop background sync, saving anything pending.
    pub async fn shutdown(self) {
        if let Some(sync) = self.sync {
            sync.shutdown().await;
        }
    }

    fn edit(&mut self, update: impl SessionUpdate) {
        self.session.apply(update);
        self.changed();
    }

    fn changed(&mut self) {
        self.project.session = self.session.current().clone();
        self.project.render_passes = self.budget.consumed();
        self.project.touch();
        if let Some(sync) = &self.sync {
            sync.schedule(self.project.clone());
        }
    }

    fn notify(&self, event: StudioEvent) {
        self.notifier.notify(event.into());
    }

    fn notify_render_error(&self, error: &RenderError) {
        let event = match error {
            RenderError::QuotaExceeded {
                render_count,
                max_renders,
            } => StudioEvent::QuotaExceeded {
                render_count: *render_count,
                max_renders: *max_renders,
            },
            RenderError::NoTracksSelected => StudioEvent::NoTracksSelected,
            RenderError::OrchestrationFailed { reason } => StudioEvent::RenderFailed {
                reason: reason.clone(),
            },
        };
        self.notify(event);
    }
}
