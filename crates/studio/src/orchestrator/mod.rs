//! Render passes: turn the session's track assignments into one master asset.
//!
//! A pass runs in three phases:
//!
//! 1. **Preconditions** - quota and track selection are checked before any
//!    remote call.
//! 2. **Primary** - the orchestration service is called with every track; if it
//!    fails, the composite fallback policy asks for written mix notes instead.
//! 3. **Enrichment** (only with `generate_real_assets`) - tracks without
//!    playable media get their media generated, all kinds concurrently. A
//!    failure here leaves the field absent and adds a note; it never fails
//!    the pass.
//!
//! The orchestrator does not touch session state. The caller commits the
//! outcome (see [`crate::studio::Studio::render`]).

mod backend;
mod fallback;

pub use backend::{
    extract_media, GenerationBackend, HttpBackend, MasterDescriptor, MediaRequest,
    OrchestrationRequest, OrchestrationResponse, TextRequest, TrackPayload,
};
pub use fallback::{generate_with_fallback, FallbackError, FallbackPolicy, Generated};

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::asset::{Asset, AssetContent, AssetKind, MediaRef};
use crate::error::RenderError;
use crate::quota;
use crate::session::{SessionState, TrackSlot, MAX_RENDERS};

const MASTER_AGENT_LABEL: &str = "Studio Orchestrator";

/// A finished render pass, not yet committed to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub master: Asset,
    pub render_pass: u32,
    /// The primary call failed and the master carries written mix notes.
    pub fallback_used: bool,
}

impl RenderOutcome {
    pub fn is_degraded(&self) -> bool {
        self.fallback_used || !self.master.notes.is_empty()
    }
}

pub struct GenerationOrchestrator {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationOrchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// Produce the master asset for the pass after `state.render_count`.
    pub async fn compose(&self, state: &SessionState) -> Result<RenderOutcome, RenderError> {
        quota::check(state)?;
        self.compose_pass(state, state.render_count + 1).await
    }

    /// Produce the master asset for `render_pass`, numbered by the caller's
    /// [`quota::RenderBudget`].
    #[tracing::instrument(
        name = "studio.render",
        skip(self, state),
        fields(
            session.render_pass = render_pass,
            session.real_assets = state.generate_real_assets,
        )
    )]
    pub async fn compose_pass(
        &self,
        state: &SessionState,
        render_pass: u32,
    ) -> Result<RenderOutcome, RenderError> {
        if render_pass == 0 || render_pass > MAX_RENDERS {
            return Err(RenderError::QuotaExceeded {
                render_count: render_pass.saturating_sub(1),
                max_renders: MAX_RENDERS,
            });
        }

        let tracks = state.assigned_tracks();
        if tracks.is_empty() {
            return Err(RenderError::NoTracksSelected);
        }

        let request = OrchestrationRequest {
            track_assets: tracks
                .iter()
                .map(|(slot, asset)| TrackPayload::from_asset(*slot, asset))
                .collect(),
            sync_parameters: state.sync.clone(),
            render_pass,
            generate_real_assets: state.generate_real_assets,
        };
        info!(tracks = tracks.len(), "Render pass started");

        let backend = self.backend.as_ref();
        let prompt = composite_prompt(&request);
        let primary = FallbackPolicy::composite()
            .run(backend, &prompt, || backend.orchestrate(&request))
            .await
            .map_err(|e| {
                error!(error = %e, "Render pass failed");
                RenderError::OrchestrationFailed {
                    reason: e.to_string(),
                }
            })?;

        let mut notes = Vec::new();
        let (composite_text, descriptor, fallback_used) = match primary {
            Generated::Primary(response) => (
                response.composite_text,
                response.master_asset_descriptor,
                false,
            ),
            Generated::Fallback { text, note, .. } => {
                notes.push(note);
                (text, MasterDescriptor::default(), true)
            }
        };

        let enriched = if state.generate_real_assets {
            self.enrich(&tracks, &mut notes).await
        } else {
            BTreeMap::new()
        };

        let master = assemble_master(MasterParts {
            tracks: &tracks,
            render_pass,
            composite_text,
            descriptor,
            enriched,
            notes,
            fallback_used,
        });

        info!(
            asset.id = %master.id,
            asset.kind = %master.kind(),
            fallback = fallback_used,
            notes = master.notes.len(),
            "Render pass complete"
        );

        Ok(RenderOutcome {
            master,
            render_pass,
            fallback_used,
        })
    }

    /// Generate media for tracks that only carry text. All requests are in
    /// flight together; the result holds only the ones that produced media.
    async fn enrich(
        &self,
        tracks: &[(TrackSlot, &Asset)],
        notes: &mut Vec<String>,
    ) -> BTreeMap<TrackSlot, MediaRef> {
        let targets: Vec<(TrackSlot, AssetKind, MediaRequest)> = tracks
            .iter()
            .filter(|(_, asset)| !asset.has_playable_media())
            .map(|(slot, asset)| {
                let prompt = asset.content.text_body().unwrap_or(&asset.title);
                let request = MediaRequest::new(prompt).with_option("track", slot.as_str());
                (*slot, enrichment_kind(*slot), request)
            })
            .collect();

        let backend = self.backend.as_ref();
        let results = join_all(targets.iter().map(|(slot, kind, request)| async move {
            (*slot, *kind, generate_with_fallback(backend, *kind, request).await)
        }))
        .await;

        let mut enriched = BTreeMap::new();
        for (slot, kind, result) in results {
            match result {
                Ok(Generated::Primary(media)) => {
                    info!(track.slot = %slot, media.kind = %kind, "Track enriched");
                    enriched.insert(slot, media);
                }
                Ok(Generated::Fallback { note, .. }) => {
                    warn!(track.slot = %slot, media.kind = %kind, "Enrichment degraded to text");
                    notes.push(format!("enrichment degraded: {} track: {}", slot, note));
                }
                Err(e) => {
                    warn!(track.slot = %slot, media.kind = %kind, error = %e, "Enrichment failed");
                    notes.push(format!(
                        "enrichment degraded: {} track: {} generation failed",
                        slot, kind
                    ));
                }
            }
        }
        enriched
    }
}

/// Media kind generated for a text-only track.
fn enrichment_kind(slot: TrackSlot) -> AssetKind {
    match slot {
        TrackSlot::Visual => AssetKind::Image,
        TrackSlot::Audio | TrackSlot::Vocal => AssetKind::Audio,
    }
}

/// Prompt for the written fallback when orchestration is down.
fn composite_prompt(request: &OrchestrationRequest) -> String {
    let sync = &request.sync_parameters;
    let mut prompt = format!(
        "Render pass {}. {} BPM, {}, key of {}, {} fps at {}.\nTracks:\n",
        request.render_pass, sync.bpm, sync.time_signature, sync.key, sync.frame_rate, sync.aspect_ratio
    );
    for track in &request.track_assets {
        let _ = write!(prompt, "- {} ({}): {}", track.slot, track.kind, track.title);
        if let Some(content) = &track.content {
            let _ = write!(prompt, " - {}", content);
        }
        prompt.push('\n');
    }
    prompt
}

/// Normalize a descriptor media field, keeping only http(s) and inline data.
fn sanitize_media(kind: AssetKind, value: Option<&Value>) -> Option<MediaRef> {
    let media = MediaRef::from_payload(kind, value?)?;
    if media.is_supported() {
        Some(media)
    } else {
        warn!(media.kind = %kind, "Dropping master media with unsupported source");
        None
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

struct MasterParts<'a> {
    tracks: &'a [(TrackSlot, &'a Asset)],
    render_pass: u32,
    composite_text: String,
    descriptor: MasterDescriptor,
    enriched: BTreeMap<TrackSlot, MediaRef>,
    notes: Vec<String>,
    fallback_used: bool,
}

/// Build the master: descriptor media first, then whatever the tracks (or
/// enrichment) provide. Stems list every track in slot order.
fn assemble_master(parts: MasterParts<'_>) -> Asset {
    let MasterParts {
        tracks,
        render_pass,
        composite_text,
        descriptor,
        mut enriched,
        notes,
        fallback_used,
    } = parts;

    let track = |slot: TrackSlot| {
        tracks
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, asset)| *asset)
    };

    let video = sanitize_media(AssetKind::Video, descriptor.video.as_ref())
        .or_else(|| track(TrackSlot::Visual).and_then(|a| a.content.video_ref().cloned()));

    let audio = sanitize_media(AssetKind::Audio, descriptor.audio.as_ref())
        .or_else(|| track(TrackSlot::Audio).and_then(|a| a.content.audio_ref().cloned()))
        .or_else(|| enriched.remove(&TrackSlot::Audio))
        .or_else(|| track(TrackSlot::Vocal).and_then(|a| a.content.audio_ref().cloned()))
        .or_else(|| enriched.remove(&TrackSlot::Vocal));

    let image = sanitize_media(AssetKind::Image, descriptor.image.as_ref())
        .or_else(|| track(TrackSlot::Visual).and_then(|a| a.content.image_ref().cloned()))
        .or_else(|| enriched.remove(&TrackSlot::Visual));

    let text = if composite_text.trim().is_empty() {
        non_empty(descriptor.description.clone())
            .unwrap_or_else(|| format!("Master mix, render pass {}", render_pass))
    } else {
        composite_text
    };

    let mut content = AssetContent::text(text);
    if let Some(media) = video {
        content = content.with_video(media);
    }
    if let Some(media) = audio {
        content = content.with_audio(media);
    }
    if let Some(media) = image {
        content = content.with_image(media);
    }

    let title = non_empty(descriptor.title)
        .unwrap_or_else(|| format!("Master Mix (Pass {})", render_pass));
    let agent_label =
        non_empty(descriptor.agent_label).unwrap_or_else(|| MASTER_AGENT_LABEL.to_string());

    let mut master = Asset::new(title, agent_label, content)
        .with_stems(tracks.iter().map(|(_, asset)| asset.id.clone()))
        .with_render_pass(render_pass);
    master.fallback = fallback_used;
    for note in notes {
        master = master.with_note(note);
    }
    master
}
