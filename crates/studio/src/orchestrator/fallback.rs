//! Structured call, then descriptive text if it fails.
//!
//! One [`FallbackPolicy`] per content kind says what to ask the text endpoint
//! for and how to label the degraded result. [`FallbackPolicy::run`] applies
//! it around any primary call.

use std::future::Future;

use thiserror::Error;
use tracing::{info, warn};

use super::backend::{GenerationBackend, MediaRequest, TextRequest};
use crate::asset::{Asset, AssetContent, AssetKind, MediaRef};
use crate::error::BackendError;

/// Both the primary call and the text fallback failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{primary}; text fallback also failed: {fallback}")]
pub struct FallbackError {
    pub primary: BackendError,
    pub fallback: BackendError,
}

/// Outcome of a call guarded by a fallback policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated<T> {
    Primary(T),
    /// Descriptive stand-in produced after the primary call failed.
    Fallback {
        text: String,
        note: String,
        cause: BackendError,
    },
}

impl<T> Generated<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Generated::Fallback { .. })
    }
}

impl Generated<MediaRef> {
    /// Wrap as an asset; fallbacks become text assets tagged with their note.
    pub fn into_asset(
        self,
        kind: AssetKind,
        title: impl Into<String>,
        agent_label: impl Into<String>,
    ) -> Asset {
        match self {
            Generated::Primary(media) => {
                Asset::new(title, agent_label, AssetContent::from_media(kind, media))
            }
            Generated::Fallback { text, note, .. } => {
                Asset::new(title, agent_label, AssetContent::text(text)).as_fallback(note)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    subject: &'static str,
    system_instruction: &'static str,
    note: &'static str,
}

impl FallbackPolicy {
    pub fn for_media(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Image => Self {
                subject: "visual concept",
                system_instruction: "Image generation is unavailable. Describe the requested image in \
                    vivid visual detail: subject, composition, palette, lighting and mood.",
                note: "visual concept: media generation unavailable",
            },
            AssetKind::Audio => Self {
                subject: "audio concept",
                system_instruction: "Audio generation is unavailable. Write a production brief for the \
                    requested audio: instrumentation, tempo, structure and mix.",
                note: "audio concept: media generation unavailable",
            },
            AssetKind::Video => Self {
                subject: "video treatment",
                system_instruction: "Video generation is unavailable. Write a shot-by-shot treatment of \
                    the requested video, with camera movement and pacing.",
                note: "video treatment: media generation unavailable",
            },
            AssetKind::Text => Self {
                subject: "written concept",
                system_instruction: "Respond with a concise written rendition of the request.",
                note: "written concept: structured generation unavailable",
            },
        }
    }

    /// Policy for the render's primary orchestration call.
    pub fn composite() -> Self {
        Self {
            subject: "mix notes",
            system_instruction: "The mixing service is unavailable. Combine the listed tracks into a \
                single written production plan for the master mix: arrangement, levels, transitions \
                and how the visuals follow the music.",
            note: "mix notes: orchestration service unavailable",
        }
    }

    pub fn subject(&self) -> &'static str {
        self.subject
    }

    pub fn note(&self) -> &'static str {
        self.note
    }

    pub fn text_request(&self, prompt: &str) -> TextRequest {
        TextRequest {
            prompt: prompt.to_string(),
            system_instruction: self.system_instruction.to_string(),
        }
    }

    /// Await `primary`; on failure ask the text endpoint for a descriptive
    /// rendition of `prompt` instead.
    #[tracing::instrument(name = "studio.generate_with_fallback", skip_all, fields(fallback.subject = self.subject))]
    pub async fn run<T, F, Fut>(
        &self,
        backend: &dyn GenerationBackend,
        prompt: &str,
        primary: F,
    ) -> Result<Generated<T>, FallbackError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let cause = match primary().await {
            Ok(value) => return Ok(Generated::Primary(value)),
            Err(e) => e,
        };
        warn!(error = %cause, "Primary generation failed, requesting text fallback");

        let text = backend
            .complete_text(&self.text_request(prompt))
            .await
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(BackendError::Decode("empty fallback text".to_string()))
                } else {
                    Ok(text)
                }
            });

        match text {
            Ok(text) => {
                info!(note = self.note, "Using text fallback");
                Ok(Generated::Fallback {
                    text,
                    note: self.note.to_string(),
                    cause,
                })
            }
            Err(fallback) => Err(FallbackError {
                primary: cause,
                fallback,
            }),
        }
    }
}

/// Generate media of `kind`, degrading to descriptive text.
///
/// A reference that is neither http(s) nor inline data counts as a failed
/// primary call.
pub async fn generate_with_fallback(
    backend: &dyn GenerationBackend,
    kind: AssetKind,
    request: &MediaRequest,
) -> Result<Generated<MediaRef>, FallbackError> {
    FallbackPolicy::for_media(kind)
        .run(backend, &request.prompt, || async move {
            let media = backend.generate_media(kind, request).await?;
            if media.is_supported() {
                Ok(media)
            } else {
                Err(BackendError::Decode(format!("unsupported {} media source", kind)))
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::backend::{OrchestrationRequest, OrchestrationResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Media fails or succeeds by flag; text returns a canned answer or fails.
    struct Stub {
        media_ok: bool,
        media: Option<MediaRef>,
        text: Option<String>,
        text_requests: Mutex<Vec<TextRequest>>,
    }

    impl Stub {
        fn new(media_ok: bool, text: Option<&str>) -> Self {
            Self {
                media_ok,
                media: None,
                text: text.map(str::to_string),
                text_requests: Mutex::new(Vec::new()),
            }
        }

        fn returning(mut self, media: MediaRef) -> Self {
            self.media = Some(media);
            self
        }
    }

    #[async_trait]
    impl GenerationBackend for Stub {
        async fn orchestrate(
            &self,
            _request: &OrchestrationRequest,
        ) -> Result<OrchestrationResponse, BackendError> {
            Err(BackendError::Transport("unused".into()))
        }

        async fn generate_media(
            &self,
            kind: AssetKind,
            _request: &MediaRequest,
        ) -> Result<MediaRef, BackendError> {
            if let Some(media) = &self.media {
                Ok(media.clone())
            } else if self.media_ok {
                Ok(MediaRef::url(format!("https://gen/{}", kind)))
            } else {
                Err(BackendError::Status {
                    status: 500,
                    body: "model offline".into(),
                })
            }
        }

        async fn complete_text(&self, request: &TextRequest) -> Result<String, BackendError> {
            self.text_requests.lock().unwrap().push(request.clone());
            self.text
                .clone()
                .ok_or_else(|| BackendError::Transport("text offline".into()))
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let backend = Stub::new(true, Some("unused"));
        let result = generate_with_fallback(&backend, AssetKind::Image, &MediaRequest::new("cat"))
            .await
            .unwrap();

        assert_eq!(result, Generated::Primary(MediaRef::url("https://gen/image")));
        assert!(backend.text_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_degrades_to_text() {
        let backend = Stub::new(false, Some("A tabby cat on a windowsill at dusk"));
        let result = generate_with_fallback(&backend, AssetKind::Image, &MediaRequest::new("cat"))
            .await
            .unwrap();

        assert!(result.is_fallback());
        let requests = backend.text_requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "cat");

        let asset = result.into_asset(AssetKind::Image, "Cat", "Artist");
        assert!(asset.fallback);
        assert_eq!(asset.kind(), AssetKind::Text);
        assert_eq!(asset.notes, vec!["visual concept: media generation unavailable".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_media_source_degrades_to_text() {
        let backend =
            Stub::new(true, Some("A cat, described")).returning(MediaRef::url("Content policy violation"));
        let result = generate_with_fallback(&backend, AssetKind::Image, &MediaRequest::new("cat"))
            .await
            .unwrap();

        match result {
            Generated::Fallback { text, cause, .. } => {
                assert_eq!(text, "A cat, described");
                assert!(matches!(cause, BackendError::Decode(_)));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_both_failing_reports_both_errors() {
        let backend = Stub::new(false, None);
        let err = generate_with_fallback(&backend, AssetKind::Audio, &MediaRequest::new("beat"))
            .await
            .unwrap_err();

        assert!(matches!(err.primary, BackendError::Status { status: 500, .. }));
        assert!(matches!(err.fallback, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn test_blank_fallback_text_is_failure() {
        let backend = Stub::new(false, Some("   "));
        let err = generate_with_fallback(&backend, AssetKind::Video, &MediaRequest::new("clip"))
            .await
            .unwrap_err();
        assert!(matches!(err.fallback, BackendError::Decode(_)));
    }

    #[test]
    fn test_policies_label_by_kind() {
        assert!(FallbackPolicy::for_media(AssetKind::Image).note().starts_with("visual concept"));
        assert!(FallbackPolicy::for_media(AssetKind::Video).note().starts_with("video treatment"));
        assert_eq!(FallbackPolicy::composite().subject(), "mix notes");
    }
}
