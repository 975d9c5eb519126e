//! Shared test doubles for studio integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use studio::orchestrator::{
    GenerationBackend, MasterDescriptor, MediaRequest, OrchestrationRequest,
    OrchestrationResponse, TextRequest,
};
use studio::{
    Asset, AssetContent, AssetKind, BackendError, MediaRef, Notice, Project, ProjectStore,
};

/// Call log entry, in the order calls started.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Orchestrate { render_pass: u32 },
    Media(AssetKind),
    Text,
}

/// Backend whose answers are set up front.
pub struct ScriptedBackend {
    orchestrate: Mutex<Result<OrchestrationResponse, BackendError>>,
    media: Mutex<HashMap<AssetKind, Result<MediaRef, BackendError>>>,
    text: Mutex<Result<String, BackendError>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            orchestrate: Mutex::new(Ok(OrchestrationResponse {
                composite_text: "Balanced mix".to_string(),
                master_asset_descriptor: MasterDescriptor::default(),
            })),
            media: Mutex::new(HashMap::new()),
            text: Mutex::new(Err(BackendError::Transport("text endpoint offline".into()))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_orchestration(self, response: Result<OrchestrationResponse, BackendError>) -> Self {
        *self.orchestrate.lock().unwrap() = response;
        self
    }

    pub fn with_media(self, kind: AssetKind, response: Result<MediaRef, BackendError>) -> Self {
        self.media.lock().unwrap().insert(kind, response);
        self
    }

    pub fn with_text(self, response: Result<String, BackendError>) -> Self {
        *self.text.lock().unwrap() = response;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub fn offline() -> BackendError {
    BackendError::Status {
        status: 503,
        body: "model offline".to_string(),
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn orchestrate(
        &self,
        request: &OrchestrationRequest,
    ) -> Result<OrchestrationResponse, BackendError> {
        self.calls.lock().unwrap().push(Call::Orchestrate {
            render_pass: request.render_pass,
        });
        self.orchestrate.lock().unwrap().clone()
    }

    async fn generate_media(
        &self,
        kind: AssetKind,
        _request: &MediaRequest,
    ) -> Result<MediaRef, BackendError> {
        self.calls.lock().unwrap().push(Call::Media(kind));
        self.media
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Err(offline()))
    }

    async fn complete_text(&self, _request: &TextRequest) -> Result<String, BackendError> {
        self.calls.lock().unwrap().push(Call::Text);
        self.text.lock().unwrap().clone()
    }
}

/// Store that takes `delay` to answer each save.
pub struct SlowStore {
    delay: Duration,
    saved: Mutex<Vec<Project>>,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            saved: Mutex::new(Vec::new()),
        })
    }

    pub fn saved(&self) -> Vec<Project> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectStore for SlowStore {
    async fn save_project(&self, _user_id: &str, project: &Project) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.saved.lock().unwrap().push(project.clone());
        Ok(())
    }

    async fn load_projects(&self, _user_id: &str) -> Result<Vec<Project>> {
        Ok(self.saved())
    }
}

pub fn audio_asset(id: &str) -> Asset {
    Asset::new(
        format!("Beat {id}"),
        "Beat Maker",
        AssetContent::audio(MediaRef::url(format!("https://cdn.test/{id}.mp3"))),
    )
    .with_id(id)
}

pub fn vocal_asset(id: &str) -> Asset {
    Asset::new(
        format!("Vocal {id}"),
        "Vocalist",
        AssetContent::audio(MediaRef::url(format!("https://cdn.test/{id}.wav")))
            .with_text("la la la"),
    )
    .with_id(id)
}

pub fn text_asset(id: &str, body: &str) -> Asset {
    Asset::new(format!("Sketch {id}"), "Concept Artist", AssetContent::text(body)).with_id(id)
}

pub fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}
