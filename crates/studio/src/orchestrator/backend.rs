//! Remote generation services.
//!
//! [`GenerationBackend`] is the seam between the engine and whatever produces
//! media. [`HttpBackend`] talks JSON over HTTP to the studio API; tests plug in
//! scripted implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use studioconf::{BackendConfig, EndpointsConfig};
use tracing::debug;

use crate::asset::{Asset, AssetKind, MediaRef};
use crate::error::BackendError;
use crate::session::{SyncParameters, TrackSlot};

/// One track as sent to the orchestration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub slot: TrackSlot,
    pub kind: AssetKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub media_refs: Vec<MediaRef>,
}

impl TrackPayload {
    pub fn from_asset(slot: TrackSlot, asset: &Asset) -> Self {
        Self {
            slot,
            kind: asset.kind(),
            title: asset.title.clone(),
            content: asset.content.text_body().map(str::to_string),
            media_refs: asset.content.media_refs().into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRequest {
    pub track_assets: Vec<TrackPayload>,
    pub sync_parameters: SyncParameters,
    pub render_pass: u32,
    pub generate_real_assets: bool,
}

/// What the orchestration service says the master should look like. Media
/// fields are raw payloads, normalized and sanitized on assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasterDescriptor {
    pub title: Option<String>,
    pub agent_label: Option<String>,
    pub description: Option<String>,
    pub audio: Option<Value>,
    pub video: Option<Value>,
    pub image: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResponse {
    pub composite_text: String,
    #[serde(default, alias = "masterAsset")]
    pub master_asset_descriptor: MasterDescriptor,
}

/// Prompt plus format-specific options for a media endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl MediaRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub prompt: String,
    pub system_instruction: String,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn orchestrate(
        &self,
        request: &OrchestrationRequest,
    ) -> Result<OrchestrationResponse, BackendError>;

    async fn generate_media(
        &self,
        kind: AssetKind,
        request: &MediaRequest,
    ) -> Result<MediaRef, BackendError>;

    /// Generic text completion; returns the `output` text.
    async fn complete_text(&self, request: &TextRequest) -> Result<String, BackendError>;
}

/// JSON-over-HTTP client for the studio API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    endpoints: EndpointsConfig,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig, endpoints: EndpointsConfig) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn media_path(&self, kind: AssetKind) -> Option<&str> {
        match kind {
            AssetKind::Image => Some(&self.endpoints.image),
            AssetKind::Audio => Some(&self.endpoints.audio),
            AssetKind::Video => Some(&self.endpoints.video),
            AssetKind::Text => None,
        }
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, BackendError> {
        let url = self.url(path);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);

        if let Some(traceparent) = crate::telemetry::current_traceparent() {
            request = request.header("traceparent", traceparent);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        if let Some(error) = value.get("error").filter(|v| !v.is_null()) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(BackendError::Rejected(message));
        }

        debug!(http.url = %url, "Backend call succeeded");
        Ok(value)
    }
}

/// Pull a media reference out of a media endpoint's response body.
pub fn extract_media(kind: AssetKind, body: &Value) -> Option<MediaRef> {
    ["output", "data", "images", "result"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| MediaRef::from_payload(kind, v))
        .or_else(|| MediaRef::from_payload(kind, body))
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    #[tracing::instrument(
        name = "backend.orchestrate",
        skip(self, request),
        fields(session.render_pass = request.render_pass, tracks = request.track_assets.len())
    )]
    async fn orchestrate(
        &self,
        request: &OrchestrationRequest,
    ) -> Result<OrchestrationResponse, BackendError> {
        let value = self.post_json(&self.endpoints.orchestrate, request).await?;
        serde_json::from_value(value).map_err(|e| BackendError::Decode(e.to_string()))
    }

    #[tracing::instrument(name = "backend.generate_media", skip(self, request), fields(media.kind = %kind))]
    async fn generate_media(
        &self,
        kind: AssetKind,
        request: &MediaRequest,
    ) -> Result<MediaRef, BackendError> {
        let path = self
            .media_path(kind)
            .ok_or_else(|| BackendError::Rejected(format!("no media endpoint for {}", kind)))?
            .to_string();
        let value = self.post_json(&path, request).await?;
        extract_media(kind, &value)
            .ok_or_else(|| BackendError::Decode(format!("response carried no {} media", kind)))
    }

    #[tracing::instrument(name = "backend.complete_text", skip_all)]
    async fn complete_text(&self, request: &TextRequest) -> Result<String, BackendError> {
        let value = self.post_json(&self.endpoints.text, request).await?;
        value
            .get("output")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| BackendError::Decode("response carried no output text".to_string()))
    }
}
