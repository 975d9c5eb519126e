//! Generated and uploaded content.
//!
//! An [`Asset`] is write-once: composite "master" renders are new assets that
//! point at their constituent stems rather than edits of existing ones.
//!
//! Content always carries at least one payload. The asset kind is derived from
//! which payloads are present, with precedence video > audio > image > text,
//! so attaching an audio track to a video keeps it a video.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw strings longer than this that are not URLs are treated as base64.
const INLINE_PAYLOAD_MIN_LEN: usize = 500;

/// Unique identifier for an asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a new unique asset ID
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4();
        Self(format!("asset-{}-{}", millis, random.as_simple()))
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Audio,
    Video,
    Image,
    Text,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Audio => "audio",
            AssetKind::Video => "video",
            AssetKind::Image => "image",
            AssetKind::Text => "text",
        }
    }

    /// MIME type assumed for inline payloads that don't declare one.
    pub fn default_mime(&self) -> &'static str {
        match self {
            AssetKind::Audio => "audio/mpeg",
            AssetKind::Video => "video/mp4",
            AssetKind::Image => "image/png",
            AssetKind::Text => "text/plain",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a media payload lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaRef {
    Url { url: String },
    Inline { mime: String, data: String },
}

impl MediaRef {
    pub fn url(url: impl Into<String>) -> Self {
        MediaRef::Url { url: url.into() }
    }

    pub fn inline(mime: impl Into<String>, data: impl Into<String>) -> Self {
        MediaRef::Inline {
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Inline payload from raw bytes, e.g. an upload.
    pub fn from_bytes(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self::inline(mime, base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Decoded bytes of an inline payload. `None` for URLs or bad base64.
    pub fn inline_bytes(&self) -> Option<Vec<u8>> {
        match self {
            MediaRef::Inline { data, .. } => {
                base64::engine::general_purpose::STANDARD.decode(data).ok()
            }
            MediaRef::Url { .. } => None,
        }
    }

    /// Normalize whatever a generation backend returned into a media reference.
    ///
    /// Accepts plain and `data:` URLs, raw base64, objects carrying `url`,
    /// `b64_json`, `audio`, `video` or `image`, and arrays of any of those (the
    /// first usable entry wins). Returns `None` when nothing usable is present.
    pub fn from_payload(kind: AssetKind, payload: &Value) -> Option<Self> {
        match payload {
            Value::String(s) => Self::from_str_payload(kind, s),
            Value::Object(map) => {
                if let Some(found) = map.get("url").and_then(|v| Self::from_payload(kind, v)) {
                    return Some(found);
                }
                if let Some(b64) = map.get("b64_json").and_then(Value::as_str) {
                    let b64 = b64.trim();
                    if !b64.is_empty() {
                        return Some(Self::inline(kind.default_mime(), b64));
                    }
                }
                ["audio", "video", "image"]
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .find_map(|v| Self::from_payload(kind, v))
            }
            Value::Array(items) => items.iter().find_map(|v| Self::from_payload(kind, v)),
            _ => None,
        }
    }

    fn from_str_payload(kind: AssetKind, raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(rest) = s.strip_prefix("data:") {
            if let Some((header, data)) = rest.split_once(',') {
                let mime = header
                    .strip_suffix(";base64")
                    .unwrap_or(header)
                    .trim();
                let mime = if mime.is_empty() { kind.default_mime() } else { mime };
                return Some(Self::inline(mime, data));
            }
            return None;
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            return Some(Self::url(s));
        }

        if s.len() > INLINE_PAYLOAD_MIN_LEN && is_base64_text(s) {
            return Some(Self::inline(kind.default_mime(), s));
        }

        // Short prose, relative paths, other schemes: not media
        None
    }

    /// True for http(s) URLs and non-empty inline payloads.
    pub fn is_supported(&self) -> bool {
        match self {
            MediaRef::Url { url } => url.starts_with("http://") || url.starts_with("https://"),
            MediaRef::Inline { data, .. } => !data.trim().is_empty(),
        }
    }

    /// Source string a player can load.
    pub fn to_src(&self) -> String {
        match self {
            MediaRef::Url { url } => url.clone(),
            MediaRef::Inline { mime, data } => format!("data:{};base64,{}", mime, data),
        }
    }
}

fn is_base64_text(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'-' | b'_'))
}

/// Serialized shape of [`AssetContent`]; validated on the way in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ContentFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    video: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Payloads carried by an asset. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ContentFields", into = "ContentFields")]
pub struct AssetContent {
    video: Option<MediaRef>,
    audio: Option<MediaRef>,
    image: Option<MediaRef>,
    text: Option<String>,
}

impl TryFrom<ContentFields> for AssetContent {
    type Error = String;

    fn try_from(fields: ContentFields) -> Result<Self, Self::Error> {
        let content = AssetContent {
            video: fields.video,
            audio: fields.audio,
            image: fields.image,
            text: fields.text,
        };
        if content.is_empty() {
            return Err("asset content must carry at least one payload".to_string());
        }
        Ok(content)
    }
}

impl From<AssetContent> for ContentFields {
    fn from(content: AssetContent) -> Self {
        ContentFields {
            video: content.video,
            audio: content.audio,
            image: content.image,
            text: content.text,
        }
    }
}

impl AssetContent {
    fn empty() -> Self {
        Self {
            video: None,
            audio: None,
            image: None,
            text: None,
        }
    }

    pub fn audio(media: MediaRef) -> Self {
        Self::empty().with_audio(media)
    }

    pub fn video(media: MediaRef) -> Self {
        Self::empty().with_video(media)
    }

    pub fn image(media: MediaRef) -> Self {
        Self::empty().with_image(media)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::empty().with_text(text)
    }

    /// Build from a generated payload of the given kind.
    pub fn from_media(kind: AssetKind, media: MediaRef) -> Self {
        match kind {
            AssetKind::Audio => Self::audio(media),
            AssetKind::Video => Self::video(media),
            AssetKind::Image => Self::image(media),
            AssetKind::Text => Self::text(media.to_src()),
        }
    }

    pub fn with_audio(mut self, media: MediaRef) -> Self {
        self.audio = Some(media);
        self
    }

    pub fn with_video(mut self, media: MediaRef) -> Self {
        self.video = Some(media);
        self
    }

    pub fn with_image(mut self, media: MediaRef) -> Self {
        self.image = Some(media);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn audio_ref(&self) -> Option<&MediaRef> {
        self.audio.as_ref()
    }

    pub fn video_ref(&self) -> Option<&MediaRef> {
        self.video.as_ref()
    }

    pub fn image_ref(&self) -> Option<&MediaRef> {
        self.image.as_ref()
    }

    pub fn text_body(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Kind of the primary payload.
    pub fn primary_kind(&self) -> AssetKind {
        if self.video.is_some() {
            AssetKind::Video
        } else if self.audio.is_some() {
            AssetKind::Audio
        } else if self.image.is_some() {
            AssetKind::Image
        } else {
            AssetKind::Text
        }
    }

    /// All media references, primary first.
    pub fn media_refs(&self) -> Vec<&MediaRef> {
        [&self.video, &self.audio, &self.image]
            .into_iter()
            .filter_map(Option::as_ref)
            .collect()
    }

    pub fn has_media(&self) -> bool {
        self.video.is_some() || self.audio.is_some() || self.image.is_some()
    }

    fn is_empty(&self) -> bool {
        !self.has_media() && self.text.is_none()
    }
}

/// A single piece of generated or uploaded content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub title: String,
    pub agent_label: String,
    pub created_at: DateTime<Utc>,
    pub content: AssetContent,

    /// Constituent assets of a master render
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stems: Vec<AssetId>,

    /// Descriptive text stands in for media that could not be generated
    #[serde(default)]
    pub fallback: bool,

    /// Human-readable notes about degraded generation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_pass: Option<u32>,
}

impl Asset {
    pub fn new(
        title: impl Into<String>,
        agent_label: impl Into<String>,
        content: AssetContent,
    ) -> Self {
        Self {
            id: AssetId::generate(),
            title: title.into(),
            agent_label: agent_label.into(),
            created_at: Utc::now(),
            content,
            stems: Vec::new(),
            fallback: false,
            notes: Vec::new(),
            render_pass: None,
        }
    }

    /// Builder: set explicit id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = AssetId::new(id);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_stems(mut self, stems: impl IntoIterator<Item = AssetId>) -> Self {
        self.stems.extend(stems);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Builder: mark as a descriptive stand-in for unavailable media
    pub fn as_fallback(mut self, note: impl Into<String>) -> Self {
        self.fallback = true;
        self.notes.push(note.into());
        self
    }

    pub fn with_render_pass(mut self, pass: u32) -> Self {
        self.render_pass = Some(pass);
        self
    }

    pub fn kind(&self) -> AssetKind {
        self.content.primary_kind()
    }

    /// Carries something a media player can load.
    pub fn has_playable_media(&self) -> bool {
        self.content.has_media()
    }

    pub fn is_master(&self) -> bool {
        !self.stems.is_empty()
    }
}
