use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Speaker descriptor echoed back when the client does not send one.
pub fn default_speaker() -> Value {
    serde_json::json!({ "type": "unknown" })
}

/// One metadata + audio pair, ready to be dispatched.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub speaker: Value,
    pub language: Option<String>,
    pub audio: Arc<[u8]>,
    pub received_at: Instant,
}

impl ChunkRequest {
    pub fn new(speaker: Value, language: Option<String>, audio: Vec<u8>) -> Self {
        Self {
            speaker,
            language,
            audio: audio.into(),
            received_at: Instant::now(),
        }
    }
}

/// What a recognition engine hands back for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
    pub confidence: Option<f32>,
}

impl Transcript {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A single engine's contribution to a response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub confidence: f32,
}

/// Payload of a success frame. Per-engine results are flattened into the
/// object under each engine's configured name.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleResponse {
    pub final_text: String,
    pub speaker: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub confidence: f32,
    pub events: Vec<Value>,
    #[serde(flatten)]
    pub engines: BTreeMap<String, EngineResult>,
}

impl EnsembleResponse {
    pub fn has_text(&self) -> bool {
        !self.final_text.trim().is_empty()
    }
}
