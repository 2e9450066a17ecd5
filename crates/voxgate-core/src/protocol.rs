//! Wire frames exchanged on the streaming connection.
//!
//! A cycle is one text frame carrying [`ClientMetadata`], one binary frame
//! carrying audio, and at most one [`ServerFrame`] in reply.

use crate::types::{default_speaker, EnsembleResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Keys of the success `data` object that engine names must not shadow.
pub const RESERVED_DATA_KEYS: &[&str] =
    &["finalText", "speaker", "language", "confidence", "events"];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("metadata must be a JSON object")]
    NotAnObject,

    /// Well-formed JSON whose known fields carry the wrong type.
    #[error("invalid metadata field: {0}")]
    InvalidField(serde_json::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientMetadata {
    #[serde(default)]
    speaker: Option<Value>,

    #[serde(default)]
    pub language: Option<String>,
}

impl ClientMetadata {
    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let value: Value = serde_json::from_str(text).map_err(MetadataError::InvalidJson)?;
        if !value.is_object() {
            return Err(MetadataError::NotAnObject);
        }
        serde_json::from_value(value).map_err(MetadataError::InvalidField)
    }

    /// The speaker descriptor, or the unknown sentinel when absent or null.
    pub fn speaker(&self) -> Value {
        match &self.speaker {
            Some(Value::Null) | None => default_speaker(),
            Some(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MalformedMetadata,
    UnexpectedFrame,
    AudioTimeout,
    EngineUnavailable,
    EngineFailure,
    InternalError,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    SttResult {
        data: EnsembleResponse,
    },
    EnsembleResult {
        data: EnsembleResponse,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

impl ServerFrame {
    /// Wrap a response in the frame type matching the number of engines behind it.
    pub fn result(data: EnsembleResponse, engine_count: usize) -> Self {
        if engine_count > 1 {
            ServerFrame::EnsembleResult { data }
        } else {
            ServerFrame::SttResult { data }
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
