//! Envelope types shared by the HTTP façade.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic agent request accepted by `POST /run`.
#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    /// The message to process.
    pub message: String,
    /// Additional context for the request.
    #[serde(default)]
    pub context: serde_json::Map<String, Value>,
    /// Session identifier for stateful interactions.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Envelope status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// The uniform response shape returned by success and failure paths alike.
///
/// `session_id` is absent only when a request is rejected before a session
/// was resolved.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub message: String,
    pub status: EnvelopeStatus,
    pub data: Value,
    pub session_id: Option<String>,
}

impl Envelope {
    pub fn success(message: impl Into<String>, data: Value, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: EnvelopeStatus::Success,
            data,
            session_id: Some(session_id.into()),
        }
    }

    pub fn error(message: impl Into<String>, data: Value, session_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            status: EnvelopeStatus::Error,
            data,
            session_id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}
