//! Requests from the control panel to the page agent, and the replies.
//!
//! On the wire a request is `{"action": "...", "payload": ...}`; only the
//! actions below exist and anything else is rejected.

use serde::{Deserialize, Serialize};

use crate::models::{AnnotationSet, Color};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Select,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum Request {
    SetMode(Mode),
    SetHighlightColor(Color),
    SetDrawColor(Color),
    SetBrushSize(f64),
    ClearAnnotations,
    GetAnnotations,
    ImportAnnotations(AnnotationSet),
}

impl Request {
    /// Whether the sender should wait for a [`Response`].
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            Request::ClearAnnotations | Request::GetAnnotations | Request::ImportAnnotations(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Success { success: bool },
    Data { data: AnnotationSet },
}

impl Response {
    pub fn success() -> Self {
        Response::Success { success: true }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parses a raw request.
pub fn parse_request(raw: &str) -> Result<Request, MessageError> {
    Ok(serde_json::from_str(raw)?)
}
