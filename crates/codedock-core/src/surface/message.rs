//! Surface protocol message types
//!
//! Two layers travel over a bridge connection, both as JSON text frames:
//! - bridge frames (`BridgeFrame` inbound, `HostFrame` outbound) wrap window
//!   messages with the origin information the browser would provide
//! - the embedded editor's own messages (`OutboundMessage` and the inbound
//!   change payload parsed by `parse_inbound`)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::Language;

/// A file carried in a populate or change message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub content: String,
}

/// Messages posted to the embedded editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum OutboundMessage {
    /// Replace the editor's document
    #[serde(rename = "populateCode")]
    PopulateCode {
        language: Language,
        files: Vec<FileEntry>,
    },

    /// Run the current document
    #[serde(rename = "triggerRun")]
    TriggerRun,
}

impl OutboundMessage {
    /// Create a populate message carrying one document
    pub fn populate(language: Language, name: &str, content: &str) -> Self {
        OutboundMessage::PopulateCode {
            language,
            files: vec![FileEntry {
                name: name.to_string(),
                content: content.to_string(),
            }],
        }
    }

    /// Content of the first file, if this is a populate message
    pub fn populated_content(&self) -> Option<&str> {
        match self {
            OutboundMessage::PopulateCode { files, .. } => {
                files.first().map(|f| f.content.as_str())
            }
            OutboundMessage::TriggerRun => None,
        }
    }
}

/// A validated content change reported by the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundChange {
    /// Filename reported by the surface, if any
    pub document_name: Option<String>,
    pub content: String,
}

/// Reasons an inbound payload is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InboundError {
    #[error("payload is not an object")]
    NotAnObject,

    #[error("payload uses the unsupported '{0}' shape")]
    UnsupportedShape(&'static str),

    #[error("payload has no files array")]
    MissingFiles,

    #[error("files array is empty")]
    EmptyFiles,

    #[error("first file has no string content")]
    MissingContent,
}

/// Validate an inbound window message from the editor
///
/// The canonical shape is `{files: [{name, content}, ...]}`; only the first
/// file is read. Present-but-empty content is a valid change. The legacy
/// `{code}` shape is rejected.
pub fn parse_inbound(data: &Value) -> Result<InboundChange, InboundError> {
    let object = data.as_object().ok_or(InboundError::NotAnObject)?;

    let Some(files) = object.get("files") else {
        if object.contains_key("code") {
            return Err(InboundError::UnsupportedShape("code"));
        }
        return Err(InboundError::MissingFiles);
    };

    let first = files
        .as_array()
        .ok_or(InboundError::MissingFiles)?
        .first()
        .ok_or(InboundError::EmptyFiles)?;

    let content = first
        .get("content")
        .and_then(Value::as_str)
        .ok_or(InboundError::MissingContent)?;

    let document_name = first
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string);

    Ok(InboundChange {
        document_name,
        content: content.to_string(),
    })
}

/// Frames sent by the surface bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeFrame {
    /// The embedded frame finished loading
    Load,

    /// A window message received by the bridge
    Message { origin: String, data: Value },
}

impl BridgeFrame {
    /// Decode a frame from JSON text
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Frames sent to the surface bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostFrame {
    /// Post `data` to the embedded frame, restricted to `target_origin`
    Post {
        #[serde(rename = "targetOrigin")]
        target_origin: String,
        data: OutboundMessage,
    },
}

impl HostFrame {
    pub fn post(target_origin: &str, data: OutboundMessage) -> Self {
        HostFrame::Post {
            target_origin: target_origin.to_string(),
            data,
        }
    }

    /// Encode the frame as JSON text
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
