//! Wire protocol encoding/decoding
//!
//! Every frame is a JSON text envelope:
//! `{"type": <kind>, "payload": <kind-specific value>}`
//!
//! Known kinds map onto exactly one specialized [`Event`]; anything else is
//! only visible to `message` listeners.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dispatch::Event;
use crate::error::Result;

/// Status reported for synthesized screenshot notices
pub const SCREENSHOT_STATUS: &str = "Received new screenshot, processing...";

/// Prefix of synthesized screenshot notice ids
pub const SCREENSHOT_ID_PREFIX: &str = "screenshot_";

/// Envelope kinds understood by the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    History,
    ProcessStart,
    ProcessComplete,
    ProcessError,
    OcrComplete,
    Screenshot,
}

impl MessageKind {
    /// Parse the envelope `type` field
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "history" => Some(Self::History),
            "process_start" => Some(Self::ProcessStart),
            "process_complete" => Some(Self::ProcessComplete),
            "process_error" => Some(Self::ProcessError),
            "ocr_complete" => Some(Self::OcrComplete),
            "screenshot" => Some(Self::Screenshot),
            _ => None,
        }
    }

    /// Event raised for this kind
    pub fn event(self) -> Event {
        match self {
            Self::History => Event::History,
            Self::ProcessStart | Self::Screenshot => Event::ProcessStart,
            Self::ProcessComplete => Event::ProcessComplete,
            Self::ProcessError => Event::ProcessError,
            Self::OcrComplete => Event::OcrComplete,
        }
    }
}

/// Parse an inbound text frame
pub fn parse_frame(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Select the specialized event and payload for a parsed frame
///
/// Returns `None` when the frame has no recognised `type`. A missing
/// payload is passed through as `null`.
pub fn route(frame: &Value) -> Option<(Event, Value)> {
    let kind = frame
        .get("type")
        .and_then(Value::as_str)
        .and_then(MessageKind::from_wire)?;

    let payload = match kind {
        MessageKind::Screenshot => screenshot_notice(),
        _ => frame.get("payload").cloned().unwrap_or(Value::Null),
    };

    Some((kind.event(), payload))
}

/// Process-start payload announcing a freshly received screenshot
pub fn screenshot_notice() -> Value {
    json!({
        "id": format!("{}{}", SCREENSHOT_ID_PREFIX, unix_millis()),
        "status": SCREENSHOT_STATUS,
    })
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Outbound message accepted by `ConnectionManager::send`
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Sent verbatim
    Text(String),
    /// Serialized to JSON text
    Json(Value),
}

impl Outgoing {
    /// Produce the text frame to transmit
    pub fn into_text(self) -> Result<String> {
        match self {
            Outgoing::Text(text) => Ok(text),
            Outgoing::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

impl From<String> for Outgoing {
    fn from(text: String) -> Self {
        Outgoing::Text(text)
    }
}

impl From<&str> for Outgoing {
    fn from(text: &str) -> Self {
        Outgoing::Text(text.to_string())
    }
}

impl From<Value> for Outgoing {
    fn from(value: Value) -> Self {
        Outgoing::Json(value)
    }
}

/// Decode a dispatched payload into one of the typed views below
pub fn decode_payload<T: DeserializeOwned>(payload: &Value) -> Result<T> {
    Ok(T::deserialize(payload)?)
}

/// `process_start` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessStarted {
    pub id: String,
    pub status: String,
}

/// `process_error` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessFailed {
    pub id: String,
    pub error: String,
}

/// `ocr_complete` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OcrCompleted {
    pub id: String,
    pub text: String,
    pub status: String,
}

/// `process_complete` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessCompleted {
    /// Stored history record id
    pub id: i64,
    pub process_id: String,
    pub text: String,
    pub answer: String,
    /// RFC 3339 completion time
    pub timestamp: String,
    /// Base64 image thumbnail
    pub thumbnail: String,
}

/// One entry of a `history` payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: String,
    pub image_path: String,
    pub thumbnail: String,
    pub text: String,
    pub answer: String,
    pub title: String,
}
