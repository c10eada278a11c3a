//! Bridge wire frames.
//!
//! Every frame is a JSON text message. Inbound frames are one of:
//!
//! | Shape | Meaning |
//! |-------|---------|
//! | `{"event", "data"}` | a [`ProtocolEvent`] |
//! | `{"echo", "status", "data"?, "error"?}` | response to one of our requests |
//! | `{"request", "echo", ...}` | the bridge asking us for something |
//!
//! Outbound frames are requests (`{"action", "params", "echo"}`) and replies
//! to bridge requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use asena_core::ProtocolEvent;

/// An outbound API request.
#[derive(Debug, Clone, Serialize)]
pub struct Request<'a> {
    pub action: &'a str,
    pub params: Value,
    pub echo: u64,
}

/// Status of a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
}

/// A response frame, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub echo: u64,
    pub status: Status,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(echo: u64, data: Value) -> Self {
        Self {
            echo,
            status: Status::Ok,
            data,
            error: None,
        }
    }

    pub fn failed(echo: u64, error: impl Into<String>) -> Self {
        Self {
            echo,
            status: Status::Failed,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// A request issued by the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "request")]
pub enum BridgeRequest {
    /// Asks for a stored message so the bridge can retry decryption or resend.
    #[serde(rename = "getMessage")]
    GetMessage { id: String, echo: u64 },
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(ProtocolEvent),
    Response(Response),
    Request(BridgeRequest),
    /// Well-formed JSON the shell does not handle, such as unknown events.
    Ignored(String),
}

/// Classifies an inbound text frame.
pub fn classify(text: &str) -> serde_json::Result<Inbound> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("request").is_some() {
        return serde_json::from_value(value).map(Inbound::Request);
    }
    if value.get("status").is_some() && value.get("echo").is_some() {
        return serde_json::from_value(value).map(Inbound::Response);
    }
    match value.get("event").and_then(Value::as_str) {
        Some(name) => {
            let name = name.to_string();
            Ok(serde_json::from_value(value)
                .map(Inbound::Event)
                .unwrap_or(Inbound::Ignored(name)))
        }
        None => Ok(Inbound::Ignored(String::from("<untagged>"))),
    }
}
