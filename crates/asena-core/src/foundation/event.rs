//! Inbound protocol events.
//!
//! The bridge delivers every event as a JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`. [`ProtocolEvent`] is the typed
//! form of such a frame. Payloads the shell only stores (credentials, chat
//! updates, raw messages) are kept as [`serde_json::Value`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jid::Jid;

/// A typed inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ProtocolEvent {
    /// Connection lifecycle change.
    #[serde(rename = "connection.update")]
    ConnectionUpdate(ConnectionUpdate),
    /// Authentication credentials changed and should be persisted.
    #[serde(rename = "creds.update")]
    CredsUpdate(Value),
    /// A batch of new or appended messages.
    #[serde(rename = "messages.upsert")]
    MessagesUpsert(MessagesUpsert),
    /// Members joined, left or changed role in a group.
    #[serde(rename = "group-participants.update")]
    GroupParticipantsUpdate(ParticipantsUpdate),
    /// Chat metadata changed.
    #[serde(rename = "chats.update")]
    ChatsUpdate(Vec<Value>),
    /// Incoming call signalling.
    #[serde(rename = "call")]
    Call(Vec<CallOffer>),
}

impl ProtocolEvent {
    /// Parses a raw event frame.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Returns the wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionUpdate(_) => "connection.update",
            Self::CredsUpdate(_) => "creds.update",
            Self::MessagesUpsert(_) => "messages.upsert",
            Self::GroupParticipantsUpdate(_) => "group-participants.update",
            Self::ChatsUpdate(_) => "chats.update",
            Self::Call(_) => "call",
        }
    }

    /// Builds the close update the transport emits when the stream dies
    /// without the bridge announcing it.
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionUpdate(ConnectionUpdate {
            connection: Some(ConnectionPhase::Close),
            last_disconnect: Some(LastDisconnect {
                status_code: Some(DisconnectReason::ConnectionLost.status_code()),
                message: Some(message.into()),
            }),
            qr: None,
        })
    }
}

// =============================================================================
// connection.update
// =============================================================================

/// Payload of `connection.update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    /// New connection phase, absent for QR-only updates.
    #[serde(default)]
    pub connection: Option<ConnectionPhase>,
    /// Why the last connection closed.
    #[serde(default)]
    pub last_disconnect: Option<LastDisconnect>,
    /// Pairing QR payload, when the session is not yet linked.
    #[serde(default)]
    pub qr: Option<String>,
}

/// Connection phase announced by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// Handshake in progress.
    Connecting,
    /// Session established.
    Open,
    /// Session closed.
    Close,
}

/// Details about the last disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
    /// Status code reported by the protocol library.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Human-readable error text.
    #[serde(default)]
    pub message: Option<String>,
}

impl LastDisconnect {
    /// Classifies the disconnect.
    pub fn reason(&self) -> DisconnectReason {
        DisconnectReason::from_status_code(self.status_code)
    }
}

/// Why a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The device was unlinked; the stored session is useless.
    LoggedOut,
    /// Network-level loss or timeout.
    ConnectionLost,
    /// The server closed the connection.
    ConnectionClosed,
    /// Another client took over the session.
    ConnectionReplaced,
    /// Multi-device state mismatch.
    MultideviceMismatch,
    /// Session data is corrupt.
    BadSession,
    /// The server asked for a restart after pairing.
    RestartRequired,
    /// Unrecognised or missing status code.
    Unknown(Option<u16>),
}

impl DisconnectReason {
    /// Maps a protocol status code to a reason.
    pub fn from_status_code(code: Option<u16>) -> Self {
        match code {
            Some(401) => Self::LoggedOut,
            Some(408) => Self::ConnectionLost,
            Some(411) => Self::MultideviceMismatch,
            Some(428) => Self::ConnectionClosed,
            Some(440) => Self::ConnectionReplaced,
            Some(500) => Self::BadSession,
            Some(515) => Self::RestartRequired,
            other => Self::Unknown(other),
        }
    }

    /// Returns the protocol status code for this reason, `0` when unknown.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::LoggedOut => 401,
            Self::ConnectionLost => 408,
            Self::MultideviceMismatch => 411,
            Self::ConnectionClosed => 428,
            Self::ConnectionReplaced => 440,
            Self::BadSession => 500,
            Self::RestartRequired => 515,
            Self::Unknown(code) => code.unwrap_or(0),
        }
    }

    /// Only a logout ends the process; everything else is retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

// =============================================================================
// messages.upsert
// =============================================================================

/// Payload of `messages.upsert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesUpsert {
    /// Whether the batch is live traffic or history.
    #[serde(rename = "type")]
    pub kind: UpsertKind,
    /// Raw message payloads.
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// Kind of an upsert batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// Live messages that should be processed.
    Notify,
    /// History or own-device sync.
    Append,
    /// Anything newer the shell does not know.
    #[serde(other)]
    Unknown,
}

// =============================================================================
// group-participants.update
// =============================================================================

/// Payload of `group-participants.update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantsUpdate {
    /// Group chat identifier.
    pub id: Jid,
    /// Affected members.
    #[serde(default)]
    pub participants: Vec<Jid>,
    /// What happened to them.
    pub action: ParticipantAction,
}

/// Membership change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    /// Members joined or were added.
    Add,
    /// Members left or were removed.
    Remove,
    /// Members became admins.
    Promote,
    /// Members lost admin rights.
    Demote,
    /// Anything else.
    #[serde(other)]
    Other,
}

// =============================================================================
// call
// =============================================================================

/// One entry of a `call` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOffer {
    /// Call id, needed to reject it.
    pub id: String,
    /// Calling account.
    pub from: Jid,
    /// Call state.
    pub status: CallStatus,
    /// Whether it is a video call.
    #[serde(default)]
    pub is_video: bool,
    /// Whether it is a group call.
    #[serde(default)]
    pub is_group: bool,
}

/// Call signalling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Offer,
    Ringing,
    Timeout,
    Reject,
    Accept,
    Terminate,
    #[serde(other)]
    Other,
}
