//! Canonical message records.
//!
//! A [`NormalizedMessage`] is produced once per inbound `messages.upsert`
//! event and shared behind an `Arc` for the rest of its life, so it is never
//! mutated after normalization.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jid::Jid;

/// Wire kind of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Plain text (`conversation`).
    Text,
    /// Text with formatting, links or quotes (`extendedTextMessage`).
    ExtendedText,
    /// `imageMessage`.
    Image,
    /// `videoMessage`.
    Video,
    /// `stickerMessage`.
    Sticker,
    /// `audioMessage`.
    Audio,
    /// `documentMessage`.
    Document,
    /// `protocolMessage` (revokes, ephemeral settings, ...).
    Protocol,
    /// `reactionMessage`.
    Reaction,
    /// Any other wire kind, kept verbatim.
    Other(String),
}

impl MessageType {
    /// Maps a key of the raw `message` object to a type.
    pub fn from_wire(key: &str) -> Self {
        match key {
            "conversation" => Self::Text,
            "extendedTextMessage" => Self::ExtendedText,
            "imageMessage" => Self::Image,
            "videoMessage" => Self::Video,
            "stickerMessage" => Self::Sticker,
            "audioMessage" => Self::Audio,
            "documentMessage" => Self::Document,
            "protocolMessage" => Self::Protocol,
            "reactionMessage" => Self::Reaction,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the raw wire key for this type.
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Text => "conversation",
            Self::ExtendedText => "extendedTextMessage",
            Self::Image => "imageMessage",
            Self::Video => "videoMessage",
            Self::Sticker => "stickerMessage",
            Self::Audio => "audioMessage",
            Self::Document => "documentMessage",
            Self::Protocol => "protocolMessage",
            Self::Reaction => "reactionMessage",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Protocol key that uniquely addresses a message inside a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Chat the message belongs to.
    pub remote_jid: Jid,
    /// Whether the own account sent it.
    #[serde(default)]
    pub from_me: bool,
    /// Message id.
    pub id: String,
    /// Sender inside a group chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Jid>,
}

/// A canonical inbound message record.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    /// Message id.
    pub id: String,
    /// Chat the message was posted in.
    pub chat: Jid,
    /// Sending account (device suffix removed).
    pub sender: Jid,
    /// Text body or caption, if any.
    pub body: Option<String>,
    /// Wire kind of the message.
    pub kind: MessageType,
    /// Whether the own account sent it.
    pub from_self: bool,
    /// Whether the sender is the own account or a configured sudo user.
    pub sudo: bool,
    /// Display name announced by the sender.
    pub push_name: Option<String>,
    /// Protocol key, used for receipts and quoting.
    pub key: MessageKey,
    /// For protocol (revoke) messages, the id of the message being deleted.
    pub revoked_id: Option<String>,
    /// The raw payload as received from the bridge.
    pub raw: Value,
}

impl NormalizedMessage {
    /// Returns the body text, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Whether the message was posted in a group chat.
    pub fn is_group(&self) -> bool {
        self.chat.is_group()
    }
}

/// An outbound text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Text to send.
    pub text: String,
    /// Accounts mentioned in the text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Jid>,
    /// Message being replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted: Option<MessageKey>,
}

impl OutgoingMessage {
    /// Creates a plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mentions: Vec::new(),
            quoted: None,
        }
    }

    /// Adds mentioned accounts.
    pub fn with_mentions(mut self, mentions: impl IntoIterator<Item = Jid>) -> Self {
        self.mentions.extend(mentions);
        self
    }

    /// Quotes the given message.
    pub fn quoting(mut self, key: MessageKey) -> Self {
        self.quoted = Some(key);
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for OutgoingMessage {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}
