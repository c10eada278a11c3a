//! Outbound API of a live session.
//!
//! [`WaSocket`] is the handle handlers and the runtime use to act on the
//! session. The protocol work behind each call is done by the bridge; the
//! shell only names the operation and its parameters.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::foundation::{Jid, MessageKey, OutgoingMessage};

/// Presence states that can be announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Available,
    Unavailable,
    Composing,
    Recording,
    Paused,
}

/// A group member as reported by `groupMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParticipant {
    /// Member account.
    pub id: Jid,
    /// `admin`, `superadmin`, or absent for regular members.
    #[serde(default)]
    pub admin: Option<String>,
}

/// Group information returned by `groupMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    /// Group chat identifier.
    pub id: Jid,
    /// Group title.
    pub subject: String,
    /// Group description.
    #[serde(default)]
    pub desc: Option<String>,
    /// Current members.
    #[serde(default)]
    pub participants: Vec<GroupParticipant>,
}

/// The outbound operations of a connected session.
#[async_trait]
pub trait WaSocket: Send + Sync {
    /// The own account identity, known once the session logged in.
    fn self_id(&self) -> Option<Jid>;

    /// Sends a message and returns its protocol key.
    async fn send_message(&self, to: &Jid, message: OutgoingMessage) -> ApiResult<MessageKey>;

    /// Marks messages as read.
    async fn read_messages(&self, keys: &[MessageKey]) -> ApiResult<()>;

    /// Announces a presence state, globally or towards one chat.
    async fn send_presence_update(&self, presence: Presence, to: Option<&Jid>) -> ApiResult<()>;

    /// Rejects an incoming call.
    async fn reject_call(&self, call_id: &str, from: &Jid) -> ApiResult<()>;

    /// Fetches metadata of a group chat.
    async fn group_metadata(&self, group: &Jid) -> ApiResult<GroupMetadata>;
}

/// Shared session handle.
pub type BoxedSocket = Arc<dyn WaSocket>;
