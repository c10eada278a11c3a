//! Test fixtures: a recording socket, a static paused-chat set and message
//! builders.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream crates.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use asena_core::{
    ApiError, ApiResult, GroupMetadata, Jid, MessageKey, MessageType, NormalizedMessage,
    OutgoingMessage, PausedChats, Presence, StoreError, StoreResult, WaSocket,
};

/// Own account used by [`RecordingSocket::new`].
pub const SELF_JID: &str = "10000@s.whatsapp.net";

/// Builds a text message from `sender` in `chat`.
///
/// The sender is the chat itself for direct chats and a fixed participant for
/// groups. `sudo` and `from_self` are false.
pub fn message(chat: &str, body: &str) -> NormalizedMessage {
    let chat = Jid::new(chat);
    let sender = if chat.is_group() {
        Jid::new("555@s.whatsapp.net")
    } else {
        chat.clone()
    };
    message_from(chat, sender, body)
}

/// Builds a text message with an explicit sender.
pub fn message_from(chat: Jid, sender: Jid, body: &str) -> NormalizedMessage {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
    let id = format!("MSG{}", NEXT_ID.fetch_add(1, Ordering::Relaxed));
    let key = MessageKey {
        remote_jid: chat.clone(),
        from_me: false,
        id: id.clone(),
        participant: chat.is_group().then(|| sender.clone()),
    };
    NormalizedMessage {
        id,
        raw: json!({ "key": &key, "message": { "conversation": body } }),
        chat,
        sender,
        body: Some(body.to_string()),
        kind: MessageType::Text,
        from_self: false,
        sudo: false,
        push_name: None,
        key,
        revoked_id: None,
    }
}

/// Marks a fixture message as sent by a sudo user.
pub fn sudo(mut message: NormalizedMessage) -> NormalizedMessage {
    message.sudo = true;
    message
}

// ============================================================================
// RecordingSocket
// ============================================================================

/// A [`WaSocket`] that records every call and never touches the network.
pub struct RecordingSocket {
    self_id: Option<Jid>,
    sent: Mutex<Vec<(Jid, OutgoingMessage)>>,
    read: Mutex<Vec<MessageKey>>,
    presences: Mutex<Vec<(Presence, Option<Jid>)>>,
    rejected: Mutex<Vec<(String, Jid)>>,
    groups: Mutex<HashMap<Jid, GroupMetadata>>,
    fail_sends: bool,
}

impl RecordingSocket {
    /// Creates a socket logged in as [`SELF_JID`].
    pub fn new() -> Self {
        Self::with_self_id(Some(Jid::new(SELF_JID)))
    }

    /// Creates a socket with a custom identity.
    pub fn with_self_id(self_id: Option<Jid>) -> Self {
        Self {
            self_id,
            sent: Mutex::new(Vec::new()),
            read: Mutex::new(Vec::new()),
            presences: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
            groups: Mutex::new(HashMap::new()),
            fail_sends: false,
        }
    }

    /// Makes every `send_message` fail with [`ApiError::NotConnected`].
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Registers group metadata returned by `group_metadata`.
    pub fn with_group(self, id: &str, subject: &str) -> Self {
        let jid = Jid::new(id);
        self.groups.lock().insert(
            jid.clone(),
            GroupMetadata {
                id: jid,
                subject: subject.to_string(),
                desc: None,
                participants: Vec::new(),
            },
        );
        self
    }

    /// Wraps the socket in an `Arc`.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<(Jid, OutgoingMessage)> {
        self.sent.lock().clone()
    }

    /// Texts sent so far, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, m)| m.text.clone()).collect()
    }

    /// Keys marked as read so far.
    pub fn read(&self) -> Vec<MessageKey> {
        self.read.lock().clone()
    }

    /// Presence updates sent so far.
    pub fn presences(&self) -> Vec<(Presence, Option<Jid>)> {
        self.presences.lock().clone()
    }

    /// Rejected calls so far.
    pub fn rejected(&self) -> Vec<(String, Jid)> {
        self.rejected.lock().clone()
    }
}

impl Default for RecordingSocket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WaSocket for RecordingSocket {
    fn self_id(&self) -> Option<Jid> {
        self.self_id.clone()
    }

    async fn send_message(&self, to: &Jid, message: OutgoingMessage) -> ApiResult<MessageKey> {
        if self.fail_sends {
            return Err(ApiError::NotConnected);
        }
        let mut sent = self.sent.lock();
        sent.push((to.clone(), message));
        Ok(MessageKey {
            remote_jid: to.clone(),
            from_me: true,
            id: format!("OUT{}", sent.len()),
            participant: None,
        })
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> ApiResult<()> {
        self.read.lock().extend_from_slice(keys);
        Ok(())
    }

    async fn send_presence_update(&self, presence: Presence, to: Option<&Jid>) -> ApiResult<()> {
        self.presences.lock().push((presence, to.cloned()));
        Ok(())
    }

    async fn reject_call(&self, call_id: &str, from: &Jid) -> ApiResult<()> {
        self.rejected
            .lock()
            .push((call_id.to_string(), from.clone()));
        Ok(())
    }

    async fn group_metadata(&self, group: &Jid) -> ApiResult<GroupMetadata> {
        self.groups
            .lock()
            .get(group)
            .cloned()
            .ok_or_else(|| ApiError::Remote {
                action: "groupMetadata".into(),
                message: format!("unknown group {group}"),
            })
    }
}

// ============================================================================
// StaticPausedChats
// ============================================================================

/// A paused-chat set held in memory, optionally failing every lookup.
#[derive(Default)]
pub struct StaticPausedChats {
    chats: Mutex<Vec<Jid>>,
    broken: bool,
}

impl StaticPausedChats {
    /// Starts with `chats` paused.
    pub fn new<I, S>(chats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Jid>,
    {
        Self {
            chats: Mutex::new(chats.into_iter().map(Into::into).collect()),
            broken: false,
        }
    }

    /// A set whose every operation fails.
    pub fn broken() -> Self {
        Self {
            chats: Mutex::new(Vec::new()),
            broken: true,
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.broken {
            Err(StoreError::Backend("paused chat store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PausedChats for StaticPausedChats {
    async fn paused_chats(&self) -> StoreResult<Vec<Jid>> {
        self.check()?;
        Ok(self.chats.lock().clone())
    }

    async fn pause(&self, chat: &Jid) -> StoreResult<bool> {
        self.check()?;
        let mut chats = self.chats.lock();
        if chats.contains(chat) {
            return Ok(false);
        }
        chats.push(chat.clone());
        Ok(true)
    }

    async fn resume(&self, chat: &Jid) -> StoreResult<bool> {
        self.check()?;
        let mut chats = self.chats.lock();
        let before = chats.len();
        chats.retain(|c| c != chat);
        Ok(chats.len() != before)
    }
}
