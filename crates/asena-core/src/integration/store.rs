//! Persistence seams.
//!
//! The shell reads and writes three kinds of external state: session
//! credentials, the paused-chat set and the message/chat store. Concrete
//! file and in-memory implementations live in `asena-runtime`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::foundation::Jid;

/// Persists and reloads authentication credentials.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the stored credentials, or `None` for a fresh session.
    async fn load_creds(&self) -> StoreResult<Option<Value>>;

    /// Replaces the stored credentials.
    async fn save_creds(&self, creds: &Value) -> StoreResult<()>;
}

/// The set of chats currently excluded from command dispatch.
#[async_trait]
pub trait PausedChats: Send + Sync {
    /// Lists all paused chats.
    async fn paused_chats(&self) -> StoreResult<Vec<Jid>>;

    /// Whether `chat` is paused.
    async fn is_paused(&self, chat: &Jid) -> StoreResult<bool> {
        Ok(self.paused_chats().await?.iter().any(|c| c == chat))
    }

    /// Pauses `chat`. Returns `false` if it was already paused.
    async fn pause(&self, chat: &Jid) -> StoreResult<bool>;

    /// Resumes `chat`. Returns `false` if it was not paused.
    async fn resume(&self, chat: &Jid) -> StoreResult<bool>;
}

/// Message and chat cache used for resends and name lookups.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Saves a raw message payload sent by `sender`.
    async fn save_message(&self, raw: &Value, sender: &Jid) -> StoreResult<()>;

    /// Loads the raw payload of a previously saved message.
    async fn load_message(&self, id: &str) -> StoreResult<Option<Value>>;

    /// Saves a raw chat update.
    async fn save_chat(&self, chat: &Value) -> StoreResult<()>;

    /// Returns the best known display name of an account or chat.
    async fn name_of(&self, jid: &Jid) -> StoreResult<Option<String>>;
}

/// Shared session store.
pub type BoxedSessionStore = Arc<dyn SessionStore>;

/// Shared paused-chat set.
pub type BoxedPausedChats = Arc<dyn PausedChats>;

/// Shared message store.
pub type BoxedMessageStore = Arc<dyn MessageStore>;
