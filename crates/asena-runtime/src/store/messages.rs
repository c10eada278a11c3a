//! In-memory message and chat cache.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use asena_core::{Jid, MessageStore, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    order: VecDeque<String>,
    messages: HashMap<String, Value>,
    chat_names: HashMap<Jid, String>,
    push_order: VecDeque<Jid>,
    push_names: HashMap<Jid, String>,
}

/// Bounded message cache plus a chat/account name map.
///
/// Once `capacity` messages are held, saving another evicts the oldest.
/// Names come from `chats.update` payloads (`name`, then `subject`) and from
/// the push names senders announce; chat updates win over push names. The
/// latest push name per sender is kept, for at most `capacity` senders.
#[derive(Debug)]
pub struct MemoryMessageStore {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl MemoryMessageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save_message(&self, raw: &Value, sender: &Jid) -> StoreResult<()> {
        let Some(id) = str_at(raw, "/key/id") else {
            trace!("Message without key.id not cached");
            return Ok(());
        };

        let mut inner = self.inner.write();
        if inner.messages.insert(id.to_string(), raw.clone()).is_none() {
            inner.order.push_back(id.to_string());
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.messages.remove(&oldest);
            }
        }

        if let Some(push_name) = str_at(raw, "/pushName") {
            let sender = sender.without_device();
            if inner
                .push_names
                .insert(sender.clone(), push_name.to_string())
                .is_none()
            {
                inner.push_order.push_back(sender);
            }
            while inner.push_order.len() > self.capacity {
                if let Some(oldest) = inner.push_order.pop_front() {
                    inner.push_names.remove(&oldest);
                }
            }
        }
        Ok(())
    }

    async fn load_message(&self, id: &str) -> StoreResult<Option<Value>> {
        Ok(self.inner.read().messages.get(id).cloned())
    }

    async fn save_chat(&self, chat: &Value) -> StoreResult<()> {
        let Some(id) = str_at(chat, "/id") else {
            return Ok(());
        };
        if let Some(name) = str_at(chat, "/name").or_else(|| str_at(chat, "/subject")) {
            self.inner
                .write()
                .chat_names
                .insert(Jid::new(id).without_device(), name.to_string());
        }
        Ok(())
    }

    async fn name_of(&self, jid: &Jid) -> StoreResult<Option<String>> {
        let jid = jid.without_device();
        let inner = self.inner.read();
        Ok(inner
            .chat_names
            .get(&jid)
            .or_else(|| inner.push_names.get(&jid))
            .cloned())
    }
}
