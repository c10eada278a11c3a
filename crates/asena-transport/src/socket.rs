//! [`WaSocket`] over the bridge.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Value, json};

use asena_core::{
    ApiResult, GroupMetadata, Jid, MessageKey, OutgoingMessage, Presence, WaSocket,
};

use crate::api_caller::ApiCaller;

/// Session handle that turns every operation into a bridge request.
pub struct BridgeSocket {
    caller: Arc<ApiCaller>,
    self_id: RwLock<Option<Jid>>,
}

impl BridgeSocket {
    pub fn new(caller: Arc<ApiCaller>) -> Self {
        Self {
            caller,
            self_id: RwLock::new(None),
        }
    }

    /// Records the own identity from a credentials or login payload
    /// (`{"me": {"id": ...}}`).
    pub fn update_identity(&self, creds: &Value) {
        if let Some(id) = creds.pointer("/me/id").and_then(Value::as_str) {
            *self.self_id.write() = Some(Jid::new(id));
        }
    }

    pub fn caller(&self) -> &Arc<ApiCaller> {
        &self.caller
    }
}

#[async_trait]
impl WaSocket for BridgeSocket {
    fn self_id(&self) -> Option<Jid> {
        self.self_id.read().clone()
    }

    async fn send_message(&self, to: &Jid, message: OutgoingMessage) -> ApiResult<MessageKey> {
        let data = self
            .caller
            .call("sendMessage", json!({ "jid": to, "content": message }))
            .await?;
        let key = data.get("key").cloned().unwrap_or(data);
        Ok(serde_json::from_value(key)?)
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> ApiResult<()> {
        self.caller
            .call("readMessages", json!({ "keys": keys }))
            .await?;
        Ok(())
    }

    async fn send_presence_update(&self, presence: Presence, to: Option<&Jid>) -> ApiResult<()> {
        self.caller
            .call(
                "sendPresenceUpdate",
                json!({ "presence": presence, "jid": to }),
            )
            .await?;
        Ok(())
    }

    async fn reject_call(&self, call_id: &str, from: &Jid) -> ApiResult<()> {
        self.caller
            .call("rejectCall", json!({ "callId": call_id, "from": from }))
            .await?;
        Ok(())
    }

    async fn group_metadata(&self, group: &Jid) -> ApiResult<GroupMetadata> {
        let data = self
            .caller
            .call("groupMetadata", json!({ "jid": group }))
            .await?;
        Ok(serde_json::from_value(data)?)
    }
}
