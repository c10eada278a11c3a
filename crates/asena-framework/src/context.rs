//! Per-invocation handler context.

use std::sync::Arc;

use asena_core::{
    ApiResult, BoxedSocket, Jid, MessageKey, NormalizedMessage, OutgoingMessage, WaSocket,
};

use crate::trigger::Invocation;

/// Everything a handler sees for one firing.
///
/// The message is shared with every other handler fired for it; the context
/// itself is owned by a single invocation.
pub struct CommandContext {
    command: String,
    message: Arc<NormalizedMessage>,
    socket: BoxedSocket,
    invocation: Invocation,
    prefix: char,
}

impl CommandContext {
    pub fn new(
        command: impl Into<String>,
        message: Arc<NormalizedMessage>,
        socket: BoxedSocket,
        invocation: Invocation,
        prefix: char,
    ) -> Self {
        Self {
            command: command.into(),
            message,
            socket,
            invocation,
            prefix,
        }
    }

    /// Name of the descriptor that fired.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The message that triggered this invocation.
    pub fn message(&self) -> &NormalizedMessage {
        &self.message
    }

    /// Shared handle to the message.
    pub fn message_arc(&self) -> Arc<NormalizedMessage> {
        Arc::clone(&self.message)
    }

    /// The session handle.
    pub fn socket(&self) -> &dyn WaSocket {
        self.socket.as_ref()
    }

    /// Shared session handle, for handlers that spawn work of their own.
    pub fn socket_arc(&self) -> BoxedSocket {
        Arc::clone(&self.socket)
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Body with the matched pattern removed, for pattern invocations.
    pub fn matched(&self) -> Option<&str> {
        match &self.invocation {
            Invocation::Pattern { matched } => Some(matched),
            _ => None,
        }
    }

    /// Id of the deleted message, for delete invocations.
    pub fn revoked_id(&self) -> Option<&str> {
        match &self.invocation {
            Invocation::Delete { revoked_id } => revoked_id.as_deref(),
            _ => None,
        }
    }

    /// The prefix character the sender used, `!` when none matched.
    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub fn chat(&self) -> &Jid {
        &self.message.chat
    }

    pub fn sender(&self) -> &Jid {
        &self.message.sender
    }

    /// Whether the sender may run owner-only commands.
    pub fn is_sudo(&self) -> bool {
        self.message.sudo
    }

    /// Sends `message` to the chat, quoting the triggering message.
    pub async fn reply(&self, message: impl Into<OutgoingMessage>) -> ApiResult<MessageKey> {
        let message = message.into().quoting(self.message.key.clone());
        self.socket.send_message(&self.message.chat, message).await
    }

    /// Sends `message` to the chat without quoting.
    pub async fn send(&self, message: impl Into<OutgoingMessage>) -> ApiResult<MessageKey> {
        self.socket
            .send_message(&self.message.chat, message.into())
            .await
    }

    /// Sends `message` to another chat.
    pub async fn send_to(
        &self,
        to: &Jid,
        message: impl Into<OutgoingMessage>,
    ) -> ApiResult<MessageKey> {
        self.socket.send_message(to, message.into()).await
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("command", &self.command)
            .field("chat", &self.message.chat)
            .field("invocation", &self.invocation)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
