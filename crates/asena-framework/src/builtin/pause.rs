//! `pause` / `resume`: owner-only commands toggling command dispatch for the
//! current chat.
//!
//! `resume` reaches its handler in a paused chat because the dispatcher lets
//! resume commands through the pause filter.

use std::sync::Arc;

use tower::BoxError;
use tracing::info;

use asena_core::BoxedPausedChats;

use crate::context::CommandContext;
use crate::descriptor::{Command, on_command};

/// Builds the pause and resume commands backed by `store`.
pub fn pause_commands(store: BoxedPausedChats) -> Vec<Command> {
    let pause_store = Arc::clone(&store);
    let pause = on_command("pause")
        .owner_only(true)
        .category("user")
        .desc("Stops answering commands in this chat")
        .handler(move |ctx: Arc<CommandContext>| {
            let store = Arc::clone(&pause_store);
            async move {
                let reply = if store.pause(ctx.chat()).await? {
                    info!(chat = %ctx.chat(), "Chat paused");
                    "Chat paused"
                } else {
                    "Chat is already paused"
                };
                Ok::<_, BoxError>(reply)
            }
        });

    let resume = on_command("resume")
        .owner_only(true)
        .category("user")
        .desc("Resumes answering commands in this chat")
        .handler(move |ctx: Arc<CommandContext>| {
            let store = Arc::clone(&store);
            async move {
                let reply = if store.resume(ctx.chat()).await? {
                    info!(chat = %ctx.chat(), "Chat resumed");
                    "Chat resumed"
                } else {
                    "Chat is not paused"
                };
                Ok::<_, BoxError>(reply)
            }
        });

    vec![pause, resume]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{DispatchOutcome, Dispatcher, JoinPolicy};
    use crate::registry::{CommandRegistry, DEFAULT_HANDLERS, HandlerPrefix};
    use crate::testing::{RecordingSocket, StaticPausedChats, message, sudo};

    #[tokio::test]
    async fn test_pause_then_resume() {
        let paused: BoxedPausedChats = Arc::new(StaticPausedChats::default());
        let registry = CommandRegistry::builder(HandlerPrefix::new(DEFAULT_HANDLERS).unwrap())
            .register_all(pause_commands(Arc::clone(&paused)))
            .unwrap()
            .register(on_command("ping").handler(|_| async { "pong" }))
            .unwrap()
            .build();
        let d = Dispatcher::new(Arc::new(registry), Arc::clone(&paused))
            .with_join_policy(JoinPolicy::Joined);
        let socket = RecordingSocket::new().shared();
        let chat = "777@g.us";

        d.dispatch(Arc::new(sudo(message(chat, ".pause"))), socket.clone())
            .await;
        assert!(paused.is_paused(&chat.into()).await.unwrap());

        let outcome = d
            .dispatch(Arc::new(message(chat, ".ping")), socket.clone())
            .await;
        assert_eq!(outcome, DispatchOutcome::Paused);

        d.dispatch(Arc::new(sudo(message(chat, ".resume"))), socket.clone())
            .await;
        assert!(!paused.is_paused(&chat.into()).await.unwrap());

        d.dispatch(Arc::new(message(chat, ".ping")), socket.clone())
            .await;
        assert_eq!(
            socket.sent_texts(),
            ["Chat paused", "Chat resumed", "pong"]
        );
    }
}
