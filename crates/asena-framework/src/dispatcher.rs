//! The dispatch controller.
//!
//! For every normalized message the dispatcher:
//!
//! 1. drops it when its chat is paused, unless it is a resume command;
//! 2. derives the prefix character the sender used;
//! 3. walks the registry in order, skipping owner-only descriptors for
//!    non-sudo senders, and spawns one task per firing invocation.
//!
//! Handler tasks run concurrently and independently; a failing or panicking
//! handler never affects its siblings or the event loop. Faults are logged
//! and, when enabled, reported to the bot's own chat.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower::{BoxError, ServiceExt};
use tracing::{Instrument, debug, debug_span, error, warn};

use asena_core::{BoxedPausedChats, BoxedSocket, Jid, NormalizedMessage};

use crate::context::CommandContext;
use crate::error::HandlerFault;
use crate::registry::CommandRegistry;

/// Whether `dispatch` waits for the handler tasks it spawned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Return right after spawning; a reaper task collects faults.
    #[default]
    Detached,
    /// Await every handler before returning.
    Joined,
}

/// What `dispatch` did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The chat is paused and the message was not a resume command.
    Paused,
    /// Handlers were spawned. `faults` is only populated under
    /// [`JoinPolicy::Joined`].
    Dispatched {
        spawned: usize,
        faults: Vec<HandlerFault>,
    },
}

impl DispatchOutcome {
    /// Number of handler tasks spawned.
    pub fn spawned(&self) -> usize {
        match self {
            Self::Paused => 0,
            Self::Dispatched { spawned, .. } => *spawned,
        }
    }
}

/// Routes normalized messages to command handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    paused: BoxedPausedChats,
    join_policy: JoinPolicy,
    delete_fallthrough: bool,
    report_faults: bool,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, paused: BoxedPausedChats) -> Self {
        Self {
            registry,
            paused,
            join_policy: JoinPolicy::default(),
            delete_fallthrough: false,
            report_faults: true,
        }
    }

    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.join_policy = policy;
        self
    }

    /// Lets delete triggers also fire for every message.
    pub fn with_delete_fallthrough(mut self, enabled: bool) -> Self {
        self.delete_fallthrough = enabled;
        self
    }

    /// Whether fault texts are sent to the bot's own chat.
    pub fn with_fault_reports(mut self, enabled: bool) -> Self {
        self.report_faults = enabled;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Dispatches one message.
    pub async fn dispatch(
        &self,
        message: Arc<NormalizedMessage>,
        socket: BoxedSocket,
    ) -> DispatchOutcome {
        let span = debug_span!("dispatch", chat = %message.chat, id = %message.id);
        self.dispatch_inner(message, socket).instrument(span).await
    }

    async fn dispatch_inner(
        &self,
        message: Arc<NormalizedMessage>,
        socket: BoxedSocket,
    ) -> DispatchOutcome {
        let prefix = self.registry.prefix();
        let body = message.body();

        if !prefix.is_resume(body) {
            match self.paused.is_paused(&message.chat).await {
                Ok(true) => {
                    debug!("Chat is paused, skipping message");
                    return DispatchOutcome::Paused;
                }
                Ok(false) => {}
                Err(e) => warn!("Paused chat lookup failed, dispatching anyway: {e}"),
            }
        }

        let prefix_char = prefix.prefix_of(body);
        let mut tasks: Vec<(String, JoinHandle<Result<(), BoxError>>)> = Vec::new();

        for descriptor in self.registry.iter() {
            if descriptor.owner_only() && !message.sudo {
                continue;
            }
            for invocation in descriptor
                .trigger()
                .invocations(&message, self.delete_fallthrough)
            {
                debug!(command = %descriptor.name(), "Firing handler");
                let ctx = Arc::new(CommandContext::new(
                    descriptor.name(),
                    Arc::clone(&message),
                    Arc::clone(&socket),
                    invocation,
                    prefix_char,
                ));
                let handler = descriptor.handler().clone();
                tasks.push((
                    descriptor.name().to_string(),
                    tokio::spawn(handler.oneshot(ctx)),
                ));
            }
        }

        let spawned = tasks.len();
        if spawned == 0 {
            return DispatchOutcome::Dispatched {
                spawned,
                faults: Vec::new(),
            };
        }

        let chat = message.chat.clone();
        let report = self.report_faults;
        match self.join_policy {
            JoinPolicy::Joined => {
                let faults = reap(tasks, socket, chat, report).await;
                DispatchOutcome::Dispatched { spawned, faults }
            }
            JoinPolicy::Detached => {
                tokio::spawn(reap(tasks, socket, chat, report).in_current_span());
                DispatchOutcome::Dispatched {
                    spawned,
                    faults: Vec::new(),
                }
            }
        }
    }
}

/// Awaits handler tasks and reports their faults.
async fn reap(
    tasks: Vec<(String, JoinHandle<Result<(), BoxError>>)>,
    socket: BoxedSocket,
    chat: Jid,
    report: bool,
) -> Vec<HandlerFault> {
    let mut faults = Vec::new();
    for (command, task) in tasks {
        let fault = match task.await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => HandlerFault {
                command,
                message: e.to_string(),
                panicked: false,
            },
            Err(e) if e.is_panic() => HandlerFault {
                command,
                message: panic_message(e.into_panic()),
                panicked: true,
            },
            Err(_) => continue,
        };
        error!(
            command = %fault.command,
            chat = %chat,
            panicked = fault.panicked,
            "Handler failed: {}", fault.message
        );
        if report {
            report_fault(&socket, &fault).await;
        }
        faults.push(fault);
    }
    faults
}

/// Sends the fault text to the bot's own chat.
async fn report_fault(socket: &BoxedSocket, fault: &HandlerFault) {
    let Some(own) = socket.self_id() else {
        return;
    };
    if let Err(e) = socket
        .send_message(&own.without_device(), fault.to_string().into())
        .await
    {
        warn!("Failed to report handler fault: {e}");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use asena_core::MessageType;

    use super::*;
    use crate::descriptor::{on_command, on_delete, on_message, on_pattern, on_text};
    use crate::registry::{DEFAULT_HANDLERS, HandlerPrefix};
    use crate::testing::{RecordingSocket, SELF_JID, StaticPausedChats, message, sudo};
    use regex::Regex;

    fn builder() -> crate::registry::RegistryBuilder {
        CommandRegistry::builder(HandlerPrefix::new(DEFAULT_HANDLERS).unwrap())
    }

    fn dispatcher(registry: CommandRegistry, paused: StaticPausedChats) -> Dispatcher {
        Dispatcher::new(Arc::new(registry), Arc::new(paused)).with_join_policy(JoinPolicy::Joined)
    }

    #[tokio::test]
    async fn test_ping_fires_with_empty_match() {
        let registry = builder()
            .register(
                on_pattern(Regex::new("^!ping").unwrap())
                    .name("ping")
                    .handler(|ctx: Arc<CommandContext>| async move {
                        format!("match=[{}] prefix={}", ctx.matched().unwrap(), ctx.prefix())
                    }),
            )
            .unwrap()
            .build();
        let socket = RecordingSocket::new().shared();
        let d = dispatcher(registry, StaticPausedChats::default());

        let outcome = d
            .dispatch(Arc::new(message("123@s.whatsapp.net", "!ping")), socket.clone())
            .await;

        assert_eq!(outcome.spawned(), 1);
        assert_eq!(socket.sent_texts(), ["match=[] prefix=!"]);
    }

    #[tokio::test]
    async fn test_paused_chat_only_allows_resume() {
        let registry = builder()
            .register(on_command("ping").handler(|_| async { "pong" }))
            .unwrap()
            .register(on_command("resume").handler(|_| async { "resumed" }))
            .unwrap()
            .build();
        let socket = RecordingSocket::new().shared();
        let d = dispatcher(registry, StaticPausedChats::new(["123@g.us"]));

        let outcome = d
            .dispatch(Arc::new(message("123@g.us", "!ping")), socket.clone())
            .await;
        assert_eq!(outcome, DispatchOutcome::Paused);
        assert!(socket.sent().is_empty());

        let outcome = d
            .dispatch(Arc::new(message("123@g.us", "!resume")), socket.clone())
            .await;
        assert_eq!(outcome.spawned(), 1);
        assert_eq!(socket.sent_texts(), ["resumed"]);
    }

    #[tokio::test]
    async fn test_paused_lookup_failure_dispatches() {
        let registry = builder()
            .register(on_command("ping").handler(|_| async { "pong" }))
            .unwrap()
            .build();
        let socket = RecordingSocket::new().shared();
        let d = dispatcher(registry, StaticPausedChats::broken());

        d.dispatch(Arc::new(message("123@g.us", "!ping")), socket.clone())
            .await;
        assert_eq!(socket.sent_texts(), ["pong"]);
    }

    #[tokio::test]
    async fn test_owner_only_requires_sudo() {
        let registry = builder()
            .register(
                on_command("restart")
                    .owner_only(true)
                    .handler(|_| async { "ok" }),
            )
            .unwrap()
            .build();
        let socket = RecordingSocket::new().shared();
        let d = dispatcher(registry, StaticPausedChats::default());

        let outcome = d
            .dispatch(Arc::new(message("42@s.whatsapp.net", ".restart")), socket.clone())
            .await;
        assert_eq!(outcome.spawned(), 0);

        let outcome = d
            .dispatch(
                Arc::new(sudo(message("42@s.whatsapp.net", ".restart"))),
                socket.clone(),
            )
            .await;
        assert_eq!(outcome.spawned(), 1);
        assert_eq!(socket.sent_texts(), ["ok"]);
    }

    #[tokio::test]
    async fn test_every_matching_descriptor_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = |hits: Arc<AtomicUsize>| {
            move |_ctx: Arc<CommandContext>| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            }
        };
        let registry = builder()
            .register(on_command("ping").handler(counter(hits.clone())))
            .unwrap()
            .register(on_text().handler(counter(hits.clone())))
            .unwrap()
            .register(on_message().handler(counter(hits.clone())))
            .unwrap()
            .register(on_delete().handler(counter(hits.clone())))
            .unwrap()
            .build();
        let d = dispatcher(registry, StaticPausedChats::default());

        let outcome = d
            .dispatch(
                Arc::new(message("1@s.whatsapp.net", "!ping")),
                RecordingSocket::new().shared(),
            )
            .await;
        assert_eq!(outcome.spawned(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_delete_fallthrough_adds_invocation() {
        let registry = builder()
            .register(on_delete().handler(|_| async {}))
            .unwrap()
            .build();
        let d = dispatcher(registry, StaticPausedChats::default()).with_delete_fallthrough(true);

        let outcome = d
            .dispatch(
                Arc::new(message("1@s.whatsapp.net", "hello")),
                RecordingSocket::new().shared(),
            )
            .await;
        assert_eq!(outcome.spawned(), 1);
    }

    #[tokio::test]
    async fn test_faults_are_isolated_and_reported() {
        let registry = builder()
            .register(
                on_command("boom").handler(|_| async { Err::<(), _>("exploded") }),
            )
            .unwrap()
            .register(on_command("boom").name("panics").handler::<_, _, ()>(|_| async {
                panic!("kaboom");
            }))
            .unwrap()
            .register(on_command("boom").name("fine").handler(|_| async { "still here" }))
            .unwrap()
            .build();
        let socket = RecordingSocket::new().shared();
        let d = dispatcher(registry, StaticPausedChats::default());

        let outcome = d
            .dispatch(Arc::new(message("1@s.whatsapp.net", "!boom")), socket.clone())
            .await;

        let DispatchOutcome::Dispatched { spawned, faults } = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(spawned, 3);
        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].message, "exploded");
        assert!(faults[1].panicked);
        assert_eq!(faults[1].message, "kaboom");

        let sent = socket.sent();
        assert!(sent.iter().any(|(_, m)| m.text == "still here"));
        let reports: Vec<_> = sent
            .iter()
            .filter(|(to, _)| to.as_str() == SELF_JID)
            .map(|(_, m)| m.text.clone())
            .collect();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].contains("exploded"));
    }

    #[tokio::test]
    async fn test_detached_returns_before_handlers_finish() {
        let registry = builder()
            .register(on_command("slow").handler(|_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                "done"
            }))
            .unwrap()
            .build();
        let socket = RecordingSocket::new().shared();
        let d = Dispatcher::new(Arc::new(registry), Arc::new(StaticPausedChats::default()));

        let outcome = d
            .dispatch(Arc::new(message("1@s.whatsapp.net", "!slow")), socket.clone())
            .await;
        assert_eq!(outcome.spawned(), 1);
        assert!(socket.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(socket.sent_texts(), ["done"]);
    }

    #[tokio::test]
    async fn test_delete_fallthrough_on_revoke_spawns_two_tasks() {
        let registry = builder()
            .register(on_delete().handler(|_| async {}))
            .unwrap()
            .build();
        let d = dispatcher(registry, StaticPausedChats::default()).with_delete_fallthrough(true);
        let mut revoke = message("1@s.whatsapp.net", "");
        revoke.body = None;
        revoke.kind = MessageType::Protocol;
        revoke.revoked_id = Some("GONE".into());

        let outcome = d
            .dispatch(Arc::new(revoke), RecordingSocket::new().shared())
            .await;
        assert_eq!(outcome.spawned(), 2);
    }

    #[tokio::test]
    async fn test_detached_faults_are_reported_by_reaper() {
        let registry = builder()
            .register(on_command("boom").handler(|_| async { Err::<(), _>("exploded") }))
            .unwrap()
            .register(on_command("boom").name("panics").handler::<_, _, ()>(|_| async {
                panic!("kaboom");
            }))
            .unwrap()
            .build();
        let socket = RecordingSocket::new().shared();
        let d = Dispatcher::new(Arc::new(registry), Arc::new(StaticPausedChats::default()));

        let outcome = d
            .dispatch(Arc::new(message("1@s.whatsapp.net", "!boom")), socket.clone())
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                spawned: 2,
                faults: Vec::new()
            }
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        let reports: Vec<_> = socket
            .sent()
            .into_iter()
            .filter(|(to, _)| to.as_str() == SELF_JID)
            .map(|(_, m)| m.text)
            .collect();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().any(|r| r.contains("exploded")));
        assert!(reports.iter().any(|r| r.contains("kaboom")));
    }
}
