//! The asena event loop.
//!
//! [`AsenaRuntime`] owns the connector, the stores and the dispatcher. It
//! opens a session, feeds every `connection.update` to the [`Supervisor`],
//! runs the message pipeline for `messages.upsert` and handles the remaining
//! events itself. Events of one session are processed in arrival order.
//!
//! ```rust,ignore
//! use asena_runtime::AsenaRuntime;
//!
//! let runtime = AsenaRuntime::builder()
//!     .command(on_command("ping").handler(|_ctx| async { "pong" }))
//!     .build()?;
//! let exit_code = runtime.run().await?;
//! std::process::exit(exit_code);
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::signal;
use tracing::{debug, error, info, trace, warn};

use asena_core::{
    BoxedConnector, BoxedMessageStore, BoxedPausedChats, BoxedSessionStore, BoxedSocket,
    CallOffer, CallStatus, ConnectRequest, ConnectionPhase, ConnectionUpdate, DisconnectReason,
    LastDisconnect, MessagesUpsert, NormalizedMessage, OutgoingMessage, Presence, ProtocolEvent,
    Session, UpsertKind,
};
use asena_framework::builtin::pause_commands;
use asena_framework::{Command, CommandRegistry, Dispatcher, HandlerPrefix, WorkType};
use asena_transport::BridgeConnector;

use crate::config::{AsenaConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::greetings::Greeter;
use crate::logging;
use crate::normalize::Normalizer;
use crate::store::{FileSessionStore, JsonPausedChats, MemoryMessageStore};
use crate::supervisor::{Supervisor, SupervisorAction};

/// Text of the notice sent to the own chat when a session opens.
pub fn startup_notice(total_plugins: usize, work_type: WorkType) -> String {
    format!(
        "```asena connected\nVersion: {}\nTotal Plugins: {total_plugins}\nWorktype: {work_type}```",
        env!("CARGO_PKG_VERSION"),
    )
}

/// The bot shell runtime.
pub struct AsenaRuntime {
    config: AsenaConfig,
    connector: BoxedConnector,
    session_store: BoxedSessionStore,
    messages: BoxedMessageStore,
    dispatcher: Arc<Dispatcher>,
    normalizer: Normalizer,
    greeter: Greeter,
}

impl AsenaRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &AsenaConfig {
        &self.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        self.dispatcher.registry()
    }

    /// Runs until logout or Ctrl+C/SIGTERM and returns the process exit code.
    pub async fn run(&self) -> RuntimeResult<i32> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until logout or until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<i32>
    where
        F: Future<Output = ()>,
    {
        info!(
            url = %self.config.connection.url,
            commands = self.registry().len(),
            work_type = %self.registry().work_type(),
            "asena runtime starting"
        );
        tokio::select! {
            result = self.supervise() => result,
            () = shutdown => {
                info!("Shutdown requested");
                Ok(0)
            }
        }
    }

    /// Connect, drive, reconnect; returns once the supervisor terminates.
    async fn supervise(&self) -> RuntimeResult<i32> {
        let mut supervisor = Supervisor::from_config(&self.config.connection);

        while supervisor.begin_connect() {
            let request = ConnectRequest {
                creds: self.session_store.load_creds().await?,
                messages: Arc::clone(&self.messages),
            };
            info!(attempt = supervisor.reconnects() + 1, "Connecting to WhatsApp");

            let action = match self.connector.connect(request).await {
                Ok(session) => self.drive(session, &mut supervisor).await,
                Err(e) => supervisor.on_connect_failed(&e),
            };

            match action {
                SupervisorAction::Reconnect { after } => {
                    info!(delay_ms = after.as_millis() as u64, "Reconnecting");
                    tokio::time::sleep(after).await;
                }
                SupervisorAction::Terminate { after, exit_code } => {
                    tokio::time::sleep(after).await;
                    info!(exit_code, "Runtime terminated");
                    return Ok(exit_code);
                }
                SupervisorAction::None | SupervisorAction::AnnounceStartup => {
                    tokio::time::sleep(self.config.connection.reconnect_delay()).await;
                }
            }
        }
        Ok(0)
    }

    /// Processes one session's events until the supervisor asks to reconnect
    /// or terminate.
    async fn drive(&self, session: Session, supervisor: &mut Supervisor) -> SupervisorAction {
        let Session { socket, mut events } = session;

        while let Some(event) = events.recv().await {
            trace!(event = event.name(), "Event received");
            match event {
                ProtocolEvent::ConnectionUpdate(update) => {
                    match supervisor.on_connection_update(&update) {
                        SupervisorAction::AnnounceStartup => self.announce_startup(&socket).await,
                        SupervisorAction::None => {}
                        action => return action,
                    }
                }
                ProtocolEvent::CredsUpdate(creds) => self.save_creds(creds).await,
                ProtocolEvent::MessagesUpsert(upsert) => self.on_upsert(upsert, &socket).await,
                ProtocolEvent::GroupParticipantsUpdate(update) => {
                    if let Err(e) = self.greeter.greet(socket.as_ref(), &update).await {
                        warn!(group = %update.id, error = %e, "Greeting failed");
                    }
                }
                ProtocolEvent::ChatsUpdate(chats) => {
                    for chat in &chats {
                        if let Err(e) = self.messages.save_chat(chat).await {
                            warn!(error = %e, "Failed to save chat update");
                        }
                    }
                }
                ProtocolEvent::Call(offers) => self.on_calls(&offers, &socket).await,
            }
        }

        warn!("Event stream ended without a close update");
        supervisor.on_connection_update(&ConnectionUpdate {
            connection: Some(ConnectionPhase::Close),
            last_disconnect: Some(LastDisconnect {
                status_code: Some(DisconnectReason::ConnectionLost.status_code()),
                message: Some("event stream ended".into()),
            }),
            qr: None,
        })
    }

    async fn announce_startup(&self, socket: &BoxedSocket) {
        if let Err(e) = socket.send_presence_update(Presence::Available, None).await {
            warn!(error = %e, "Failed to announce presence");
        }
        if !self.config.bot.startup_notice {
            return;
        }
        let Some(own) = socket.self_id() else {
            warn!("Own identity unknown, skipping startup notice");
            return;
        };
        let registry = self.registry();
        let notice = startup_notice(registry.len(), registry.work_type());
        if let Err(e) = socket
            .send_message(&own.without_device(), OutgoingMessage::text(notice))
            .await
        {
            warn!(error = %e, "Failed to send startup notice");
        }
    }

    /// Credential updates may be partial; they are merged into what is stored.
    async fn save_creds(&self, update: Value) {
        let merged = match self.session_store.load_creds().await {
            Ok(current) => merge_creds(current, update),
            Err(e) => {
                warn!(error = %e, "Could not read stored credentials, overwriting");
                update
            }
        };
        match self.session_store.save_creds(&merged).await {
            Ok(()) => debug!("Credentials saved"),
            Err(e) => warn!(error = %e, "Failed to save credentials"),
        }
    }

    async fn on_upsert(&self, upsert: MessagesUpsert, socket: &BoxedSocket) {
        if upsert.kind != UpsertKind::Notify {
            trace!(kind = ?upsert.kind, "Ignoring non-notify upsert");
            return;
        }
        let Some(raw) = upsert.messages.first() else {
            return;
        };

        let message = match self.normalizer.normalize(raw, socket.self_id().as_ref()) {
            Ok(Some(message)) => Arc::new(message),
            Ok(None) => {
                debug!("Upsert without message content skipped");
                return;
            }
            Err(e) => {
                debug!(error = %e, "Malformed message skipped");
                return;
            }
        };

        if let Err(e) = self.messages.save_message(raw, &message.sender).await {
            warn!(id = %message.id, error = %e, "Failed to save message");
        }

        let bot = &self.config.bot;
        if bot.auto_read || (bot.auto_read_status && message.chat.is_status_broadcast()) {
            if let Err(e) = socket.read_messages(std::slice::from_ref(&message.key)).await {
                warn!(id = %message.id, error = %e, "Failed to mark message read");
            }
        }

        if bot.log_messages {
            self.log_message(&message, socket).await;
        }

        let outcome = self
            .dispatcher
            .dispatch(Arc::clone(&message), Arc::clone(socket))
            .await;
        trace!(id = %message.id, ?outcome, "Dispatch finished");
    }

    async fn log_message(&self, message: &NormalizedMessage, socket: &BoxedSocket) {
        let chat = if message.is_group() {
            match socket.group_metadata(&message.chat).await {
                Ok(meta) => meta.subject,
                Err(_) => message.chat.to_string(),
            }
        } else {
            message.chat.to_string()
        };
        let from = match self.messages.name_of(&message.sender).await {
            Ok(Some(name)) => name,
            _ => message
                .push_name
                .clone()
                .unwrap_or_else(|| message.sender.to_string()),
        };
        let content = message.body().unwrap_or_else(|| message.kind.wire_name());
        info!(target: "asena::messages", at = %chat, from = %from, "{content}");
    }

    async fn on_calls(&self, offers: &[CallOffer], socket: &BoxedSocket) {
        let bot = &self.config.bot;
        if !bot.reject_calls {
            return;
        }
        for offer in offers.iter().filter(|o| o.status == CallStatus::Offer) {
            if let Err(e) = socket.reject_call(&offer.id, &offer.from).await {
                warn!(call = %offer.id, from = %offer.from, error = %e, "Failed to reject call");
                continue;
            }
            info!(call = %offer.id, from = %offer.from, video = offer.is_video, "Call rejected");

            if let Some(text) = &bot.call_reject_message {
                let to = offer.from.without_device();
                if let Err(e) = socket.send_message(&to, OutgoingMessage::text(text.as_str())).await {
                    warn!(to = %to, error = %e, "Failed to notify rejected caller");
                }
            }
        }
    }
}

/// Shallow-merges an object update into stored credentials.
fn merge_creds(current: Option<Value>, update: Value) -> Value {
    match (current, update) {
        (Some(Value::Object(mut stored)), Value::Object(changes)) => {
            stored.extend(changes);
            Value::Object(stored)
        }
        (_, update) => update,
    }
}

/// Waits for Ctrl+C or SIGTERM. Never completes if no signal can be
/// installed.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c.await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`AsenaRuntime`].
///
/// Unless given explicitly, configuration is loaded through [`ConfigLoader`],
/// the connector is a [`BridgeConnector`] to `connection.url`, and stores are
/// created from the `storage` section. The builtin `pause`/`resume` commands
/// are appended after the user's commands.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<AsenaConfig>,
    connector: Option<BoxedConnector>,
    commands: Vec<Command>,
    session_store: Option<BoxedSessionStore>,
    paused: Option<BoxedPausedChats>,
    messages: Option<BoxedMessageStore>,
    pause_commands: bool,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            connector: None,
            commands: Vec::new(),
            session_store: None,
            paused: None,
            messages: None,
            pause_commands: true,
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Overrides one dotted configuration key after every other source.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Uses `config` as is instead of loading one.
    pub fn config(mut self, config: AsenaConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn connector(mut self, connector: BoxedConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Registers a command. Registration order is dispatch order.
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    pub fn session_store(mut self, store: BoxedSessionStore) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn paused_chats(mut self, store: BoxedPausedChats) -> Self {
        self.paused = Some(store);
        self
    }

    pub fn message_store(mut self, store: BoxedMessageStore) -> Self {
        self.messages = Some(store);
        self
    }

    /// Leaves out the builtin `pause`/`resume` commands.
    pub fn without_pause_commands(mut self) -> Self {
        self.pause_commands = false;
        self
    }

    /// Skips installing the global tracing subscriber.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> RuntimeResult<AsenaRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let bot = &config.bot;
        let storage = &config.storage;
        let connection = &config.connection;

        let connector = self.connector.unwrap_or_else(|| {
            Arc::new(
                BridgeConnector::new(connection.url.as_str())
                    .with_api_timeout(connection.api_timeout())
                    .with_event_buffer(connection.event_buffer),
            )
        });
        let session_store = self
            .session_store
            .unwrap_or_else(|| Arc::new(FileSessionStore::new(storage.session_dir.clone())));
        let paused = self
            .paused
            .unwrap_or_else(|| Arc::new(JsonPausedChats::new(storage.paused_chats_file.clone())));
        let messages = self
            .messages
            .unwrap_or_else(|| Arc::new(MemoryMessageStore::new(storage.message_cache_size)));

        let mut registry = CommandRegistry::builder(HandlerPrefix::new(bot.handlers.as_str())?)
            .work_type(bot.work_type)
            .register_all(self.commands)?;
        if self.pause_commands {
            registry = registry.register_all(pause_commands(Arc::clone(&paused)))?;
        }
        let registry = Arc::new(registry.build());

        if bot.delete_fallthrough {
            warn!("bot.delete_fallthrough is on: delete commands also run for every message");
        }
        if registry.is_empty() {
            return Err(RuntimeError::Missing("commands"));
        }

        let dispatcher = Dispatcher::new(Arc::clone(&registry), paused)
            .with_join_policy(bot.join_policy)
            .with_delete_fallthrough(bot.delete_fallthrough)
            .with_fault_reports(bot.report_faults);

        info!(
            commands = registry.len(),
            work_type = %registry.work_type(),
            handlers = %registry.prefix().as_str(),
            "Runtime built"
        );

        Ok(AsenaRuntime {
            normalizer: Normalizer::new(bot.sudo.iter().cloned()),
            greeter: Greeter::from_config(&config.greetings),
            connector,
            session_store,
            messages,
            dispatcher: Arc::new(dispatcher),
            config,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
