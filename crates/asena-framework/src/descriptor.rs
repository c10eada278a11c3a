//! Command descriptors and their builders.
//!
//! A descriptor is built in two steps. Plugins describe a command with the
//! `on_*` builders and attach a handler, producing a [`Command`]; the
//! registry then resolves it against the configured handler prefix and work
//! type, producing the immutable [`CommandDescriptor`] the dispatcher reads.
//!
//! ```rust,ignore
//! let ping = on_command("ping")
//!     .desc("Measures round trip time")
//!     .category("misc")
//!     .handler(ping_handler);
//! ```

use std::future::Future;
use std::sync::Arc;

use regex::Regex;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service};

use crate::context::CommandContext;
use crate::handler::{BoxedHandlerService, HandlerResponse, handler_fn};
use crate::trigger::{EventKind, Trigger};

// ============================================================================
// CommandDescriptor
// ============================================================================

/// A registered handler with its trigger and metadata.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: String,
    trigger: Trigger,
    owner_only: bool,
    desc: Option<String>,
    category: Option<String>,
    hidden: bool,
    handler: BoxedHandlerService,
}

impl CommandDescriptor {
    /// Creates a descriptor open to every sender.
    pub fn new(name: impl Into<String>, trigger: Trigger, handler: BoxedHandlerService) -> Self {
        Self {
            name: name.into(),
            trigger,
            owner_only: false,
            desc: None,
            category: None,
            hidden: false,
            handler,
        }
    }

    pub fn with_owner_only(mut self, owner_only: bool) -> Self {
        self.owner_only = owner_only;
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Whether only the own account and sudo users may fire it.
    pub fn owner_only(&self) -> bool {
        self.owner_only
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Whether the descriptor is left out of command listings.
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn handler(&self) -> &BoxedHandlerService {
        &self.handler
    }
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("owner_only", &self.owner_only)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Trigger as written by a plugin, before the handler prefix is known.
#[derive(Debug, Clone)]
pub(crate) enum PendingTrigger {
    /// `<handlers>\s*<name>` resolved at registration.
    Command(String),
    /// A complete regex, used as given.
    Regex(Regex),
    Event(EventKind),
}

/// Describes a command before its handler is attached.
#[derive(Debug, Clone)]
#[must_use]
pub struct CommandBuilder {
    name: Option<String>,
    trigger: PendingTrigger,
    owner_only: Option<bool>,
    desc: Option<String>,
    category: Option<String>,
    hidden: bool,
}

impl CommandBuilder {
    fn new(trigger: PendingTrigger) -> Self {
        Self {
            name: None,
            trigger,
            owner_only: None,
            desc: None,
            category: None,
            hidden: false,
        }
    }

    /// Overrides the descriptor name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts the command to the own account and sudo users.
    ///
    /// When never called, the registry's work type decides.
    pub fn owner_only(mut self, owner_only: bool) -> Self {
        self.owner_only = Some(owner_only);
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Leaves the command out of listings.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Attaches an async handler function.
    pub fn handler<F, Fut, R>(self, handler: F) -> Command
    where
        F: Fn(Arc<CommandContext>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: HandlerResponse,
    {
        self.boxed(handler_fn(handler))
    }

    /// Attaches an arbitrary tower service.
    pub fn service<S>(self, service: S) -> Command
    where
        S: Service<Arc<CommandContext>, Response = (), Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.boxed(BoxCloneSyncService::new(service))
    }

    fn boxed(self, handler: BoxedHandlerService) -> Command {
        Command {
            builder: self,
            handler,
        }
    }
}

/// A described command with its handler, ready for registration.
#[derive(Clone)]
pub struct Command {
    builder: CommandBuilder,
    handler: BoxedHandlerService,
}

impl Command {
    /// Name the descriptor will carry.
    pub fn name(&self) -> String {
        if let Some(name) = &self.builder.name {
            return name.clone();
        }
        match &self.builder.trigger {
            PendingTrigger::Command(name) => name.clone(),
            PendingTrigger::Regex(re) => re.as_str().to_string(),
            PendingTrigger::Event(kind) => format!("on:{kind}"),
        }
    }

    pub(crate) fn pending_trigger(&self) -> &PendingTrigger {
        &self.builder.trigger
    }

    /// Resolves into a descriptor.
    pub(crate) fn resolve(self, trigger: Trigger, default_owner_only: bool) -> CommandDescriptor {
        let name = self.name();
        let b = self.builder;
        CommandDescriptor {
            name,
            trigger,
            owner_only: b.owner_only.unwrap_or(default_owner_only),
            desc: b.desc,
            category: b.category,
            hidden: b.hidden,
            handler: self.handler,
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

/// A prefixed command: fires on `<handler prefix><name>` at the start of the
/// body. `name` is a regex fragment, so alternations like `"alive|bot"` work.
pub fn on_command(name: impl Into<String>) -> CommandBuilder {
    CommandBuilder::new(PendingTrigger::Command(name.into()))
}

/// Fires when the body matches `regex`.
pub fn on_pattern(regex: Regex) -> CommandBuilder {
    CommandBuilder::new(PendingTrigger::Regex(regex))
}

/// Fires on a message kind.
pub fn on_event(kind: EventKind) -> CommandBuilder {
    CommandBuilder::new(PendingTrigger::Event(kind))
}

/// Fires on every message with a text body.
pub fn on_text() -> CommandBuilder {
    on_event(EventKind::Text)
}

pub fn on_image() -> CommandBuilder {
    on_event(EventKind::Image)
}

pub fn on_video() -> CommandBuilder {
    on_event(EventKind::Video)
}

pub fn on_sticker() -> CommandBuilder {
    on_event(EventKind::Sticker)
}

/// Fires on revoke notifications.
pub fn on_delete() -> CommandBuilder {
    on_event(EventKind::Delete)
}

/// Fires on every message.
pub fn on_message() -> CommandBuilder {
    on_event(EventKind::Message)
}
