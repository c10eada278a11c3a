//! # asena Framework
//!
//! Command registration and message dispatch.
//!
//! - [`descriptor`]: `on_command`, `on_text`, ... builders producing [`Command`]s
//! - [`registry`]: the ordered [`CommandRegistry`] and the [`HandlerPrefix`]
//! - [`trigger`]: how a descriptor decides to fire and what it receives
//! - [`handler`]: handlers as tower services
//! - [`dispatcher`]: pause filter, owner filter and task-per-handler dispatch
//!
//! ```rust,ignore
//! use asena_framework::prelude::*;
//!
//! let registry = CommandRegistry::builder(HandlerPrefix::new("^[.,!]")?)
//!     .register(on_command("ping").handler(|_ctx| async { "pong" }))?
//!     .build();
//! let dispatcher = Dispatcher::new(Arc::new(registry), paused_chats);
//! ```

pub mod builtin;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod registry;
pub mod trigger;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::CommandContext;
pub use descriptor::{
    Command, CommandBuilder, CommandDescriptor, on_command, on_delete, on_event, on_image,
    on_message, on_pattern, on_sticker, on_text, on_video,
};
pub use dispatcher::{DispatchOutcome, Dispatcher, JoinPolicy};
pub use error::{HandlerFault, PatternError, PatternResult};
pub use handler::{BoxedHandlerService, HandlerResponse, HandlerService, handler_fn};
pub use registry::{
    CommandRegistry, DEFAULT_HANDLERS, FALLBACK_PREFIX, HandlerPrefix, RegistryBuilder, WorkType,
};
pub use trigger::{CommandPattern, EventKind, Invocation, Trigger};

pub use tower::BoxError;

/// Common imports for writing commands.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        BoxError, Command, CommandContext, CommandRegistry, Dispatcher, EventKind, HandlerPrefix,
        Invocation, WorkType, on_command, on_delete, on_event, on_image, on_message, on_pattern,
        on_sticker, on_text, on_video,
    };
}
