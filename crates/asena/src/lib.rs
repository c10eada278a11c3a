//! # asena
//!
//! A command dispatch and session-lifecycle shell for WhatsApp bots.
//!
//! The WhatsApp protocol itself lives in a bridge process; asena connects to
//! it over a WebSocket, turns incoming messages into
//! [`NormalizedMessage`](asena_core::NormalizedMessage)s and routes them to an
//! explicit, ordered table of commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  events   ┌────────────┐  message  ┌────────────┐
//! │  Bridge   │──────────▶│  Runtime   │──────────▶│ Dispatcher │──▶ command "ping" (own task)
//! │ Connector │◀──────────│ Supervisor │           │            │──▶ command "menu" (own task)
//! └───────────┘  WaSocket └────────────┘           └────────────┘──▶ ...
//! ```
//!
//! - **Runtime**: connects, reconnects after recoverable closes, exits on logout
//! - **Dispatcher**: pause filter, owner filter, one task per matching command
//! - **Commands**: a trigger (command name, regex or event kind) plus an async handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use asena::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = AsenaRuntime::builder()
//!         .command(on_command("ping").desc("Replies pong").handler(|_ctx| async { "pong" }))
//!         .build()?;
//!
//!     std::process::exit(runtime.run().await?);
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `asena.toml` (default)
//! - `json-log`: JSON log lines

pub use asena_core as core;
pub use asena_framework as framework;
pub use asena_runtime as runtime;
pub use asena_transport as transport;

/// Common imports for writing a bot.
///
/// ```rust,ignore
/// use asena::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use asena_runtime::{AsenaConfig, AsenaRuntime, ConfigLoader};

    // Commands
    pub use asena_framework::builtin::pause_commands;
    pub use asena_framework::prelude::*;
    pub use asena_framework::{HandlerResponse, JoinPolicy};

    // Types handlers work with
    pub use asena_core::{
        Jid, MessageKey, MessageType, NormalizedMessage, OutgoingMessage, Presence, WaSocket,
    };
}
