//! asena Runtime - orchestration layer for the asena bot shell.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `AsenaConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - Session, paused-chat and message stores
//! - The message normalizer and the connection supervisor
//! - The event loop (`AsenaRuntime`)
//!
//! ```ignore
//! use asena_runtime::AsenaRuntime;
//! use asena_framework::on_command;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = AsenaRuntime::builder()
//!         .command(on_command("ping").handler(|_ctx| async { "pong" }))
//!         .build()?;
//!
//!     // Runs until logout or Ctrl+C
//!     let code = runtime.run().await?;
//!     std::process::exit(code);
//! }
//! ```

pub mod config;
pub mod error;
pub mod greetings;
pub mod logging;
pub mod normalize;
pub mod runtime;
pub mod store;
pub mod supervisor;

// Re-exports
pub use config::{AsenaConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{RuntimeError, RuntimeResult};
pub use greetings::Greeter;
pub use logging::{LoggingBuilder, SpanEvents};
pub use normalize::Normalizer;
pub use runtime::{AsenaRuntime, RuntimeBuilder, startup_notice};
pub use store::{
    FileSessionStore, JsonPausedChats, MemoryMessageStore, MemoryPausedChats, MemorySessionStore,
};
pub use supervisor::{Supervisor, SupervisorAction, SupervisorState};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for bots built on the runtime.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
