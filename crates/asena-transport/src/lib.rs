//! # asena Transport
//!
//! The WebSocket bridge transport: a [`Connector`](asena_core::Connector)
//! for a sidecar process that owns the WhatsApp protocol and exchanges JSON
//! text frames with the shell.
//!
//! ```text
//! ┌─────────────────────┐
//! │  asena-runtime      │  (supervisor, event loop)
//! ├─────────────────────┤
//! │  asena-core         │  (Connector / WaSocket traits)
//! ├─────────────────────┤
//! │  asena-transport    │  <- This crate
//! ├─────────────────────┤
//! │  bridge (ws/wss)    │
//! └─────────────────────┘
//! ```
//!
//! ```rust,ignore
//! use asena_transport::BridgeConnector;
//!
//! let connector = BridgeConnector::new("ws://127.0.0.1:8765")
//!     .with_api_timeout(Duration::from_secs(30));
//! let session = connector.connect(request).await?;
//! ```

pub mod api_caller;
pub mod connector;
pub mod frame;
pub mod socket;

pub use api_caller::{ApiCaller, DEFAULT_API_TIMEOUT};
pub use connector::BridgeConnector;
pub use frame::{BridgeRequest, Inbound, Request, Response, Status};
pub use socket::BridgeSocket;
