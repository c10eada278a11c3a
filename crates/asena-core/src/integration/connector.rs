//! Session establishment.
//!
//! A [`Connector`] opens one transport session per call. It does not retry:
//! reconnect decisions belong to the connection supervisor in the runtime,
//! which calls [`Connector::connect`] again when a recoverable close arrives.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::socket::BoxedSocket;
use super::store::BoxedMessageStore;
use crate::error::TransportResult;
use crate::foundation::ProtocolEvent;

/// Inputs for opening a session.
#[derive(Clone)]
pub struct ConnectRequest {
    /// Stored credentials, `None` to pair a new device.
    pub creds: Option<Value>,
    /// Store consulted when the protocol side asks for a message to resend.
    pub messages: BoxedMessageStore,
}

/// A live session: the outbound handle plus the inbound event stream.
///
/// The stream ends after the transport has delivered its final
/// `connection.update` close.
pub struct Session {
    /// Outbound API handle.
    pub socket: BoxedSocket,
    /// Inbound events in arrival order.
    pub events: mpsc::Receiver<ProtocolEvent>,
}

/// Opens transport sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a session and completes the login handshake.
    async fn connect(&self, request: ConnectRequest) -> TransportResult<Session>;
}

/// Shared connector.
pub type BoxedConnector = Arc<dyn Connector>;
