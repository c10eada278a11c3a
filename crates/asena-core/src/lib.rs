//! # asena Core
//!
//! Foundation types shared by every asena crate.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Identifiers**: [`Jid`] for chats and accounts
//! - **Messages**: [`NormalizedMessage`], [`MessageType`], [`OutgoingMessage`]
//! - **Events**: [`ProtocolEvent`] and its payloads, [`DisconnectReason`]
//!
//! ### Integration Layer
//!
//! - **Session API**: [`WaSocket`], the outbound calls handlers make
//! - **Transport**: [`Connector`] opens a [`Session`]
//! - **Persistence**: [`SessionStore`], [`PausedChats`], [`MessageStore`]
//!
//! ```text
//! ┌────────────┐  ProtocolEvent  ┌─────────┐  NormalizedMessage  ┌────────────┐
//! │ Connector  │────────────────▶│ Runtime │────────────────────▶│ Dispatcher │
//! │  (bridge)  │◀────────────────│         │◀────────────────────│  handlers  │
//! └────────────┘    WaSocket     └─────────┘      WaSocket       └────────────┘
//! ```

pub mod error;
pub mod foundation;
pub mod integration;

pub use error::{
    ApiError, ApiResult, NormalizeError, StoreError, StoreResult, TransportError,
    TransportResult,
};

pub use foundation::{
    CallOffer, CallStatus, ConnectionPhase, ConnectionUpdate, DisconnectReason, GROUP_SERVER, Jid,
    LastDisconnect, MessageKey, MessageType, MessagesUpsert, NormalizedMessage, OutgoingMessage,
    ParticipantAction, ParticipantsUpdate, ProtocolEvent, STATUS_BROADCAST, USER_SERVER,
    UpsertKind,
};

pub use integration::{
    BoxedConnector, BoxedMessageStore, BoxedPausedChats, BoxedSessionStore, BoxedSocket,
    ConnectRequest, Connector, GroupMetadata, GroupParticipant, MessageStore, PausedChats,
    Presence, Session, SessionStore, WaSocket,
};
