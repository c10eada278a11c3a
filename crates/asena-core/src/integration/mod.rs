//! Integration layer - seams to the protocol bridge and to persistence.
//!
//! - [`WaSocket`]: outbound operations of a live session
//! - [`Connector`]: opens sessions
//! - [`SessionStore`], [`PausedChats`], [`MessageStore`]: external state

pub mod connector;
pub mod socket;
pub mod store;

pub use connector::{BoxedConnector, ConnectRequest, Connector, Session};
pub use socket::{BoxedSocket, GroupMetadata, GroupParticipant, Presence, WaSocket};
pub use store::{
    BoxedMessageStore, BoxedPausedChats, BoxedSessionStore, MessageStore, PausedChats,
    SessionStore,
};
