//! Foundation layer - identifiers, message records and protocol events.

pub mod event;
pub mod jid;
pub mod message;

pub use event::{
    CallOffer, CallStatus, ConnectionPhase, ConnectionUpdate, DisconnectReason, LastDisconnect,
    MessagesUpsert, ParticipantAction, ParticipantsUpdate, ProtocolEvent, UpsertKind,
};
pub use jid::{GROUP_SERVER, Jid, STATUS_BROADCAST, USER_SERVER};
pub use message::{MessageKey, MessageType, NormalizedMessage, OutgoingMessage};
