//! Kinnect Socket - realtime client for server-pushed events.
//!
//! This crate provides the connection manager for the Kinnect realtime
//! transport:
//! - Connect/disconnect lifecycle keyed on the session bearer token
//! - Automatic reconnection with exponential backoff, jitter, an optional
//!   attempt cap, and explicit cancellation on manual disconnect
//! - A closed, typed set of push events dispatched via tokio broadcast
//!   channels
//! - An outbound fire-and-forget emission queue (join/typing/mark-read/
//!   voice-call signaling)

pub mod events;
pub mod manager;
pub mod outbound;

// Re-export key types
pub use events::{
    ChatUpdatedPayload, ConnectionState, EventDispatcher, MatchesPayload,
    MessageDeletedPayload, MessageDeliveredPayload, MessageEditedPayload, MessageReadPayload,
    PushEvent, PushEventType, TypingUpdatePayload, UnreadCountEntry, UserStatusPayload,
};
pub use manager::{ConnectionManager, ReconnectConfig};
pub use outbound::ClientEvent;
