//! Kinnect Models - Domain entities for the chat client.
//!
//! This crate owns the client-side data model: messages with their
//! kind-dependent content and monotonic delivery status, conversation
//! containers with denormalized last-message summaries, friend requests,
//! and user summaries. Nothing here is persisted locally; every entity is
//! parsed from server JSON and held in memory by the service layer.

pub mod chat;
pub mod friend;
pub mod message;
pub mod user;

// Re-export key types
pub use chat::{Chat, ChatType, LastMessageSummary};
pub use friend::{FriendRequest, FriendRequestStatus};
pub use message::{ChatMessage, DeliveryStatus, MessageContent, MessageKind, Reaction};
pub use user::UserSummary;
