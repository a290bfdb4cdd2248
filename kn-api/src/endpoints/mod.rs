//! REST API endpoint implementations.
//!
//! Each module extends `ApiClient` with typed methods for one resource
//! family of the Kinnect backend.

pub mod chats;
pub mod events;
pub mod friends;
pub mod messages;
