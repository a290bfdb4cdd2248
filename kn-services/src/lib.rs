//! Kinnect Services - Business logic and service layer.
//!
//! This crate provides the service trait, service registry for dependency
//! injection, and all concrete service implementations covering:
//! - Event bus (typed application events, fan-out delivery)
//! - Push-event routing (typed dispatch from the realtime transport)
//! - Chat operations (list, direct-chat creation, read receipts, typing,
//!   voice-call signaling senders)
//! - Message handling (optimistic send, media upload, edit, delete,
//!   REST/push reconciliation)
//! - Friend requests (send, accept, reject, cancel, list)
//! - Session binding (token installation, connect/disconnect)

pub mod service;
pub mod registry;
pub mod event_bus;
pub mod dispatcher;
pub mod outbox;
pub mod chat;
pub mod message;
pub mod friend;
pub mod session;

// Re-export key types
pub use service::{Service, ServiceState, StateCell};
pub use registry::ServiceRegistry;
pub use event_bus::{AppEvent, EventBus};
pub use dispatcher::EventRouter;
pub use outbox::MessageOutbox;
pub use chat::ChatService;
pub use message::MessageService;
pub use friend::FriendService;
pub use session::SessionService;
