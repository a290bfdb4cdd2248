//! Typed event bus for application-level events.
//!
//! Uses tokio broadcast channels to decouple the service layer from its
//! consumers. Any service can emit events without knowing who is
//! listening, and any number of subscribers can independently consume
//! them. The event set is a closed enum, so a consumer matching on a
//! payload shape that does not exist is a compile error.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use kn_models::{ChatMessage, UserSummary};

/// All application-level event types that flow through the event bus.
///
/// These are distinct from raw push events -- they are processed,
/// application-meaningful state changes that UI consumers react to.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A new message arrived in a chat.
    MessageReceived {
        message: ChatMessage,
        chat_id: String,
    },
    /// A message was delivered to its recipient.
    MessageDelivered {
        message_id: String,
        chat_id: String,
        delivered_at: Option<String>,
    },
    /// A message was read by a recipient.
    MessageRead {
        message_id: String,
        chat_id: String,
        read_by: Option<String>,
    },
    /// A message's text was edited by its sender.
    MessageEdited {
        message_id: String,
        chat_id: String,
        new_text: String,
    },
    /// A message was deleted.
    MessageDeleted {
        message_id: String,
        chat_id: String,
        delete_for_everyone: bool,
    },
    /// An outgoing message was confirmed by the server (temporary id
    /// replaced by the server-assigned id).
    MessageSent {
        temp_id: String,
        message_id: String,
        chat_id: String,
    },
    /// An outgoing message send failed permanently.
    MessageFailed {
        temp_id: String,
        chat_id: String,
        error: String,
    },
    /// The set of users typing in a chat changed.
    TypingChanged {
        chat_id: String,
        typing_users: Vec<String>,
    },
    /// A user's online/offline presence changed.
    UserStatusChanged {
        user_id: String,
        is_online: bool,
        last_seen: Option<String>,
    },
    /// Chat metadata changed (unread counts, last activity).
    ChatUpdated {
        chat_id: String,
        unread_count: Option<u32>,
    },
    /// Realtime connection state changed.
    ConnectionStateChanged {
        connected: bool,
        state: String,
    },
    /// Realtime connection hit a transport error. Informational; the
    /// connection manager recovers on its own.
    ConnectionError {
        message: String,
    },
    /// Voice-call signaling received. The payload is opaque to this
    /// layer and handed to the call UI as-is.
    VoiceCallSignal {
        event: String,
        payload: serde_json::Value,
    },
    /// Match recomputation finished for the user.
    MatchesUpdated {
        user_id: String,
        match_count: u32,
        matches: Vec<UserSummary>,
    },
    /// High-affinity matches were found for the user.
    HighMatchesFound {
        user_id: String,
        matches: Vec<UserSummary>,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Designed for fan-out delivery: every subscriber gets every event.
/// Slow subscribers that fall behind will receive a `Lagged` error
/// and may miss events, which is acceptable for UI-driven consumers.
/// Emitting with zero subscribers is not an error.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    ///
    /// A capacity of 256 is recommended. Events beyond this limit will
    /// cause slow subscribers to lag and miss events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Human-readable label for an event (for logging).
fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::MessageReceived { .. } => "MessageReceived",
        AppEvent::MessageDelivered { .. } => "MessageDelivered",
        AppEvent::MessageRead { .. } => "MessageRead",
        AppEvent::MessageEdited { .. } => "MessageEdited",
        AppEvent::MessageDeleted { .. } => "MessageDeleted",
        AppEvent::MessageSent { .. } => "MessageSent",
        AppEvent::MessageFailed { .. } => "MessageFailed",
        AppEvent::TypingChanged { .. } => "TypingChanged",
        AppEvent::UserStatusChanged { .. } => "UserStatusChanged",
        AppEvent::ChatUpdated { .. } => "ChatUpdated",
        AppEvent::ConnectionStateChanged { .. } => "ConnectionStateChanged",
        AppEvent::ConnectionError { .. } => "ConnectionError",
        AppEvent::VoiceCallSignal { .. } => "VoiceCallSignal",
        AppEvent::MatchesUpdated { .. } => "MatchesUpdated",
        AppEvent::HighMatchesFound { .. } => "HighMatchesFound",
    }
}
