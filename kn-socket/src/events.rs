//! Push event types and event dispatcher.
//!
//! Defines the closed set of server-pushed event types and a
//! broadcast-based dispatcher for decoupled fan-out to consumers. The
//! event set is a tagged enum rather than bare strings so a consumer
//! matching on the wrong payload shape is a compile error, not a runtime
//! surprise.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use kn_models::UserSummary;

/// All push event types emitted by the Kinnect server.
///
/// These map 1:1 to the server's realtime event names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushEventType {
    /// A new message arrived in a chat (`new_message`).
    NewMessage,
    /// A message was delivered to its recipient (`message_delivered`).
    MessageDelivered,
    /// A message was read by a recipient (`message_read`).
    MessageRead,
    /// A message's text was edited by its sender (`message_edited`).
    MessageEdited,
    /// A message was deleted (`message_deleted`).
    MessageDeleted,
    /// The set of users typing in a chat changed (`typing_update`).
    TypingUpdate,
    /// A user's online/offline presence changed (`user_status_update`).
    UserStatusUpdate,
    /// Chat metadata changed: unread counts, last activity (`chat_updated`).
    ChatUpdated,
    /// Incoming voice call offer (`voice_call_offer`).
    VoiceCallOffer,
    /// Voice call answer from the callee (`voice_call_answer`).
    VoiceCallAnswer,
    /// Voice call ended (`voice_call_end`).
    VoiceCallEnd,
    /// WebRTC ICE candidate exchange (`ice_candidate`).
    IceCandidate,
    /// Match recomputation finished for the user (`matches_updated`).
    MatchesUpdated,
    /// High-affinity matches were found for the user (`high_matches_found`).
    HighMatchesFound,
    /// Unknown/unhandled event type.
    Unknown(String),
}

impl PushEventType {
    /// Parse an event type string from the server.
    pub fn from_str(s: &str) -> Self {
        match s {
            "new_message" => Self::NewMessage,
            "message_delivered" => Self::MessageDelivered,
            "message_read" => Self::MessageRead,
            "message_edited" => Self::MessageEdited,
            "message_deleted" => Self::MessageDeleted,
            "typing_update" => Self::TypingUpdate,
            "user_status_update" => Self::UserStatusUpdate,
            "chat_updated" => Self::ChatUpdated,
            "voice_call_offer" => Self::VoiceCallOffer,
            "voice_call_answer" => Self::VoiceCallAnswer,
            "voice_call_end" => Self::VoiceCallEnd,
            "ice_candidate" => Self::IceCandidate,
            "matches_updated" => Self::MatchesUpdated,
            "high_matches_found" => Self::HighMatchesFound,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Convert to the server event string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewMessage => "new_message",
            Self::MessageDelivered => "message_delivered",
            Self::MessageRead => "message_read",
            Self::MessageEdited => "message_edited",
            Self::MessageDeleted => "message_deleted",
            Self::TypingUpdate => "typing_update",
            Self::UserStatusUpdate => "user_status_update",
            Self::ChatUpdated => "chat_updated",
            Self::VoiceCallOffer => "voice_call_offer",
            Self::VoiceCallAnswer => "voice_call_answer",
            Self::VoiceCallEnd => "voice_call_end",
            Self::IceCandidate => "ice_candidate",
            Self::MatchesUpdated => "matches_updated",
            Self::HighMatchesFound => "high_matches_found",
            Self::Unknown(s) => s.as_str(),
        }
    }

    /// Whether this event type relates to messages.
    pub fn is_message_event(&self) -> bool {
        matches!(
            self,
            Self::NewMessage
                | Self::MessageDelivered
                | Self::MessageRead
                | Self::MessageEdited
                | Self::MessageDeleted
        )
    }

    /// Whether this event type is voice-call signaling.
    ///
    /// Signaling payloads are opaque to this layer and forwarded as-is.
    pub fn is_call_signaling(&self) -> bool {
        matches!(
            self,
            Self::VoiceCallOffer | Self::VoiceCallAnswer | Self::VoiceCallEnd | Self::IceCandidate
        )
    }

    /// Whether this event type relates to match notifications.
    pub fn is_match_event(&self) -> bool {
        matches!(self, Self::MatchesUpdated | Self::HighMatchesFound)
    }

    /// All event type strings the transport should subscribe to.
    pub fn all_event_names() -> &'static [&'static str] {
        &[
            "new_message",
            "message_delivered",
            "message_read",
            "message_edited",
            "message_deleted",
            "typing_update",
            "user_status_update",
            "chat_updated",
            "voice_call_offer",
            "voice_call_answer",
            "voice_call_end",
            "ice_candidate",
            "matches_updated",
            "high_matches_found",
        ]
    }
}

/// Typed payload for `message_delivered` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeliveredPayload {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "deliveredAt", default)]
    pub delivered_at: Option<String>,
}

/// Typed payload for `message_read` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReadPayload {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "readBy", default)]
    pub read_by: Option<String>,
    #[serde(rename = "readAt", default)]
    pub read_at: Option<String>,
}

/// Typed payload for `message_edited` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEditedPayload {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "newText")]
    pub new_text: String,
    #[serde(rename = "editedAt", default)]
    pub edited_at: Option<String>,
}

/// Typed payload for `message_deleted` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeletedPayload {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "deleteForEveryone", default)]
    pub delete_for_everyone: bool,
    #[serde(rename = "deletedBy", default)]
    pub deleted_by: Option<String>,
    #[serde(rename = "deletedAt", default)]
    pub deleted_at: Option<String>,
}

/// Typed payload for `typing_update` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingUpdatePayload {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    /// User ids currently typing in the chat. Empty means nobody.
    #[serde(rename = "typingUsers", default)]
    pub typing_users: Vec<String>,
}

/// Typed payload for `user_status_update` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatusPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    /// "online" or "offline".
    pub status: String,
    #[serde(rename = "lastSeen", default)]
    pub last_seen: Option<String>,
}

impl UserStatusPayload {
    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}

/// Per-user unread count within a `chat_updated` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCountEntry {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "unreadCount")]
    pub unread_count: u32,
}

/// Typed payload for `chat_updated` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUpdatedPayload {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(rename = "unreadCounts", default)]
    pub unread_counts: Vec<UnreadCountEntry>,
}

/// Typed payload for `matches_updated` and `high_matches_found` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesPayload {
    #[serde(rename = "type", default)]
    pub match_type: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "matchCount", default)]
    pub match_count: Option<u32>,
    #[serde(default)]
    pub matches: Vec<UserSummary>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A push event with type and associated data payload.
#[derive(Debug, Clone)]
pub struct PushEvent {
    /// The type of event.
    pub event_type: PushEventType,
    /// The event payload data from the server.
    pub data: serde_json::Value,
}

impl PushEvent {
    fn parse_as<T: serde::de::DeserializeOwned>(&self, expected: PushEventType) -> Option<T> {
        if self.event_type == expected {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }

    /// Try to parse the data as a MessageDeliveredPayload.
    pub fn as_message_delivered(&self) -> Option<MessageDeliveredPayload> {
        self.parse_as(PushEventType::MessageDelivered)
    }

    /// Try to parse the data as a MessageReadPayload.
    pub fn as_message_read(&self) -> Option<MessageReadPayload> {
        self.parse_as(PushEventType::MessageRead)
    }

    /// Try to parse the data as a MessageEditedPayload.
    pub fn as_message_edited(&self) -> Option<MessageEditedPayload> {
        self.parse_as(PushEventType::MessageEdited)
    }

    /// Try to parse the data as a MessageDeletedPayload.
    pub fn as_message_deleted(&self) -> Option<MessageDeletedPayload> {
        self.parse_as(PushEventType::MessageDeleted)
    }

    /// Try to parse the data as a TypingUpdatePayload.
    pub fn as_typing_update(&self) -> Option<TypingUpdatePayload> {
        self.parse_as(PushEventType::TypingUpdate)
    }

    /// Try to parse the data as a UserStatusPayload.
    pub fn as_user_status(&self) -> Option<UserStatusPayload> {
        self.parse_as(PushEventType::UserStatusUpdate)
    }

    /// Try to parse the data as a ChatUpdatedPayload.
    pub fn as_chat_updated(&self) -> Option<ChatUpdatedPayload> {
        self.parse_as(PushEventType::ChatUpdated)
    }

    /// Try to parse the data as a MatchesPayload.
    pub fn as_matches(&self) -> Option<MatchesPayload> {
        if self.event_type.is_match_event() {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }
}

/// Broadcast-based event dispatcher for decoupled event handling.
///
/// Uses tokio::broadcast channels so multiple consumers can independently
/// receive and process events without blocking each other. Emitting with
/// zero subscribers is not an error.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: broadcast::Sender<PushEvent>,
}

impl EventDispatcher {
    /// Create a new EventDispatcher with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive push events.
    ///
    /// Returns a broadcast receiver. Slow consumers that fall behind
    /// will receive a RecvError::Lagged and may miss events.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.sender.subscribe()
    }

    /// Dispatch an event to all active subscribers.
    pub fn dispatch(&self, event: PushEvent) {
        let event_type = event.event_type.as_str().to_string();
        match self.sender.send(event) {
            Ok(count) => {
                debug!("dispatched {event_type} to {count} subscriber(s)");
            }
            Err(_) => {
                // No active receivers -- fine during startup/shutdown
                debug!("no subscribers for event {event_type}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Connection state for the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// Attempting to establish the initial connection.
    Connecting,
    /// Connected and receiving events.
    Connected,
    /// Connection lost, attempting to reconnect.
    Reconnecting,
    /// Reconnection attempts exhausted, will not auto-reconnect.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(
            PushEventType::from_str("new_message"),
            PushEventType::NewMessage
        );
        assert_eq!(
            PushEventType::from_str("message_read"),
            PushEventType::MessageRead
        );
        assert_eq!(
            PushEventType::from_str("high_matches_found"),
            PushEventType::HighMatchesFound
        );
        assert_eq!(
            PushEventType::from_str("mystery_event"),
            PushEventType::Unknown("mystery_event".into())
        );
    }

    #[test]
    fn test_event_type_roundtrip() {
        for name in PushEventType::all_event_names() {
            let parsed = PushEventType::from_str(name);
            assert_eq!(parsed.as_str(), *name);
            assert!(!matches!(parsed, PushEventType::Unknown(_)));
        }
    }

    #[test]
    fn test_event_type_categories() {
        assert!(PushEventType::NewMessage.is_message_event());
        assert!(PushEventType::MessageRead.is_message_event());
        assert!(!PushEventType::TypingUpdate.is_message_event());

        assert!(PushEventType::VoiceCallOffer.is_call_signaling());
        assert!(PushEventType::IceCandidate.is_call_signaling());
        assert!(!PushEventType::NewMessage.is_call_signaling());

        assert!(PushEventType::MatchesUpdated.is_match_event());
        assert!(PushEventType::HighMatchesFound.is_match_event());
    }

    #[tokio::test]
    async fn test_event_dispatcher() {
        let dispatcher = EventDispatcher::new(16);
        let mut rx = dispatcher.subscribe();

        dispatcher.dispatch(PushEvent {
            event_type: PushEventType::NewMessage,
            data: serde_json::json!({"message": {"id": "m1"}}),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, PushEventType::NewMessage);
    }

    #[test]
    fn test_dispatch_without_subscribers_is_fine() {
        let dispatcher = EventDispatcher::new(16);
        dispatcher.dispatch(PushEvent {
            event_type: PushEventType::TypingUpdate,
            data: serde_json::json!({}),
        });
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[test]
    fn test_typed_payload_access() {
        let event = PushEvent {
            event_type: PushEventType::MessageRead,
            data: serde_json::json!({
                "messageId": "m1",
                "chatId": "c1",
                "readBy": "u2",
                "readAt": "2026-02-01T10:00:00Z"
            }),
        };
        let payload = event.as_message_read().unwrap();
        assert_eq!(payload.message_id, "m1");
        assert_eq!(payload.read_by.as_deref(), Some("u2"));

        // Wrong type should return None
        assert!(event.as_typing_update().is_none());
    }

    #[test]
    fn test_typing_update_payload() {
        let event = PushEvent {
            event_type: PushEventType::TypingUpdate,
            data: serde_json::json!({"chatId": "c1", "typingUsers": ["u2", "u3"]}),
        };
        let payload = event.as_typing_update().unwrap();
        assert_eq!(payload.typing_users, vec!["u2", "u3"]);
    }

    #[test]
    fn test_user_status_payload() {
        let event = PushEvent {
            event_type: PushEventType::UserStatusUpdate,
            data: serde_json::json!({"userId": "u2", "status": "online"}),
        };
        let payload = event.as_user_status().unwrap();
        assert!(payload.is_online());
    }

    #[test]
    fn test_chat_updated_payload() {
        let event = PushEvent {
            event_type: PushEventType::ChatUpdated,
            data: serde_json::json!({
                "chatId": "c1",
                "updatedAt": "2026-02-01T10:00:00Z",
                "unreadCounts": [{"userId": "u1", "unreadCount": 3}]
            }),
        };
        let payload = event.as_chat_updated().unwrap();
        assert_eq!(payload.unread_counts[0].unread_count, 3);
    }

    #[test]
    fn test_matches_payload() {
        let event = PushEvent {
            event_type: PushEventType::HighMatchesFound,
            data: serde_json::json!({
                "type": "family",
                "userId": "u1",
                "matches": [{"id": "u9", "name": "Sam"}],
                "timestamp": "2026-02-01T10:00:00Z"
            }),
        };
        let payload = event.as_matches().unwrap();
        assert_eq!(payload.matches.len(), 1);
        assert_eq!(payload.match_type.as_deref(), Some("family"));
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }
}
