//! Chat (conversation) entity model.

use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, MessageKind};
use crate::user::UserSummary;

/// Whether a chat is a one-to-one conversation or a named group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Direct,
    Group,
}

impl ChatType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "direct" | "private" => Some(Self::Direct),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

/// Denormalized summary of the most recent message in a chat, used to
/// render conversation lists without fetching full message pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessageSummary {
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "senderId", default)]
    pub sender_id: String,
    #[serde(rename = "messageType")]
    pub kind: MessageKind,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(rename = "sentAt", default)]
    pub sent_at: Option<String>,
}

impl LastMessageSummary {
    pub fn from_message(msg: &ChatMessage) -> Self {
        let preview = match msg.kind {
            MessageKind::Text => msg.text.clone(),
            MessageKind::Location => Some("Location".to_string()),
            other => Some(format!("[{}]", other.as_str())),
        };
        Self {
            message_id: msg.id.clone(),
            sender_id: msg.sender.id.clone(),
            kind: msg.kind,
            preview,
            sent_at: msg.created_at.clone(),
        }
    }
}

/// Represents a conversation (direct or group) in Kinnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(rename = "chatType")]
    pub chat_type: ChatType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub participants: Vec<UserSummary>,
    #[serde(rename = "lastMessage", default)]
    pub last_message: Option<LastMessageSummary>,
    #[serde(rename = "unreadCount", default)]
    pub unread_count: u32,
    #[serde(rename = "isMuted", default)]
    pub is_muted: bool,
    #[serde(rename = "isPinned", default)]
    pub is_pinned: bool,
    /// When the authenticated user last viewed this chat.
    #[serde(rename = "lastSeen", default)]
    pub last_seen: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

impl Chat {
    /// Create a Chat from a server JSON map.
    pub fn from_server_map(map: &serde_json::Value) -> Option<Self> {
        let id = map
            .get("id")
            .or_else(|| map.get("_id"))
            .and_then(|v| v.as_str())?
            .to_string();
        let chat_type = map
            .get("chatType")
            .or_else(|| map.get("type"))
            .and_then(|v| v.as_str())
            .and_then(ChatType::from_str)
            .unwrap_or(ChatType::Direct);

        let participants = map
            .get("participants")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(UserSummary::from_server_map)
                    .collect()
            })
            .unwrap_or_default();

        let last_message = map
            .get("lastMessage")
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let get_str = |key: &str| map.get(key).and_then(|v| v.as_str()).map(String::from);

        Some(Self {
            id,
            chat_type,
            name: get_str("name"),
            participants,
            last_message,
            unread_count: map
                .get("unreadCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            is_muted: map.get("isMuted").and_then(|v| v.as_bool()).unwrap_or(false),
            is_pinned: map
                .get("isPinned")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            last_seen: get_str("lastSeen"),
            created_at: get_str("createdAt"),
            updated_at: get_str("updatedAt"),
        })
    }

    /// Human-readable title: the group name, or the other participant's
    /// name in a direct chat.
    pub fn display_name(&self, own_user_id: &str) -> String {
        if let Some(name) = &self.name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        self.participants
            .iter()
            .find(|p| p.id != own_user_id)
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.clone())
    }

    /// Fold an incoming message into the chat's denormalized list state.
    ///
    /// Updates the last-message summary and bumps the unread counter when
    /// the message was authored by someone else.
    pub fn apply_incoming(&mut self, msg: &ChatMessage, own_user_id: &str) {
        self.last_message = Some(LastMessageSummary::from_message(msg));
        self.updated_at = msg.created_at.clone();
        if msg.sender.id != own_user_id {
            self.unread_count = self.unread_count.saturating_add(1);
        }
    }

    /// Apply a read receipt: messages read locally clear the unread count,
    /// and the last-message summary keeps its id (status lives on the
    /// messages themselves).
    pub fn apply_read(&mut self) {
        self.unread_count = 0;
    }

    /// Whether the given message would advance this chat's last-message
    /// summary (it is newer or there is none yet).
    pub fn is_newer_than_last(&self, msg: &ChatMessage) -> bool {
        match (&self.last_message, &msg.created_at) {
            (None, _) => true,
            (Some(last), Some(created)) => match &last.sent_at {
                Some(sent) => created >= sent,
                None => true,
            },
            (Some(_), None) => true,
        }
    }
}

/// Convenience ordering key for conversation lists: most recently updated
/// chats sort first.
pub fn sort_chats_recent_first(chats: &mut [Chat]) {
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
