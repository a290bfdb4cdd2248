//! Server response types.
//!
//! Kinnect REST responses are plain JSON objects keyed by resource name
//! (`{ "chats": [...], "pagination": {...} }`, `{ "message": {...} }`),
//! with error responses carrying `{ "message": "..." }` or
//! `{ "error": "..." }`.

use serde::{Deserialize, Serialize};

use kn_models::{Chat, ChatMessage, FriendRequest};

/// Pagination block returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(rename = "totalPages", default)]
    pub total_pages: u32,
}

impl Pagination {
    /// Whether a further page exists after the current one.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Response to `GET /chats`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatListResponse {
    #[serde(default)]
    pub chats: Vec<Chat>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Response carrying a single chat (`POST /chats/direct`).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub chat: Chat,
}

/// Response to `GET /chats/{chatId}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageListResponse {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Response carrying a single message (send/edit).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: ChatMessage,
}

/// Response to friend-request list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct FriendRequestListResponse {
    #[serde(default)]
    pub requests: Vec<FriendRequest>,
}

/// Response carrying a single friend request.
#[derive(Debug, Clone, Deserialize)]
pub struct FriendRequestResponse {
    pub request: FriendRequest,
}

/// Error body returned on non-2xx responses.
///
/// The backend is inconsistent about the field name, so both `message`
/// and `error` are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    /// The best available human-readable message.
    pub fn message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_default()
    }
}
