//! Message entity model.
//!
//! A `ChatMessage` is parsed from server JSON maps. Its kind fixes which
//! content fields are populated, and its delivery status only ever moves
//! forward (sending -> sent -> delivered -> read).

use serde::{Deserialize, Serialize};

use kn_core::constants::TEMP_MESSAGE_PREFIX;

use crate::user::UserSummary;

/// The kind of a message, fixing which content fields are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Voice,
    Video,
    Document,
    Location,
}

impl MessageKind {
    /// Parse a message kind from the server wire value.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "voice" => Some(Self::Voice),
            "video" => Some(Self::Video),
            "document" => Some(Self::Document),
            "location" => Some(Self::Location),
            _ => None,
        }
    }

    /// Convert to the server wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Document => "document",
            Self::Location => "location",
        }
    }

    /// Whether this kind carries a media payload (URL, file name, MIME type).
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Voice | Self::Video | Self::Document)
    }
}

/// Delivery status of a message, ordered by progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Parse a delivery status from the server wire value.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sending" => Some(Self::Sending),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }

    /// Convert to the server wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    /// Numeric rank used to enforce monotonic progression.
    fn rank(&self) -> u8 {
        match self {
            Self::Sending => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
        }
    }

    /// Advance to `next` if it is a forward transition.
    ///
    /// Returns the resulting status: `next` if it moves forward, `self`
    /// otherwise. Status never regresses (a message observed as read is
    /// never shown as delivered again).
    pub fn advance(self, next: DeliveryStatus) -> DeliveryStatus {
        if next.rank() > self.rank() {
            next
        } else {
            self
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reaction attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub emoji: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Typed view over a message's kind-dependent content fields.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    /// Plain text body.
    Text(String),
    /// Media attachment (image, voice, video, document).
    Media {
        url: String,
        file_name: Option<String>,
        file_size: Option<i64>,
        mime_type: Option<String>,
        thumbnail_url: Option<String>,
        /// Playback duration in seconds for voice/video.
        duration_secs: Option<f64>,
    },
    /// Geographic location.
    Location {
        latitude: f64,
        longitude: f64,
        address: Option<String>,
    },
}

/// Represents a single message in a Kinnect chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub sender: UserSummary,
    #[serde(rename = "messageType")]
    pub kind: MessageKind,
    pub status: DeliveryStatus,

    // Kind-dependent content fields. A text message carries only `text`;
    // media kinds carry the media fields; location carries the geo fields.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "mediaUrl", default)]
    pub media_url: Option<String>,
    #[serde(rename = "fileName", default)]
    pub file_name: Option<String>,
    #[serde(rename = "fileSize", default)]
    pub file_size: Option<i64>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "thumbnailUrl", default)]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "durationSecs", default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,

    #[serde(rename = "deliveredAt", default)]
    pub delivered_at: Option<String>,
    #[serde(rename = "readAt", default)]
    pub read_at: Option<String>,
    #[serde(rename = "isEdited", default)]
    pub is_edited: bool,
    #[serde(rename = "editedAt", default)]
    pub edited_at: Option<String>,
    #[serde(rename = "replyTo", default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Soft-delete marker. Messages are never removed client-side.
    #[serde(rename = "isDeleted", default)]
    pub is_deleted: bool,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<String>,
}

impl ChatMessage {
    /// Create a ChatMessage from a server JSON map.
    ///
    /// Tolerant of missing optional fields; unknown kinds and statuses fall
    /// back to `text`/`sent` so a newer server does not break the client.
    pub fn from_server_map(map: &serde_json::Value) -> Option<Self> {
        let id = map
            .get("id")
            .or_else(|| map.get("_id"))
            .and_then(|v| v.as_str())?
            .to_string();
        let chat_id = map
            .get("chatId")
            .or_else(|| map.get("chat"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let sender = map
            .get("sender")
            .and_then(UserSummary::from_server_map)
            .unwrap_or_default();
        let kind = map
            .get("messageType")
            .and_then(|v| v.as_str())
            .and_then(MessageKind::from_str)
            .unwrap_or(MessageKind::Text);
        let status = map
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(DeliveryStatus::from_str)
            .unwrap_or(DeliveryStatus::Sent);

        let get_str = |key: &str| map.get(key).and_then(|v| v.as_str()).map(String::from);

        Some(Self {
            id,
            chat_id,
            sender,
            kind,
            status,
            text: get_str("text"),
            media_url: get_str("mediaUrl"),
            file_name: get_str("fileName"),
            file_size: map.get("fileSize").and_then(|v| v.as_i64()),
            mime_type: get_str("mimeType"),
            thumbnail_url: get_str("thumbnailUrl"),
            duration_secs: map.get("durationSecs").and_then(|v| v.as_f64()),
            latitude: map.get("latitude").and_then(|v| v.as_f64()),
            longitude: map.get("longitude").and_then(|v| v.as_f64()),
            address: get_str("address"),
            delivered_at: get_str("deliveredAt"),
            read_at: get_str("readAt"),
            is_edited: map.get("isEdited").and_then(|v| v.as_bool()).unwrap_or(false),
            edited_at: get_str("editedAt"),
            reply_to: get_str("replyTo"),
            reactions: map
                .get("reactions")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            is_deleted: map
                .get("isDeleted")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            created_at: get_str("createdAt"),
            updated_at: get_str("updatedAt"),
        })
    }

    /// Build an optimistic local placeholder for a text message being sent.
    pub fn optimistic_text(temp_id: &str, chat_id: &str, sender: UserSummary, text: &str, reply_to: Option<String>) -> Self {
        Self {
            id: temp_id.to_string(),
            chat_id: chat_id.to_string(),
            sender,
            kind: MessageKind::Text,
            status: DeliveryStatus::Sending,
            text: Some(text.to_string()),
            media_url: None,
            file_name: None,
            file_size: None,
            mime_type: None,
            thumbnail_url: None,
            duration_secs: None,
            latitude: None,
            longitude: None,
            address: None,
            delivered_at: None,
            read_at: None,
            is_edited: false,
            edited_at: None,
            reply_to,
            reactions: Vec::new(),
            is_deleted: false,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            updated_at: None,
        }
    }

    /// Whether this is a temporary (not yet confirmed) message.
    pub fn is_temp(&self) -> bool {
        self.id.starts_with(TEMP_MESSAGE_PREFIX)
    }

    /// Typed view over the kind-dependent content fields.
    pub fn content(&self) -> Option<MessageContent> {
        match self.kind {
            MessageKind::Text => self.text.clone().map(MessageContent::Text),
            MessageKind::Location => match (self.latitude, self.longitude) {
                (Some(latitude), Some(longitude)) => Some(MessageContent::Location {
                    latitude,
                    longitude,
                    address: self.address.clone(),
                }),
                _ => None,
            },
            _ => self.media_url.clone().map(|url| MessageContent::Media {
                url,
                file_name: self.file_name.clone(),
                file_size: self.file_size,
                mime_type: self.mime_type.clone(),
                thumbnail_url: self.thumbnail_url.clone(),
                duration_secs: self.duration_secs,
            }),
        }
    }

    /// Check the kind/content invariant: a message's kind fixes which
    /// content fields may be populated (a text message has no media URL,
    /// a media message has no coordinates, and so on).
    pub fn kind_fields_consistent(&self) -> bool {
        match self.kind {
            MessageKind::Text => self.media_url.is_none() && self.latitude.is_none(),
            MessageKind::Location => self.media_url.is_none() && self.text.is_none(),
            _ => self.latitude.is_none() && self.longitude.is_none(),
        }
    }

    /// Whether `user_id` is allowed to edit this message.
    ///
    /// Only the sender may edit, and only text messages are editable.
    pub fn editable_by(&self, user_id: &str) -> bool {
        self.sender.id == user_id && self.kind == MessageKind::Text && !self.is_deleted
    }

    /// Advance the delivery status, keeping the transition monotonic.
    pub fn advance_status(&mut self, next: DeliveryStatus) {
        self.status = self.status.advance(next);
    }

    /// Merge a server update into this record without regressing status.
    pub fn merge(&mut self, other: &ChatMessage) {
        self.status = self.status.advance(other.status);
        if other.delivered_at.is_some() {
            self.delivered_at = other.delivered_at.clone();
        }
        if other.read_at.is_some() {
            self.read_at = other.read_at.clone();
        }
        if other.is_edited {
            self.is_edited = true;
            self.text = other.text.clone();
            self.edited_at = other.edited_at.clone();
        }
        if other.is_deleted {
            self.is_deleted = true;
        }
        if !other.reactions.is_empty() {
            self.reactions = other.reactions.clone();
        }
        if other.updated_at.is_some() {
            self.updated_at = other.updated_at.clone();
        }
    }
}
