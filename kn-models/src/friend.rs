//! Friend request model.

use serde::{Deserialize, Serialize};

use crate::user::UserSummary;

/// Lifecycle state of a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" | "declined" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

/// A friend request between two users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: String,
    pub sender: UserSummary,
    pub recipient: UserSummary,
    pub status: FriendRequestStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<String>,
}

impl FriendRequest {
    /// Create a FriendRequest from a server JSON map.
    pub fn from_server_map(map: &serde_json::Value) -> Option<Self> {
        let id = map
            .get("id")
            .or_else(|| map.get("_id"))
            .and_then(|v| v.as_str())?
            .to_string();

        Some(Self {
            id,
            sender: map
                .get("sender")
                .or_else(|| map.get("from"))
                .and_then(UserSummary::from_server_map)
                .unwrap_or_default(),
            recipient: map
                .get("recipient")
                .or_else(|| map.get("to"))
                .and_then(UserSummary::from_server_map)
                .unwrap_or_default(),
            status: map
                .get("status")
                .and_then(|v| v.as_str())
                .and_then(FriendRequestStatus::from_str)
                .unwrap_or(FriendRequestStatus::Pending),
            message: map.get("message").and_then(|v| v.as_str()).map(String::from),
            created_at: map
                .get("createdAt")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
    }

    /// Whether the request is still awaiting a response.
    pub fn is_pending(&self) -> bool {
        self.status == FriendRequestStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_server_map() {
        let req = FriendRequest::from_server_map(&serde_json::json!({
            "id": "fr1",
            "sender": {"id": "u1", "name": "Ana"},
            "recipient": {"id": "u2", "name": "Ben"},
            "status": "pending",
            "message": "hi, add me",
        }))
        .unwrap();
        assert_eq!(req.id, "fr1");
        assert_eq!(req.sender.id, "u1");
        assert!(req.is_pending());
    }

    #[test]
    fn test_declined_maps_to_rejected() {
        assert_eq!(
            FriendRequestStatus::from_str("declined"),
            Some(FriendRequestStatus::Rejected)
        );
    }

    #[test]
    fn test_missing_id_rejected() {
        assert!(FriendRequest::from_server_map(&serde_json::json!({"status": "pending"})).is_none());
    }
}
