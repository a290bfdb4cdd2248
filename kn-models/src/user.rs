//! User summary model.

use serde::{Deserialize, Serialize};

/// Embedded summary of a user, as denormalized into chats and messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "photoUrl", default)]
    pub photo_url: Option<String>,
    #[serde(rename = "isOnline", default)]
    pub is_online: bool,
    #[serde(rename = "lastSeen", default)]
    pub last_seen: Option<String>,
}

impl UserSummary {
    /// Create a UserSummary from a server JSON map.
    ///
    /// Some payloads carry only a bare user id string; those are accepted too.
    pub fn from_server_map(map: &serde_json::Value) -> Option<Self> {
        if let Some(id) = map.as_str() {
            return Some(Self {
                id: id.to_string(),
                ..Default::default()
            });
        }

        let id = map
            .get("id")
            .or_else(|| map.get("_id"))
            .or_else(|| map.get("userId"))
            .and_then(|v| v.as_str())?
            .to_string();

        Some(Self {
            id,
            name: map
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            email: map.get("email").and_then(|v| v.as_str()).map(String::from),
            photo_url: map
                .get("photoUrl")
                .or_else(|| map.get("photo"))
                .and_then(|v| v.as_str())
                .map(String::from),
            is_online: map
                .get("isOnline")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            last_seen: map
                .get("lastSeen")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_full_map() {
        let json = serde_json::json!({
            "id": "user_42",
            "name": "Maya",
            "email": "maya@example.com",
            "isOnline": true,
        });
        let user = UserSummary::from_server_map(&json).unwrap();
        assert_eq!(user.id, "user_42");
        assert_eq!(user.name, "Maya");
        assert!(user.is_online);
    }

    #[test]
    fn test_from_bare_id() {
        let json = serde_json::json!("user_7");
        let user = UserSummary::from_server_map(&json).unwrap();
        assert_eq!(user.id, "user_7");
        assert!(user.name.is_empty());
    }

    #[test]
    fn test_missing_id_rejected() {
        let json = serde_json::json!({"name": "nobody"});
        assert!(UserSummary::from_server_map(&json).is_none());
    }
}
