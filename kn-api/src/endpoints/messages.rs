//! Message endpoints.

use kn_core::error::{KnError, KnResult};
use kn_models::{ChatMessage, MessageKind};

use crate::client::ApiClient;
use crate::response::{MessageListResponse, MessageResponse, Pagination};

/// An in-memory media file staged for upload.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl ApiClient {
    /// Get a page of message history for a chat.
    ///
    /// Page ordering (newest-first vs oldest-first) is a server decision;
    /// the client renders whatever order it receives.
    pub async fn get_chat_messages(
        &self,
        chat_id: &str,
        page: u32,
        limit: u32,
    ) -> KnResult<(Vec<ChatMessage>, Option<Pagination>)> {
        let resp: MessageListResponse = self
            .get_json(&format!("/chats/{chat_id}/messages?page={page}&limit={limit}"))
            .await?;
        Ok((resp.messages, resp.pagination))
    }

    /// Send a text message to a chat.
    pub async fn send_text_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> KnResult<ChatMessage> {
        let mut body = serde_json::json!({ "text": text });
        if let Some(reply) = reply_to {
            body["replyTo"] = serde_json::Value::String(reply.to_string());
        }
        let resp: MessageResponse = self
            .post_json(&format!("/chats/{chat_id}/messages"), &body)
            .await?;
        Ok(resp.message)
    }

    /// Send a media message as a multipart upload.
    ///
    /// Uses the extended timeout; no automatic retry (the form cannot be
    /// replayed).
    pub async fn send_media_message(
        &self,
        chat_id: &str,
        media: MediaUpload,
        kind: MessageKind,
        reply_to: Option<&str>,
        duration_secs: Option<f64>,
    ) -> KnResult<ChatMessage> {
        let file_part = reqwest::multipart::Part::bytes(media.bytes)
            .file_name(media.file_name)
            .mime_str(&media.mime_type)
            .map_err(|e| KnError::SendFailed(format!("invalid mime type: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("media", file_part)
            .text("messageType", kind.as_str().to_string());
        if let Some(reply) = reply_to {
            form = form.text("replyTo", reply.to_string());
        }
        if let Some(duration) = duration_secs {
            form = form.text("duration", duration.to_string());
        }

        let resp = self
            .post_multipart(&format!("/chats/{chat_id}/messages/media"), form)
            .await?;
        let resp: MessageResponse = ApiClient::parse_response(resp).await?;
        Ok(resp.message)
    }

    /// Mark messages in a chat as read.
    ///
    /// With `message_ids` empty, the server marks everything unread in the
    /// chat. This is the authoritative read-receipt path; failures here
    /// propagate to the caller.
    pub async fn mark_messages_read(
        &self,
        chat_id: &str,
        message_ids: &[String],
    ) -> KnResult<()> {
        let body = if message_ids.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::json!({ "messageIds": message_ids })
        };
        self.put(&format!("/chats/{chat_id}/messages/read"), &body)
            .await?;
        Ok(())
    }

    /// Edit a text message's content.
    pub async fn edit_message(&self, message_id: &str, new_text: &str) -> KnResult<ChatMessage> {
        let body = serde_json::json!({ "text": new_text });
        let resp: MessageResponse = self
            .put_json(&format!("/chats/messages/{message_id}"), &body)
            .await?;
        Ok(resp.message)
    }

    /// Delete a message. Deletion is soft on the server side.
    pub async fn delete_message(
        &self,
        message_id: &str,
        delete_for_everyone: bool,
    ) -> KnResult<()> {
        let body = serde_json::json!({ "deleteForEveryone": delete_for_everyone });
        self.delete_with_body(&format!("/chats/messages/{message_id}"), &body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_body_with_reply() {
        let mut body = serde_json::json!({ "text": "hi" });
        body["replyTo"] = serde_json::Value::String("m9".into());
        assert_eq!(body["replyTo"], "m9");
    }

    #[test]
    fn test_mark_read_body_shapes() {
        let all = serde_json::json!({});
        assert!(all.get("messageIds").is_none());

        let ids = vec!["m1".to_string(), "m2".to_string()];
        let some = serde_json::json!({ "messageIds": ids });
        assert_eq!(some["messageIds"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_message_list_parses() {
        let json = r#"{
            "messages": [{
                "id": "m1",
                "chatId": "c1",
                "sender": {"id": "u1"},
                "messageType": "text",
                "status": "read",
                "text": "hello"
            }],
            "pagination": {"page": 1, "limit": 50, "total": 1, "totalPages": 1}
        }"#;
        let resp: MessageListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.messages.len(), 1);
        assert_eq!(resp.messages[0].status, kn_models::DeliveryStatus::Read);
    }
}
