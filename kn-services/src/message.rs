//! Message service: sending, history, edit/delete, and reconciliation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use kn_api::endpoints::messages::MediaUpload;
use kn_api::{ApiClient, Pagination};
use kn_core::constants::TEMP_MESSAGE_PREFIX;
use kn_core::error::KnResult;
use kn_models::{ChatMessage, DeliveryStatus, MessageKind, UserSummary};

use crate::event_bus::{AppEvent, EventBus};
use crate::outbox::MessageOutbox;
use crate::service::{Service, ServiceState, StateCell};

/// Message-level operations with optimistic sending.
///
/// Holds one in-memory outbox per chat so the REST response to a send
/// and the corresponding push event reconcile into a single record no
/// matter which arrives first.
pub struct MessageService {
    state: StateCell,
    api: ApiClient,
    event_bus: EventBus,
    outboxes: Arc<Mutex<HashMap<String, MessageOutbox>>>,
    /// The authenticated user, used as the sender on optimistic
    /// placeholders. Set by the session service on login.
    own_user: Arc<RwLock<UserSummary>>,
}

impl MessageService {
    /// Create a new MessageService.
    pub fn new(api: ApiClient, event_bus: EventBus) -> Self {
        Self {
            state: StateCell::new(),
            api,
            event_bus,
            outboxes: Arc::new(Mutex::new(HashMap::new())),
            own_user: Arc::new(RwLock::new(UserSummary::default())),
        }
    }

    /// Set the authenticated user.
    pub async fn set_own_user(&self, user: UserSummary) {
        *self.own_user.write().await = user;
    }

    /// Get a page of message history, folding it into the chat's outbox.
    pub async fn get_chat_messages(
        &self,
        chat_id: &str,
        page: u32,
        limit: u32,
    ) -> KnResult<(Vec<ChatMessage>, Option<Pagination>)> {
        let (messages, pagination) = self.api.get_chat_messages(chat_id, page, limit).await?;

        let mut outboxes = self.outboxes.lock().await;
        let outbox = outboxes.entry(chat_id.to_string()).or_default();
        for message in &messages {
            outbox.apply_incoming(message.clone());
        }

        Ok((messages, pagination))
    }

    /// Send a text message with an optimistic local placeholder.
    ///
    /// The placeholder enters the outbox in `sending` state before the
    /// request is issued; on success it is reconciled with the
    /// server-assigned record and a `MessageSent` event is emitted. On
    /// failure the placeholder is dropped and `MessageFailed` is emitted
    /// alongside the returned error.
    pub async fn send_text_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> KnResult<ChatMessage> {
        let temp_id = format!("{TEMP_MESSAGE_PREFIX}{}", Uuid::new_v4());
        let sender = self.own_user.read().await.clone();
        let placeholder = ChatMessage::optimistic_text(
            &temp_id,
            chat_id,
            sender,
            text,
            reply_to.map(String::from),
        );

        {
            let mut outboxes = self.outboxes.lock().await;
            outboxes
                .entry(chat_id.to_string())
                .or_default()
                .insert_optimistic(placeholder);
        }

        match self.api.send_text_message(chat_id, text, reply_to).await {
            Ok(message) => {
                {
                    let mut outboxes = self.outboxes.lock().await;
                    outboxes
                        .entry(chat_id.to_string())
                        .or_default()
                        .confirm(&temp_id, message.clone());
                }

                self.record_significant_event("message_sent", chat_id);
                self.event_bus.emit(AppEvent::MessageSent {
                    temp_id,
                    message_id: message.id.clone(),
                    chat_id: chat_id.to_string(),
                });
                Ok(message)
            }
            Err(e) => {
                {
                    let mut outboxes = self.outboxes.lock().await;
                    if let Some(outbox) = outboxes.get_mut(chat_id) {
                        outbox.fail(&temp_id);
                    }
                }
                self.event_bus.emit(AppEvent::MessageFailed {
                    temp_id,
                    chat_id: chat_id.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Send a media message as a multipart upload.
    ///
    /// Requires a session token and fails fast with `AuthRequired`
    /// before staging the upload, rather than letting the server bounce
    /// it with a 401.
    pub async fn send_media_message(
        &self,
        chat_id: &str,
        media: MediaUpload,
        kind: MessageKind,
        reply_to: Option<&str>,
        duration_secs: Option<f64>,
    ) -> KnResult<ChatMessage> {
        self.api.require_token().await?;

        let message = self
            .api
            .send_media_message(chat_id, media, kind, reply_to, duration_secs)
            .await?;

        {
            let mut outboxes = self.outboxes.lock().await;
            outboxes
                .entry(chat_id.to_string())
                .or_default()
                .apply_incoming(message.clone());
        }

        self.record_significant_event("media_sent", chat_id);
        info!("media message sent to {chat_id}: {}", message.id);
        Ok(message)
    }

    /// Edit a text message.
    pub async fn edit_message(&self, message_id: &str, new_text: &str) -> KnResult<ChatMessage> {
        let message = self.api.edit_message(message_id, new_text).await?;

        let mut outboxes = self.outboxes.lock().await;
        if let Some(outbox) = outboxes.get_mut(&message.chat_id) {
            outbox.apply_edit(message_id, new_text, message.edited_at.clone());
        }
        Ok(message)
    }

    /// Delete a message. Deletion is soft; the record stays flagged.
    pub async fn delete_message(
        &self,
        chat_id: &str,
        message_id: &str,
        delete_for_everyone: bool,
    ) -> KnResult<()> {
        self.api
            .delete_message(message_id, delete_for_everyone)
            .await?;

        let mut outboxes = self.outboxes.lock().await;
        if let Some(outbox) = outboxes.get_mut(chat_id) {
            outbox.apply_delete(message_id);
        }
        Ok(())
    }

    /// Fold a pushed message into the chat's outbox. Duplicate-safe.
    pub async fn apply_incoming(&self, message: ChatMessage) {
        let mut outboxes = self.outboxes.lock().await;
        outboxes
            .entry(message.chat_id.clone())
            .or_default()
            .apply_incoming(message);
    }

    /// Advance a message's delivery status from a receipt event.
    pub async fn apply_status(&self, chat_id: &str, message_id: &str, status: DeliveryStatus) {
        let mut outboxes = self.outboxes.lock().await;
        if let Some(outbox) = outboxes.get_mut(chat_id) {
            outbox.advance_status(message_id, status);
        }
    }

    /// Snapshot of a chat's messages in insertion order.
    pub async fn messages(&self, chat_id: &str) -> Vec<ChatMessage> {
        let outboxes = self.outboxes.lock().await;
        outboxes
            .get(chat_id)
            .map(|outbox| outbox.messages().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record an engagement marker without blocking or failing the
    /// primary operation. Errors are logged and swallowed.
    fn record_significant_event(&self, event_type: &str, chat_id: &str) {
        let api = self.api.clone();
        let event_type = event_type.to_string();
        let chat_id = chat_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api
                .record_significant_event(&event_type, Some(&chat_id))
                .await
            {
                debug!("significant event {event_type} not recorded: {e}");
            }
        });
    }
}

impl Service for MessageService {
    fn name(&self) -> &str {
        "message"
    }
    fn state(&self) -> ServiceState {
        self.state.get()
    }
    fn init(&self) -> KnResult<()> {
        self.state.set(ServiceState::Running);
        info!("message service initialized");
        Ok(())
    }
    fn shutdown(&self) -> KnResult<()> {
        self.state.set(ServiceState::Stopped);
        info!("message service stopped");
        Ok(())
    }
}

// Parsing fallback used when a push event carries a raw map instead of a
// typed payload; kept here so consumers have a single entry point.
pub(crate) fn message_from_push(data: &serde_json::Value) -> Option<ChatMessage> {
    data.get("message")
        .and_then(ChatMessage::from_server_map)
        .or_else(|| ChatMessage::from_server_map(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kn_core::config::ServerConfig;
    use kn_core::error::KnError;

    fn service() -> MessageService {
        let api = ApiClient::new(&ServerConfig {
            // TEST-NET-1, unroutable: requests fail without retries
            address: "http://192.0.2.1:9".into(),
            api_timeout_ms: 1_000,
        })
        .unwrap()
        .with_retry_config(kn_api::RetryConfig::none());
        MessageService::new(api, EventBus::new(16))
    }

    #[tokio::test]
    async fn test_media_send_fails_fast_without_token() {
        let svc = service();
        let media = MediaUpload {
            bytes: vec![0u8; 16],
            file_name: "photo.jpg".into(),
            mime_type: "image/jpeg".into(),
        };

        let err = svc
            .send_media_message("c1", media, MessageKind::Image, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, KnError::AuthRequired(_)));
    }

    #[tokio::test]
    async fn test_failed_text_send_emits_failure_and_drops_placeholder() {
        let svc = service();
        svc.api.set_token(Some("tok-1".into())).await;
        let mut rx = svc.event_bus.subscribe();

        let result = svc.send_text_message("c1", "hello", None).await;
        assert!(result.is_err());

        match rx.recv().await.unwrap() {
            AppEvent::MessageFailed { temp_id, chat_id, .. } => {
                assert!(temp_id.starts_with(TEMP_MESSAGE_PREFIX));
                assert_eq!(chat_id, "c1");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The placeholder must not linger as a phantom message
        assert!(svc.messages("c1").await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_incoming_and_status() {
        let svc = service();

        let msg = ChatMessage::from_server_map(&serde_json::json!({
            "id": "m1",
            "chatId": "c1",
            "sender": {"id": "u2", "name": "Jo"},
            "messageType": "text",
            "status": "sent",
            "text": "hi",
        }))
        .unwrap();

        svc.apply_incoming(msg.clone()).await;
        svc.apply_incoming(msg).await;
        assert_eq!(svc.messages("c1").await.len(), 1);

        svc.apply_status("c1", "m1", DeliveryStatus::Read).await;
        svc.apply_status("c1", "m1", DeliveryStatus::Delivered).await;
        assert_eq!(svc.messages("c1").await[0].status, DeliveryStatus::Read);
    }

    #[test]
    fn test_message_from_push_accepts_both_shapes() {
        let wrapped = serde_json::json!({
            "message": {
                "id": "m1", "chatId": "c1", "messageType": "text",
                "status": "sent", "text": "hi"
            }
        });
        assert_eq!(message_from_push(&wrapped).unwrap().id, "m1");

        let bare = serde_json::json!({
            "id": "m2", "chatId": "c1", "messageType": "text",
            "status": "sent", "text": "hi"
        });
        assert_eq!(message_from_push(&bare).unwrap().id, "m2");
    }
}
