//! Chat service: conversation-level operations.

use std::sync::Arc;
use tracing::{debug, info};

use kn_api::{ApiClient, Pagination};
use kn_core::error::KnResult;
use kn_models::Chat;
use kn_socket::{ClientEvent, ConnectionManager};

use crate::event_bus::EventBus;
use crate::service::{Service, ServiceState, StateCell};

/// Conversation-level operations: chat list, direct-chat creation, read
/// receipts, typing, and voice-call signaling senders.
pub struct ChatService {
    state: StateCell,
    api: ApiClient,
    manager: Arc<ConnectionManager>,
    event_bus: EventBus,
}

impl ChatService {
    /// Create a new ChatService.
    pub fn new(api: ApiClient, manager: Arc<ConnectionManager>, event_bus: EventBus) -> Self {
        Self {
            state: StateCell::new(),
            api,
            manager,
            event_bus,
        }
    }

    /// Get the chat list, paginated.
    pub async fn get_chats(
        &self,
        page: u32,
        limit: u32,
    ) -> KnResult<(Vec<Chat>, Option<Pagination>)> {
        self.api.get_chats(page, limit).await
    }

    /// Get or create the direct chat with `target_user_id`.
    ///
    /// Idempotent on the server. On success, joins the chat's realtime
    /// room so subsequent push events for it are received.
    pub async fn create_or_get_direct_chat(&self, target_user_id: &str) -> KnResult<Chat> {
        let chat = self.api.create_or_get_direct_chat(target_user_id).await?;
        info!("direct chat ready: {} (with {target_user_id})", chat.id);
        self.join_chat(&chat.id);
        Ok(chat)
    }

    /// Mark messages in a chat as read, on both paths.
    ///
    /// The REST call is authoritative: its failure propagates to the
    /// caller and means the receipt was not persisted. The realtime
    /// `mark_read` emission is an optimization that speeds up convergence
    /// of the sender's and the user's other sessions; it is attempted
    /// first, exactly once, and its failure is logged by the transport
    /// but never surfaced here. An empty `message_ids` marks the whole
    /// chat.
    pub async fn mark_messages_as_read(
        &self,
        chat_id: &str,
        message_ids: &[String],
    ) -> KnResult<()> {
        self.manager.emit(ClientEvent::MarkRead {
            chat_id: chat_id.to_string(),
            message_ids: message_ids.to_vec(),
        });

        self.api.mark_messages_read(chat_id, message_ids).await?;
        debug!("marked {} message(s) read in {chat_id}", message_ids.len());
        Ok(())
    }

    /// Join a chat's realtime room. Fire-and-forget.
    pub fn join_chat(&self, chat_id: &str) {
        self.manager.emit(ClientEvent::JoinChat {
            chat_id: chat_id.to_string(),
        });
    }

    /// Send a typing indicator for a chat. Fire-and-forget.
    pub fn send_typing(&self, chat_id: &str, is_typing: bool) {
        self.manager.emit(ClientEvent::Typing {
            chat_id: chat_id.to_string(),
            is_typing,
        });
    }

    /// Send a voice-call offer. Fire-and-forget; the payload is opaque
    /// signaling data produced by the call layer.
    pub fn start_voice_call(&self, payload: serde_json::Value) {
        self.manager.emit(ClientEvent::VoiceCallOffer { payload });
    }

    /// Answer a voice call. Fire-and-forget.
    pub fn answer_voice_call(&self, payload: serde_json::Value) {
        self.manager.emit(ClientEvent::VoiceCallAnswer { payload });
    }

    /// End a voice call. Fire-and-forget.
    pub fn end_voice_call(&self, payload: serde_json::Value) {
        self.manager.emit(ClientEvent::VoiceCallEnd { payload });
    }

    /// Send a WebRTC ICE candidate. Fire-and-forget.
    pub fn send_ice_candidate(&self, payload: serde_json::Value) {
        self.manager.emit(ClientEvent::IceCandidate { payload });
    }

    /// Get a reference to the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

impl Service for ChatService {
    fn name(&self) -> &str {
        "chat"
    }
    fn state(&self) -> ServiceState {
        self.state.get()
    }
    fn init(&self) -> KnResult<()> {
        self.state.set(ServiceState::Running);
        info!("chat service initialized");
        Ok(())
    }
    fn shutdown(&self) -> KnResult<()> {
        self.state.set(ServiceState::Stopped);
        info!("chat service stopped");
        Ok(())
    }
}
