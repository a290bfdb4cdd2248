//! Event router that translates inbound push events into app events.
//!
//! This is the central coordinator for realtime traffic. It receives raw
//! push events from the kn-socket EventDispatcher, parses each one into
//! its typed payload, and re-emits an application-level AppEvent through
//! the EventBus. It only forwards; de-duplication beyond the transport's
//! replay filter and any business reaction are consumer concerns.

use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, warn};

use kn_core::error::KnResult;
use kn_socket::{ConnectionState, EventDispatcher, PushEvent, PushEventType};

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState, StateCell};

/// Routes inbound push events to the application event bus.
pub struct EventRouter {
    state: StateCell,
    event_bus: EventBus,
    /// The authenticated user's id, used to pick the right unread count
    /// out of chat_updated payloads. Set by the session service on login.
    own_user_id: Arc<RwLock<Option<String>>>,
}

impl EventRouter {
    /// Create a new EventRouter.
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            state: StateCell::new(),
            event_bus,
            own_user_id: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the authenticated user's id.
    pub async fn set_own_user_id(&self, user_id: Option<String>) {
        *self.own_user_id.write().await = user_id;
    }

    /// Process a push event, routing it to the appropriate handler.
    ///
    /// This is the main entry point called by the listener task.
    pub async fn handle_event(&self, event: PushEvent) -> KnResult<()> {
        match event.event_type {
            PushEventType::NewMessage => self.handle_new_message(&event.data),
            PushEventType::MessageDelivered => self.handle_delivered(&event),
            PushEventType::MessageRead => self.handle_read(&event),
            PushEventType::MessageEdited => self.handle_edited(&event),
            PushEventType::MessageDeleted => self.handle_deleted(&event),
            PushEventType::TypingUpdate => self.handle_typing(&event),
            PushEventType::UserStatusUpdate => self.handle_user_status(&event),
            PushEventType::ChatUpdated => self.handle_chat_updated(&event).await,
            PushEventType::VoiceCallOffer
            | PushEventType::VoiceCallAnswer
            | PushEventType::VoiceCallEnd
            | PushEventType::IceCandidate => self.handle_call_signal(&event),
            PushEventType::MatchesUpdated | PushEventType::HighMatchesFound => {
                self.handle_matches(&event)
            }
            PushEventType::Unknown(ref name) => {
                debug!("unhandled push event type: {name}");
                Ok(())
            }
        }
    }

    /// Handle a new incoming message event (`{message, chat}`).
    fn handle_new_message(&self, data: &serde_json::Value) -> KnResult<()> {
        let Some(message) = crate::message::message_from_push(data) else {
            warn!("new_message event without a parseable message");
            return Ok(());
        };

        let chat_id = data
            .get("chat")
            .and_then(|c| c.get("id"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| message.chat_id.clone());

        self.event_bus.emit(AppEvent::MessageReceived { message, chat_id });
        Ok(())
    }

    fn handle_delivered(&self, event: &PushEvent) -> KnResult<()> {
        if let Some(payload) = event.as_message_delivered() {
            self.event_bus.emit(AppEvent::MessageDelivered {
                message_id: payload.message_id,
                chat_id: payload.chat_id,
                delivered_at: payload.delivered_at,
            });
        } else {
            warn!("malformed message_delivered payload");
        }
        Ok(())
    }

    fn handle_read(&self, event: &PushEvent) -> KnResult<()> {
        if let Some(payload) = event.as_message_read() {
            self.event_bus.emit(AppEvent::MessageRead {
                message_id: payload.message_id,
                chat_id: payload.chat_id,
                read_by: payload.read_by,
            });
        } else {
            warn!("malformed message_read payload");
        }
        Ok(())
    }

    fn handle_edited(&self, event: &PushEvent) -> KnResult<()> {
        if let Some(payload) = event.as_message_edited() {
            self.event_bus.emit(AppEvent::MessageEdited {
                message_id: payload.message_id,
                chat_id: payload.chat_id,
                new_text: payload.new_text,
            });
        } else {
            warn!("malformed message_edited payload");
        }
        Ok(())
    }

    fn handle_deleted(&self, event: &PushEvent) -> KnResult<()> {
        if let Some(payload) = event.as_message_deleted() {
            self.event_bus.emit(AppEvent::MessageDeleted {
                message_id: payload.message_id,
                chat_id: payload.chat_id,
                delete_for_everyone: payload.delete_for_everyone,
            });
        } else {
            warn!("malformed message_deleted payload");
        }
        Ok(())
    }

    fn handle_typing(&self, event: &PushEvent) -> KnResult<()> {
        if let Some(payload) = event.as_typing_update() {
            self.event_bus.emit(AppEvent::TypingChanged {
                chat_id: payload.chat_id,
                typing_users: payload.typing_users,
            });
        }
        Ok(())
    }

    fn handle_user_status(&self, event: &PushEvent) -> KnResult<()> {
        if let Some(payload) = event.as_user_status() {
            let is_online = payload.is_online();
            self.event_bus.emit(AppEvent::UserStatusChanged {
                user_id: payload.user_id,
                is_online,
                last_seen: payload.last_seen,
            });
        }
        Ok(())
    }

    async fn handle_chat_updated(&self, event: &PushEvent) -> KnResult<()> {
        if let Some(payload) = event.as_chat_updated() {
            // The payload carries one unread count per participant; only
            // the authenticated user's entry matters to this client.
            let own = self.own_user_id.read().await;
            let unread_count = own.as_ref().and_then(|uid| {
                payload
                    .unread_counts
                    .iter()
                    .find(|entry| &entry.user_id == uid)
                    .map(|entry| entry.unread_count)
            });

            self.event_bus.emit(AppEvent::ChatUpdated {
                chat_id: payload.chat_id,
                unread_count,
            });
        }
        Ok(())
    }

    /// Forward voice-call signaling without inspecting the payload.
    fn handle_call_signal(&self, event: &PushEvent) -> KnResult<()> {
        self.event_bus.emit(AppEvent::VoiceCallSignal {
            event: event.event_type.as_str().to_string(),
            payload: event.data.clone(),
        });
        Ok(())
    }

    fn handle_matches(&self, event: &PushEvent) -> KnResult<()> {
        let Some(payload) = event.as_matches() else {
            warn!("malformed matches payload");
            return Ok(());
        };

        if event.event_type == PushEventType::HighMatchesFound {
            info!(
                "high matches found for {}: {}",
                payload.user_id,
                payload.matches.len()
            );
            self.event_bus.emit(AppEvent::HighMatchesFound {
                user_id: payload.user_id,
                matches: payload.matches,
            });
        } else {
            self.event_bus.emit(AppEvent::MatchesUpdated {
                user_id: payload.user_id,
                match_count: payload
                    .match_count
                    .unwrap_or(payload.matches.len() as u32),
                matches: payload.matches,
            });
        }
        Ok(())
    }

    /// Get a reference to the event bus for external subscriptions.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Start the background listener that consumes push events.
    ///
    /// Spawns a tokio task that subscribes to the socket EventDispatcher
    /// and routes each event through handle_event.
    pub fn start_listener(
        router: Arc<EventRouter>,
        dispatcher: &EventDispatcher,
    ) -> tokio::task::JoinHandle<()> {
        let mut rx = dispatcher.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = router.handle_event(event).await {
                            error!("event router error: {e}");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("event router lagged by {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("event router: push event channel closed");
                        break;
                    }
                }
            }
        })
    }

    /// Start the background watcher that mirrors connection state changes
    /// onto the event bus as `ConnectionStateChanged` events.
    pub fn start_state_watcher(
        event_bus: EventBus,
        mut state_rx: watch::Receiver<ConnectionState>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state = *state_rx.borrow_and_update();
                event_bus.emit(AppEvent::ConnectionStateChanged {
                    connected: state == ConnectionState::Connected,
                    state: state.to_string(),
                });
                if state == ConnectionState::Failed {
                    event_bus.emit(AppEvent::ConnectionError {
                        message: "reconnection attempts exhausted".into(),
                    });
                }
            }
        })
    }
}

impl Service for EventRouter {
    fn name(&self) -> &str {
        "event_router"
    }
    fn state(&self) -> ServiceState {
        self.state.get()
    }
    fn init(&self) -> KnResult<()> {
        self.state.set(ServiceState::Running);
        info!("event router initialized");
        Ok(())
    }
    fn shutdown(&self) -> KnResult<()> {
        self.state.set(ServiceState::Stopped);
        info!("event router stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_with_bus() -> (EventRouter, broadcast::Receiver<AppEvent>) {
        let bus = EventBus::new(16);
        let rx = bus.subscribe();
        (EventRouter::new(bus), rx)
    }

    #[tokio::test]
    async fn test_new_message_routed() {
        let (router, mut rx) = router_with_bus();

        let event = PushEvent {
            event_type: PushEventType::NewMessage,
            data: serde_json::json!({
                "message": {
                    "id": "m1",
                    "chatId": "c1",
                    "sender": {"id": "u2", "name": "Jo"},
                    "messageType": "text",
                    "status": "sent",
                    "text": "hello"
                },
                "chat": {"id": "c1", "chatType": "direct"}
            }),
        };
        router.handle_event(event).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::MessageReceived { message, chat_id } => {
                assert_eq!(message.id, "m1");
                assert_eq!(chat_id, "c1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_receipt_routed() {
        let (router, mut rx) = router_with_bus();

        let event = PushEvent {
            event_type: PushEventType::MessageRead,
            data: serde_json::json!({
                "messageId": "m1",
                "chatId": "c1",
                "readBy": "u2",
                "readAt": "2026-02-01T10:00:00Z"
            }),
        };
        router.handle_event(event).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::MessageRead { message_id, read_by, .. } => {
                assert_eq!(message_id, "m1");
                assert_eq!(read_by.as_deref(), Some("u2"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chat_updated_picks_own_unread_count() {
        let (router, mut rx) = router_with_bus();
        router.set_own_user_id(Some("me".into())).await;

        let event = PushEvent {
            event_type: PushEventType::ChatUpdated,
            data: serde_json::json!({
                "chatId": "c1",
                "unreadCounts": [
                    {"userId": "me", "unreadCount": 4},
                    {"userId": "u2", "unreadCount": 0}
                ]
            }),
        };
        router.handle_event(event).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::ChatUpdated { unread_count, .. } => {
                assert_eq!(unread_count, Some(4));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_call_signal_forwarded_opaquely() {
        let (router, mut rx) = router_with_bus();

        let sdp = serde_json::json!({"sdp": "v=0...", "callId": "call-7"});
        let event = PushEvent {
            event_type: PushEventType::VoiceCallOffer,
            data: sdp.clone(),
        };
        router.handle_event(event).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::VoiceCallSignal { event, payload } => {
                assert_eq!(event, "voice_call_offer");
                assert_eq!(payload, sdp);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_high_matches_routed() {
        let (router, mut rx) = router_with_bus();

        let event = PushEvent {
            event_type: PushEventType::HighMatchesFound,
            data: serde_json::json!({
                "type": "family",
                "userId": "me",
                "matches": [{"id": "u9", "name": "Sam"}],
                "timestamp": "2026-02-01T10:00:00Z"
            }),
        };
        router.handle_event(event).await.unwrap();

        match rx.recv().await.unwrap() {
            AppEvent::HighMatchesFound { user_id, matches } => {
                assert_eq!(user_id, "me");
                assert_eq!(matches[0].id, "u9");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_does_not_error() {
        let (router, mut rx) = router_with_bus();

        let event = PushEvent {
            event_type: PushEventType::MessageDelivered,
            data: serde_json::json!({"bogus": true}),
        };
        router.handle_event(event).await.unwrap();

        // Nothing should have been emitted
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_listener_task_routes_events() {
        let dispatcher = EventDispatcher::new(16);
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let router = Arc::new(EventRouter::new(bus));

        let handle = EventRouter::start_listener(Arc::clone(&router), &dispatcher);

        dispatcher.dispatch(PushEvent {
            event_type: PushEventType::TypingUpdate,
            data: serde_json::json!({"chatId": "c1", "typingUsers": ["u2"]}),
        });

        match rx.recv().await.unwrap() {
            AppEvent::TypingChanged { chat_id, .. } => assert_eq!(chat_id, "c1"),
            other => panic!("unexpected event: {other:?}"),
        }

        handle.abort();
    }
}
