//! Realtime connection manager.
//!
//! Owns the single persistent connection to the Kinnect server: connect/
//! disconnect lifecycle, automatic reconnection with exponential backoff
//! and jitter, inbound event routing to the EventDispatcher, and the
//! outbound fire-and-forget emission queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use kn_core::config::RealtimeConfig;
use kn_core::constants;
use kn_core::error::{KnError, KnResult};

use crate::events::{ConnectionState, EventDispatcher, PushEvent, PushEventType};
use crate::outbound::ClientEvent;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay between reconnection attempts.
    pub base_delay: Duration,
    /// Maximum delay cap for exponential backoff.
    pub max_delay: Duration,
    /// Maximum number of reconnection attempts (0 = unlimited).
    pub max_attempts: u32,
    /// Jitter factor (0.0 to 1.0) added to each delay.
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(constants::RECONNECT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs(constants::RECONNECT_MAX_DELAY_SECS),
            max_attempts: 0,
            jitter_factor: 0.3,
        }
    }
}

impl From<&RealtimeConfig> for ReconnectConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(config.reconnect_base_delay_secs),
            max_delay: Duration::from_secs(config.reconnect_max_delay_secs),
            max_attempts: config.reconnect_max_attempts,
            jitter_factor: 0.3,
        }
    }
}

/// Realtime connection manager.
///
/// Exactly one of these exists per running client; it is constructed
/// explicitly and handed to its consumers rather than living in a global.
/// Manages the full lifecycle of the realtime connection:
/// - Initial connection authenticated with the session bearer token
/// - Automatic reconnection with exponential backoff + jitter (5s, 10s,
///   20s, 40s, capped at 60s by default), cancelled by `disconnect()`
/// - Inbound event routing to the EventDispatcher with message dedup
/// - Outbound fire-and-forget emissions (join/typing/mark-read/signaling)
pub struct ConnectionManager {
    /// Event dispatcher for broadcasting inbound events.
    dispatcher: EventDispatcher,
    /// Current connection state.
    state: Arc<Mutex<ConnectionState>>,
    /// Watch channel for state change notifications.
    state_tx: watch::Sender<ConnectionState>,
    /// Reconnection configuration.
    reconnect_config: ReconnectConfig,
    /// Bearer token for the active session. Cleared on disconnect; its
    /// absence suppresses any pending reconnection.
    token: Arc<Mutex<Option<String>>>,
    /// Number of consecutive reconnection attempts.
    reconnect_attempts: Arc<Mutex<u32>>,
    /// Handle to the background reconnection task.
    reconnect_task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    /// Notify channel to cancel a pending reconnection.
    disconnect_notify: Arc<Notify>,
    /// Recently handled message event keys for deduplication.
    handled_ids: Arc<Mutex<VecDeque<String>>>,
    /// Outbound emission queue, drained by the transport task.
    outbound_tx: mpsc::UnboundedSender<ClientEvent>,
    /// Receiver side of the emission queue, taken once by the transport.
    outbound_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ClientEvent>>>>,
}

impl ConnectionManager {
    /// Create a new ConnectionManager.
    pub fn new(config: &RealtimeConfig, dispatcher: EventDispatcher) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            dispatcher,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            state_tx,
            reconnect_config: ReconnectConfig::from(config),
            token: Arc::new(Mutex::new(None)),
            reconnect_attempts: Arc::new(Mutex::new(0)),
            reconnect_task: Arc::new(Mutex::new(None)),
            disconnect_notify: Arc::new(Notify::new()),
            handled_ids: Arc::new(Mutex::new(VecDeque::new())),
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(Some(outbound_rx))),
        }
    }

    /// Set custom reconnection configuration.
    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect_config = config;
        self
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Get the event dispatcher (for subscribing to events).
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Whether a session token is currently stored.
    pub async fn has_token(&self) -> bool {
        self.token.lock().await.is_some()
    }

    /// Update the connection state and notify watchers.
    async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.lock().await;
        if *state != new_state {
            info!("connection state: {} -> {}", *state, new_state);
            *state = new_state;
            let _ = self.state_tx.send(new_state);
        }
    }

    /// Open the realtime connection authenticated with `token`.
    ///
    /// Idempotent: if already connected or connecting with the same token,
    /// this is a no-op. A different token tears the old session down first.
    pub async fn connect(&self, token: &str) -> KnResult<()> {
        let current_state = self.state().await;
        if current_state == ConnectionState::Connected
            || current_state == ConnectionState::Connecting
        {
            let stored = self.token.lock().await;
            if stored.as_deref() == Some(token) {
                debug!("already connected or connecting with this token, skipping");
                return Ok(());
            }
            drop(stored);
            info!("token changed, tearing down existing connection");
            self.disconnect().await;
        }

        *self.token.lock().await = Some(token.to_string());
        self.set_state(ConnectionState::Connecting).await;

        // In a full implementation, this would open the actual websocket:
        // 1. Connect to the server with the bearer token in the handshake
        // 2. Register listeners for all PushEventType::all_event_names()
        // 3. Route incoming events through process_event()
        // 4. Spawn a task draining outbound_rx into transport emissions
        // 5. Route transport error/close into handle_transport_error()

        self.set_state(ConnectionState::Connected).await;
        *self.reconnect_attempts.lock().await = 0;
        Ok(())
    }

    /// Disconnect and stop any pending reconnection.
    ///
    /// The single teardown path: clears the stored token (so a stale
    /// reconnect timer firing later finds nothing to reconnect with),
    /// cancels the reconnection task, and releases manager resources.
    /// Safe to call from any state.
    pub async fn disconnect(&self) {
        *self.token.lock().await = None;
        self.disconnect_notify.notify_waiters();

        let mut task = self.reconnect_task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
        }
        drop(task);

        self.handled_ids.lock().await.clear();
        self.set_state(ConnectionState::Disconnected).await;
        info!("realtime connection closed");
    }

    /// React to a transport-level error or unexpected close.
    ///
    /// Schedules exactly one reconnection sequence; a second error while
    /// one is already pending is ignored. No reconnection is scheduled
    /// when the token has been cleared by a manual disconnect.
    pub async fn handle_transport_error(self: &Arc<Self>, reason: &str) {
        warn!("transport error: {reason}");
        self.set_state(ConnectionState::Disconnected).await;

        if !self.has_token().await {
            debug!("no session token, not scheduling reconnect");
            return;
        }

        let mut task = self.reconnect_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("reconnection already scheduled, skipping");
            return;
        }

        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            manager.reconnect_loop().await;
        }));
    }

    /// Calculate the reconnection delay using exponential backoff with jitter.
    ///
    /// Sequence: base, 2x, 4x, 8x, capped at max_delay. Jitter of +/-
    /// jitter_factor is applied to prevent synchronized retry storms.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let base = self.reconnect_config.base_delay.as_secs_f64();
        let max = self.reconnect_config.max_delay.as_secs_f64();

        let exponential = (base * 2.0_f64.powi(attempt as i32)).min(max);

        let jitter_range = exponential * self.reconnect_config.jitter_factor;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let delay = (exponential + jitter).max(0.05);

        Duration::from_secs_f64(delay)
    }

    /// Attempt reconnection with exponential backoff.
    ///
    /// Runs until a connection is re-established, max_attempts is reached
    /// (if configured > 0), the token is cleared, or a disconnect cancels
    /// the pending delay.
    pub async fn reconnect_loop(&self) {
        self.set_state(ConnectionState::Reconnecting).await;

        loop {
            let attempt = {
                let mut attempts = self.reconnect_attempts.lock().await;
                *attempts += 1;
                *attempts
            };

            if self.reconnect_config.max_attempts > 0
                && attempt > self.reconnect_config.max_attempts
            {
                error!(
                    "max reconnection attempts ({}) reached",
                    self.reconnect_config.max_attempts
                );
                self.set_state(ConnectionState::Failed).await;
                return;
            }

            let delay = self.reconnect_delay(attempt - 1);
            warn!(
                "reconnection attempt {} in {:.1}s",
                attempt,
                delay.as_secs_f64()
            );

            tokio::select! {
                _ = sleep(delay) => {},
                _ = self.disconnect_notify.notified() => {
                    info!("reconnection cancelled by disconnect");
                    return;
                }
            }

            // A manual disconnect during the delay clears the token
            let token = match self.token.lock().await.clone() {
                Some(t) => t,
                None => {
                    info!("reconnection aborted: no session token");
                    self.set_state(ConnectionState::Disconnected).await;
                    return;
                }
            };

            match self.connect(&token).await {
                Ok(()) => {
                    info!("reconnected after {attempt} attempt(s)");
                    *self.reconnect_attempts.lock().await = 0;
                    return;
                }
                Err(e) => {
                    error!("reconnection attempt {attempt} failed: {e}");
                    self.set_state(ConnectionState::Reconnecting).await;
                }
            }
        }
    }

    /// Process a raw inbound event from the transport.
    ///
    /// Parses the event type and dispatches it through the
    /// EventDispatcher. Message events are deduplicated by event name +
    /// message id, since the transport may replay events after reconnect.
    pub async fn process_event(&self, event_name: &str, data: serde_json::Value) -> KnResult<()> {
        let event_type = PushEventType::from_str(event_name);

        if event_type.is_message_event() {
            if let Some(id) = message_event_id(&event_type, &data) {
                let mut ids = self.handled_ids.lock().await;
                let dedup_key = format!("{event_name}:{id}");
                if ids.contains(&dedup_key) {
                    debug!("duplicate event skipped: {dedup_key}");
                    return Ok(());
                }
                ids.push_back(dedup_key);
                if ids.len() > constants::MAX_HANDLED_MESSAGE_HISTORY {
                    ids.pop_front();
                }
            }
        }

        debug!("push event: {event_name}");
        self.dispatcher.dispatch(PushEvent { event_type, data });
        Ok(())
    }

    /// Queue a fire-and-forget emission to the server.
    ///
    /// Never fails from the caller's point of view: if the transport is
    /// down or the queue is gone, the event is logged and dropped.
    pub fn emit(&self, event: ClientEvent) {
        let name = event.name();
        if self.outbound_tx.send(event).is_err() {
            warn!("outbound queue closed, dropping {name} emission");
        } else {
            debug!("queued outbound {name}");
        }
    }

    /// Take the outbound emission queue receiver.
    ///
    /// Called once by the transport task (or a test harness); subsequent
    /// calls return an error.
    pub async fn outbound_receiver(
        &self,
    ) -> KnResult<mpsc::UnboundedReceiver<ClientEvent>> {
        self.outbound_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| KnError::Internal("outbound receiver already taken".into()))
    }

    /// Clear the deduplication history.
    pub async fn clear_dedup_history(&self) {
        self.handled_ids.lock().await.clear();
    }
}

/// Extract the message id a message event should be deduplicated on.
fn message_event_id(event_type: &PushEventType, data: &serde_json::Value) -> Option<String> {
    let id = if *event_type == PushEventType::NewMessage {
        data.get("message").and_then(|m| m.get("id"))
    } else {
        data.get("messageId")
    };
    id.and_then(|v| v.as_str()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            max_attempts: 0,
            jitter_factor: 0.0,
        }
    }

    fn manager() -> ConnectionManager {
        ConnectionManager::new(&RealtimeConfig::default(), EventDispatcher::new(16))
    }

    #[tokio::test]
    async fn test_manager_starts_disconnected() {
        let manager = manager();
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(!manager.has_token().await);
    }

    #[tokio::test]
    async fn test_connect_disconnect() {
        let manager = manager();

        manager.connect("tok-1").await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Connected);
        assert!(manager.has_token().await);

        manager.disconnect().await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(!manager.has_token().await);
    }

    #[tokio::test]
    async fn test_connect_idempotent_with_same_token() {
        let manager = manager();
        let mut rx = manager.state_receiver();

        manager.connect("tok-1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);

        // Second connect with the same token must not transition state again
        manager.connect("tok-1").await.unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_disconnect_from_any_state_is_safe() {
        let manager = manager();
        manager.disconnect().await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_transport_error_schedules_reconnect() {
        let manager = Arc::new(manager().with_reconnect_config(fast_reconnect()));
        manager.connect("tok-1").await.unwrap();

        manager.handle_transport_error("connection reset").await;
        // The stub connect succeeds, so the loop should land on Connected
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_suppresses_pending_reconnect() {
        let manager = Arc::new(manager().with_reconnect_config(ReconnectConfig {
            base_delay: Duration::from_millis(200),
            ..fast_reconnect()
        }));
        manager.connect("tok-1").await.unwrap();

        manager.handle_transport_error("connection reset").await;
        manager.disconnect().await;

        // Well past the reconnect delay; no reconnection must have happened
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(!manager.has_token().await);
    }

    #[tokio::test]
    async fn test_no_reconnect_without_token() {
        let manager = Arc::new(manager().with_reconnect_config(fast_reconnect()));
        // Never connected, so no token stored
        manager.handle_transport_error("early failure").await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_loop_gives_up_at_max_attempts() {
        let manager = manager().with_reconnect_config(ReconnectConfig {
            max_attempts: 2,
            ..fast_reconnect()
        });
        // Exhaust the attempt budget before entering the loop
        *manager.reconnect_attempts.lock().await = 2;
        *manager.token.lock().await = Some("tok-1".into());

        manager.reconnect_loop().await;
        assert_eq!(manager.state().await, ConnectionState::Failed);
    }

    #[test]
    fn test_reconnect_delay_sequence() {
        let manager = ConnectionManager::new(
            &RealtimeConfig::default(),
            EventDispatcher::new(1),
        );

        // Defaults: ~5s, ~10s, ~20s, ~40s, capped at ~60s, +/- 30% jitter
        let d0 = manager.reconnect_delay(0);
        assert!(d0 >= Duration::from_millis(3_500));
        assert!(d0 <= Duration::from_millis(6_500));

        let d2 = manager.reconnect_delay(2);
        assert!(d2 >= Duration::from_secs(14));

        let d10 = manager.reconnect_delay(10);
        assert!(d10 <= Duration::from_secs(78));
    }

    #[tokio::test]
    async fn test_process_event_dispatches() {
        let dispatcher = EventDispatcher::new(16);
        let mut rx = dispatcher.subscribe();
        let manager = ConnectionManager::new(&RealtimeConfig::default(), dispatcher);

        let data = serde_json::json!({"message": {"id": "m1"}, "chat": {"id": "c1"}});
        manager.process_event("new_message", data).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, PushEventType::NewMessage);
        assert_eq!(event.data["message"]["id"], "m1");
    }

    #[tokio::test]
    async fn test_duplicate_message_event_filtered() {
        let dispatcher = EventDispatcher::new(16);
        let mut rx = dispatcher.subscribe();
        let manager = ConnectionManager::new(&RealtimeConfig::default(), dispatcher);

        let data = serde_json::json!({"message": {"id": "m-dup"}});
        manager.process_event("new_message", data.clone()).await.unwrap();
        manager.process_event("new_message", data).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, PushEventType::NewMessage);

        let second = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_same_id_different_event_types_both_pass() {
        let dispatcher = EventDispatcher::new(16);
        let mut rx = dispatcher.subscribe();
        let manager = ConnectionManager::new(&RealtimeConfig::default(), dispatcher);

        manager
            .process_event(
                "message_delivered",
                serde_json::json!({"messageId": "m1", "chatId": "c1"}),
            )
            .await
            .unwrap();
        manager
            .process_event(
                "message_read",
                serde_json::json!({"messageId": "m1", "chatId": "c1"}),
            )
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type, PushEventType::MessageDelivered);
        assert_eq!(rx.recv().await.unwrap().event_type, PushEventType::MessageRead);
    }

    #[tokio::test]
    async fn test_non_message_events_never_deduplicated() {
        let dispatcher = EventDispatcher::new(16);
        let mut rx = dispatcher.subscribe();
        let manager = ConnectionManager::new(&RealtimeConfig::default(), dispatcher);

        let data = serde_json::json!({"chatId": "c1", "typingUsers": ["u2"]});
        manager.process_event("typing_update", data.clone()).await.unwrap();
        manager.process_event("typing_update", data).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type, PushEventType::TypingUpdate);
        assert_eq!(rx.recv().await.unwrap().event_type, PushEventType::TypingUpdate);
    }

    #[tokio::test]
    async fn test_emit_queues_outbound_event() {
        let manager = manager();
        let mut rx = manager.outbound_receiver().await.unwrap();

        manager.emit(ClientEvent::JoinChat { chat_id: "c1".into() });
        manager.emit(ClientEvent::Typing { chat_id: "c1".into(), is_typing: true });

        assert_eq!(rx.recv().await.unwrap().name(), "join_chat");
        assert_eq!(rx.recv().await.unwrap().name(), "typing");
    }

    #[tokio::test]
    async fn test_outbound_receiver_taken_once() {
        let manager = manager();
        let _rx = manager.outbound_receiver().await.unwrap();
        assert!(manager.outbound_receiver().await.is_err());
    }

    #[tokio::test]
    async fn test_emit_after_receiver_drop_does_not_panic() {
        let manager = manager();
        let rx = manager.outbound_receiver().await.unwrap();
        drop(rx);
        manager.emit(ClientEvent::JoinChat { chat_id: "c1".into() });
    }

    #[tokio::test]
    async fn test_state_watcher() {
        let manager = manager();
        let mut rx = manager.state_receiver();

        manager.connect("tok-1").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Connected);

        manager.disconnect().await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }
}
