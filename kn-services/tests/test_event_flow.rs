//! End-to-end event flow integration tests.
//!
//! Tests the complete realtime pipeline: raw transport event ->
//! ConnectionManager dedup -> EventDispatcher -> EventRouter -> AppEvent,
//! plus connection state mirroring and the session bind/unbind flow.

mod common;

use std::time::Duration;

use kn_models::UserSummary;
use kn_services::event_bus::AppEvent;
use kn_socket::ConnectionState;

fn new_message_payload(message_id: &str, chat_id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "message": {
            "id": message_id,
            "chatId": chat_id,
            "sender": {"id": "u2", "name": "Jordan"},
            "messageType": "text",
            "status": "sent",
            "text": text,
            "createdAt": "2026-03-01T09:00:00Z",
        },
        "chat": {"id": chat_id, "chatType": "direct"},
    })
}

// ---- Full incoming message pipeline ----

#[tokio::test]
async fn e2e_incoming_message_reaches_app_event_bus() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;
    registry.init_all().unwrap();
    registry.start().await;
    let mut rx = registry.event_bus.subscribe();

    registry
        .manager
        .process_event("new_message", new_message_payload("e2e-m1", "c1", "hello"))
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        AppEvent::MessageReceived { message, chat_id } => {
            assert_eq!(message.id, "e2e-m1");
            assert_eq!(message.text.as_deref(), Some("hello"));
            assert_eq!(chat_id, "c1");
        }
        other => panic!("expected MessageReceived, got {other:?}"),
    }

    registry.shutdown_all().await;
}

#[tokio::test]
async fn e2e_replayed_message_event_is_deduplicated() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;
    registry.init_all().unwrap();
    registry.start().await;
    let mut rx = registry.event_bus.subscribe();

    // The transport replays events after a reconnect; the second copy
    // must be swallowed before it reaches any consumer.
    let payload = new_message_payload("e2e-m2", "c1", "once");
    registry
        .manager
        .process_event("new_message", payload.clone())
        .await
        .unwrap();
    registry
        .manager
        .process_event("new_message", payload)
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, AppEvent::MessageReceived { .. }));

    let second = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(second.is_err(), "duplicate event must not be re-emitted");

    registry.shutdown_all().await;
}

// ---- Receipt and lifecycle events ----

#[tokio::test]
async fn e2e_read_receipt_flows_through() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;
    registry.init_all().unwrap();
    registry.start().await;
    let mut rx = registry.event_bus.subscribe();

    registry
        .manager
        .process_event(
            "message_read",
            serde_json::json!({
                "messageId": "m9",
                "chatId": "c1",
                "readBy": "u2",
                "readAt": "2026-03-01T09:05:00Z",
            }),
        )
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        AppEvent::MessageRead {
            message_id,
            chat_id,
            read_by,
        } => {
            assert_eq!(message_id, "m9");
            assert_eq!(chat_id, "c1");
            assert_eq!(read_by.as_deref(), Some("u2"));
        }
        other => panic!("expected MessageRead, got {other:?}"),
    }

    registry.shutdown_all().await;
}

#[tokio::test]
async fn e2e_typing_update_flows_through() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;
    registry.init_all().unwrap();
    registry.start().await;
    let mut rx = registry.event_bus.subscribe();

    registry
        .manager
        .process_event(
            "typing_update",
            serde_json::json!({"chatId": "c1", "typingUsers": ["u2", "u3"]}),
        )
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        AppEvent::TypingChanged {
            chat_id,
            typing_users,
        } => {
            assert_eq!(chat_id, "c1");
            assert_eq!(typing_users, vec!["u2", "u3"]);
        }
        other => panic!("expected TypingChanged, got {other:?}"),
    }

    registry.shutdown_all().await;
}

// ---- Connection state mirroring ----

#[tokio::test]
async fn e2e_connection_state_mirrored_onto_bus() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;
    registry.init_all().unwrap();
    registry.start().await;
    let mut rx = registry.event_bus.subscribe();

    registry.manager.connect("tok-1").await.unwrap();

    // connect transitions Connecting then Connected; both are mirrored
    let mut saw_connected = false;
    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            Ok(Ok(AppEvent::ConnectionStateChanged { connected, .. })) => {
                if connected {
                    saw_connected = true;
                    break;
                }
            }
            Ok(Ok(other)) => panic!("unexpected event: {other:?}"),
            _ => break,
        }
    }
    assert!(saw_connected, "Connected state never reached the bus");

    registry.shutdown_all().await;
}

// ---- Session binding ----

#[tokio::test]
async fn e2e_session_bind_wires_token_and_unread_counts() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;
    registry.init_all().unwrap();
    registry.start().await;

    let user = UserSummary {
        id: "me".into(),
        name: "Me".into(),
        ..Default::default()
    };
    registry.session.bind("tok-1", user).await.unwrap();
    assert!(registry.api.has_token().await);
    assert_eq!(registry.manager.state().await, ConnectionState::Connected);

    // chat_updated now resolves the bound user's unread count
    let mut rx = registry.event_bus.subscribe();
    registry
        .manager
        .process_event(
            "chat_updated",
            serde_json::json!({
                "chatId": "c1",
                "unreadCounts": [
                    {"userId": "me", "unreadCount": 2},
                    {"userId": "u2", "unreadCount": 7},
                ],
            }),
        )
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        AppEvent::ChatUpdated {
            chat_id,
            unread_count,
        } => {
            assert_eq!(chat_id, "c1");
            assert_eq!(unread_count, Some(2));
        }
        other => panic!("expected ChatUpdated, got {other:?}"),
    }

    registry.session.unbind().await;
    assert!(!registry.api.has_token().await);
    assert_eq!(
        registry.manager.state().await,
        ConnectionState::Disconnected
    );

    registry.shutdown_all().await;
}

// ---- Outbound emissions through the service layer ----

#[tokio::test]
async fn e2e_outbound_emissions_reach_transport_queue() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;
    registry.init_all().unwrap();

    let mut outbound = registry.manager.outbound_receiver().await.unwrap();

    registry.chats.join_chat("c1");
    registry.chats.send_typing("c1", true);
    registry
        .chats
        .send_ice_candidate(serde_json::json!({"candidate": "udp 1 ..."}));

    assert_eq!(outbound.recv().await.unwrap().name(), "join_chat");
    assert_eq!(outbound.recv().await.unwrap().name(), "typing");
    assert_eq!(outbound.recv().await.unwrap().name(), "ice_candidate");

    registry.shutdown_all().await;
}
