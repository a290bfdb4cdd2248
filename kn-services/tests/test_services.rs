//! Service lifecycle and registry integration tests.

mod common;

use kn_services::event_bus::AppEvent;
use kn_services::service::ServiceState;
use kn_socket::ClientEvent;

#[tokio::test]
async fn registry_builds_full_service_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;

    assert_eq!(registry.service_count(), 5);
    let names: Vec<String> = registry
        .health_check()
        .into_iter()
        .map(|(name, _, _)| name)
        .collect();
    assert_eq!(
        names,
        vec!["event_router", "chat", "message", "friend", "session"]
    );
}

#[tokio::test]
async fn registry_lifecycle_transitions() {
    let dir = tempfile::TempDir::new().unwrap();
    let registry = common::create_test_registry(&dir).await;

    for (_, state, healthy) in registry.health_check() {
        assert_eq!(state, ServiceState::Created);
        assert!(!healthy);
    }

    registry.init_all().unwrap();
    for (name, state, healthy) in registry.health_check() {
        assert_eq!(state, ServiceState::Running, "{name} not running");
        assert!(healthy);
    }

    registry.shutdown_all().await;
    for (_, state, healthy) in registry.health_check() {
        assert_eq!(state, ServiceState::Stopped);
        assert!(!healthy);
    }
}

#[tokio::test]
async fn event_bus_fans_out_to_all_subscribers() {
    let bus = common::create_test_event_bus();
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    bus.emit(AppEvent::ConnectionStateChanged {
        connected: true,
        state: "connected".into(),
    });

    for rx in [&mut rx1, &mut rx2] {
        match rx.recv().await.unwrap() {
            AppEvent::ConnectionStateChanged { connected, .. } => assert!(connected),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[tokio::test]
async fn manager_emission_survives_without_transport_consumer() {
    // Emitting before anything drains the outbound queue must not panic
    // or error; the queue simply buffers.
    let manager = common::create_test_manager();
    manager.emit(ClientEvent::JoinChat {
        chat_id: "c1".into(),
    });

    let mut rx = manager.outbound_receiver().await.unwrap();
    assert_eq!(rx.recv().await.unwrap().name(), "join_chat");
}
