//! Shared test utilities for integration tests.

use std::sync::Arc;

use tempfile::TempDir;

use kn_core::config::{AppConfig, ConfigHandle, RealtimeConfig};
use kn_services::event_bus::EventBus;
use kn_services::registry::ServiceRegistry;
use kn_socket::{ConnectionManager, EventDispatcher};

/// Create a test config pointing at an unroutable server (TEST-NET-1),
/// persisting to a temp dir. The TempDir must be held alive for the
/// duration of the test.
pub fn create_test_config_handle(dir: &TempDir) -> ConfigHandle {
    let mut config = AppConfig::default();
    config.server.address = "http://192.0.2.1:9".into();
    config.server.api_timeout_ms = 1_000;
    ConfigHandle::with_path(config, dir.path().join("config.toml"))
}

/// Create an EventBus with a small buffer suitable for tests.
pub fn create_test_event_bus() -> EventBus {
    EventBus::new(64)
}

/// Create an EventDispatcher with a small buffer suitable for tests.
pub fn create_test_dispatcher() -> EventDispatcher {
    EventDispatcher::new(64)
}

/// Create a ConnectionManager with default reconnect policy.
pub fn create_test_manager() -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        &RealtimeConfig::default(),
        create_test_dispatcher(),
    ))
}

/// Build a full registry against the unroutable test server.
pub async fn create_test_registry(dir: &TempDir) -> ServiceRegistry {
    ServiceRegistry::build(create_test_config_handle(dir))
        .await
        .expect("failed to build test registry")
}
