//! Service registry for dependency injection and lifecycle management.
//!
//! The registry is the explicitly-owned root object of the client stack.
//! It wires core infrastructure (config, API client, connection manager,
//! event bus) into the services, initializes them in dependency order,
//! and hands out shared references. Hosts own the registry; nothing in
//! this crate is reachable through a global.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use kn_api::ApiClient;
use kn_core::config::ConfigHandle;
use kn_core::error::{KnError, KnResult};
use kn_socket::{ConnectionManager, EventDispatcher};

use crate::chat::ChatService;
use crate::dispatcher::EventRouter;
use crate::event_bus::EventBus;
use crate::friend::FriendService;
use crate::message::MessageService;
use crate::service::{Service, ServiceState};
use crate::session::SessionService;

/// Central service registry that manages all application services.
pub struct ServiceRegistry {
    /// Application configuration.
    pub config: ConfigHandle,
    /// HTTP API client. Cloneable; all clones share the session token.
    pub api: ApiClient,
    /// Realtime connection manager.
    pub manager: Arc<ConnectionManager>,
    /// Application-level event bus.
    pub event_bus: EventBus,
    /// Push-event router.
    pub router: Arc<EventRouter>,
    /// Conversation-level operations.
    pub chats: Arc<ChatService>,
    /// Message-level operations.
    pub messages: Arc<MessageService>,
    /// Friend-request operations.
    pub friends: Arc<FriendService>,
    /// Session binding.
    pub session: Arc<SessionService>,
    /// Services in initialization order.
    services: Vec<Arc<dyn Service>>,
    /// Background tasks started by `start`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceRegistry {
    /// Build the full service graph from configuration.
    ///
    /// Fails if the server address is not configured. Does not touch the
    /// network; `SessionService::bind` (or `restore`) does that.
    pub async fn build(config: ConfigHandle) -> KnResult<Self> {
        let (server, realtime) = {
            let cfg = config.read().await;
            (cfg.server.clone(), cfg.realtime.clone())
        };

        let api = ApiClient::new(&server)?;
        let manager = Arc::new(ConnectionManager::new(
            &realtime,
            EventDispatcher::new(256),
        ));
        let event_bus = EventBus::new(256);

        let router = Arc::new(EventRouter::new(event_bus.clone()));
        let chats = Arc::new(ChatService::new(
            api.clone(),
            Arc::clone(&manager),
            event_bus.clone(),
        ));
        let messages = Arc::new(MessageService::new(api.clone(), event_bus.clone()));
        let friends = Arc::new(FriendService::new(api.clone()));
        let session = Arc::new(SessionService::new(
            config.clone(),
            api.clone(),
            Arc::clone(&manager),
            Arc::clone(&router),
            Arc::clone(&messages),
        ));

        let services: Vec<Arc<dyn Service>> = vec![
            Arc::clone(&router) as Arc<dyn Service>,
            Arc::clone(&chats) as Arc<dyn Service>,
            Arc::clone(&messages) as Arc<dyn Service>,
            Arc::clone(&friends) as Arc<dyn Service>,
            Arc::clone(&session) as Arc<dyn Service>,
        ];

        Ok(Self {
            config,
            api,
            manager,
            event_bus,
            router,
            chats,
            messages,
            friends,
            session,
            services,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Initialize all registered services in order.
    pub fn init_all(&self) -> KnResult<()> {
        info!("initializing {} services", self.services.len());
        for service in &self.services {
            let name = service.name().to_string();
            if let Err(e) = service.init() {
                error!("failed to initialize service {name}: {e}");
                return Err(KnError::ServiceInit(format!("{name}: {e}")));
            }
        }
        info!("all services initialized");
        Ok(())
    }

    /// Start the background tasks: the push-event listener and the
    /// connection-state watcher.
    pub async fn start(&self) {
        let listener =
            EventRouter::start_listener(Arc::clone(&self.router), self.manager.dispatcher());
        let watcher = EventRouter::start_state_watcher(
            self.event_bus.clone(),
            self.manager.state_receiver(),
        );

        let mut tasks = self.tasks.lock().await;
        tasks.push(listener);
        tasks.push(watcher);
    }

    /// Shut down all services in reverse order and stop background tasks.
    ///
    /// Disconnects the realtime transport but leaves the persisted
    /// session intact; `SessionService::unbind` is the logout path.
    pub async fn shutdown_all(&self) {
        info!("shutting down services");
        self.manager.disconnect().await;

        for service in self.services.iter().rev() {
            if let Err(e) = service.shutdown() {
                // Continue shutting down the rest
                error!("error shutting down service {}: {e}", service.name());
            }
        }

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("all services shut down");
    }

    /// Get the health status of all services.
    pub fn health_check(&self) -> Vec<(String, ServiceState, bool)> {
        self.services
            .iter()
            .map(|s| (s.name().to_string(), s.state(), s.is_healthy()))
            .collect()
    }

    /// Get the number of registered services.
    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kn_core::config::AppConfig;

    fn config(dir: &tempfile::TempDir) -> ConfigHandle {
        let mut cfg = AppConfig::default();
        cfg.server.address = "http://192.0.2.1:9".into();
        ConfigHandle::with_path(cfg, dir.path().join("config.toml"))
    }

    #[tokio::test]
    async fn test_build_requires_server_address() {
        let cfg = ConfigHandle::new(AppConfig::default());
        assert!(ServiceRegistry::build(cfg).await.is_err());
    }

    #[tokio::test]
    async fn test_init_and_shutdown() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = ServiceRegistry::build(config(&dir)).await.unwrap();
        assert_eq!(registry.service_count(), 5);

        registry.init_all().unwrap();
        registry.start().await;

        for (name, state, healthy) in registry.health_check() {
            assert!(healthy, "service {name} is not healthy (state: {state})");
        }

        registry.shutdown_all().await;
        for (_, state, _) in registry.health_check() {
            assert_eq!(state, ServiceState::Stopped);
        }
    }
}
