//! Service trait and lifecycle management.
//!
//! All services implement the `Service` trait which provides a standard
//! lifecycle (init, shutdown) and health checking interface. Services are
//! shared as `Arc`s, so lifecycle methods take `&self` and each service
//! tracks its state in a `StateCell`.

use std::sync::Mutex;

use kn_core::error::KnResult;

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Service has been created but not initialized.
    Created,
    /// Service is initializing.
    Initializing,
    /// Service is running and ready.
    Running,
    /// Service is shutting down.
    ShuttingDown,
    /// Service has been stopped.
    Stopped,
    /// Service encountered a fatal error.
    Failed,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Interior-mutable holder for a service's lifecycle state.
#[derive(Debug)]
pub struct StateCell(Mutex<ServiceState>);

impl StateCell {
    pub fn new() -> Self {
        Self(Mutex::new(ServiceState::Created))
    }

    pub fn get(&self) -> ServiceState {
        // A poisoned state lock means a panic mid-transition; report Failed.
        self.0
            .lock()
            .map(|guard| *guard)
            .unwrap_or(ServiceState::Failed)
    }

    pub fn set(&self, state: ServiceState) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = state;
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait that all Kinnect services must implement.
///
/// Provides a standard lifecycle and health-checking interface.
/// Services are initialized in dependency order by the ServiceRegistry.
pub trait Service: Send + Sync {
    /// Human-readable name of this service.
    fn name(&self) -> &str;

    /// Current state of this service.
    fn state(&self) -> ServiceState;

    /// Initialize the service. Called once during application startup.
    fn init(&self) -> KnResult<()>;

    /// Gracefully shut down the service. Called during application teardown.
    fn shutdown(&self) -> KnResult<()>;

    /// Health check. Returns true if the service is operational.
    fn is_healthy(&self) -> bool {
        self.state() == ServiceState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestService {
        state: StateCell,
    }

    impl Service for TestService {
        fn name(&self) -> &str { "test" }
        fn state(&self) -> ServiceState { self.state.get() }
        fn init(&self) -> KnResult<()> {
            self.state.set(ServiceState::Running);
            Ok(())
        }
        fn shutdown(&self) -> KnResult<()> {
            self.state.set(ServiceState::Stopped);
            Ok(())
        }
    }

    #[test]
    fn test_service_lifecycle() {
        let svc = TestService { state: StateCell::new() };
        assert!(!svc.is_healthy());
        svc.init().unwrap();
        assert!(svc.is_healthy());
        svc.shutdown().unwrap();
        assert!(!svc.is_healthy());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ServiceState::Running.to_string(), "running");
        assert_eq!(ServiceState::ShuttingDown.to_string(), "shutting_down");
    }
}
