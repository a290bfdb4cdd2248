//! Session service: binds an authenticated session to the whole stack.
//!
//! Login and logout are the only places where the session token crosses
//! service boundaries. Binding a session pushes the token into the HTTP
//! client, connects the realtime transport, and tells the event router
//! and message service who the authenticated user is. Unbinding reverses
//! all of it.

use std::sync::Arc;

use tracing::{info, warn};

use kn_api::ApiClient;
use kn_core::config::ConfigHandle;
use kn_core::error::KnResult;
use kn_models::UserSummary;
use kn_socket::ConnectionManager;

use crate::dispatcher::EventRouter;
use crate::message::MessageService;
use crate::service::{Service, ServiceState, StateCell};

pub struct SessionService {
    state: StateCell,
    config: ConfigHandle,
    api: ApiClient,
    manager: Arc<ConnectionManager>,
    router: Arc<EventRouter>,
    message: Arc<MessageService>,
}

impl SessionService {
    pub fn new(
        config: ConfigHandle,
        api: ApiClient,
        manager: Arc<ConnectionManager>,
        router: Arc<EventRouter>,
        message: Arc<MessageService>,
    ) -> Self {
        Self {
            state: StateCell::new(),
            config,
            api,
            manager,
            router,
            message,
        }
    }

    /// Bind a session: install the token everywhere and connect.
    ///
    /// Persisting the token to the config file is best-effort; a failed
    /// save is logged and does not invalidate the in-memory session.
    pub async fn bind(&self, token: &str, user: UserSummary) -> KnResult<()> {
        self.api.set_token(Some(token.to_string())).await;
        self.router.set_own_user_id(Some(user.id.clone())).await;
        self.message.set_own_user(user.clone()).await;

        self.manager.connect(token).await?;
        info!("session bound for user {}", user.id);

        {
            let mut config = self.config.write().await;
            config.session.token = Some(token.to_string());
            config.session.user_id = Some(user.id);
        }
        if let Err(e) = self.config.save().await {
            warn!("could not persist session: {e}");
        }
        Ok(())
    }

    /// Rebind from a previously persisted session, if one exists.
    pub async fn restore(&self) -> KnResult<bool> {
        let (token, user_id) = {
            let config = self.config.read().await;
            (
                config.session.token.clone(),
                config.session.user_id.clone(),
            )
        };
        let Some(token) = token else {
            return Ok(false);
        };

        let user = UserSummary {
            id: user_id.unwrap_or_default(),
            ..UserSummary::default()
        };
        self.bind(&token, user).await?;
        Ok(true)
    }

    /// Unbind the session: disconnect and clear the token everywhere.
    pub async fn unbind(&self) {
        self.manager.disconnect().await;
        self.api.set_token(None).await;
        self.router.set_own_user_id(None).await;
        self.message.set_own_user(UserSummary::default()).await;

        {
            let mut config = self.config.write().await;
            config.session.token = None;
            config.session.user_id = None;
        }
        if let Err(e) = self.config.save().await {
            warn!("could not clear persisted session: {e}");
        }
        info!("session unbound");
    }

    /// Whether a session token is currently installed.
    pub async fn is_bound(&self) -> bool {
        self.api.has_token().await
    }
}

impl Service for SessionService {
    fn name(&self) -> &str {
        "session"
    }
    fn state(&self) -> ServiceState {
        self.state.get()
    }
    fn init(&self) -> KnResult<()> {
        self.state.set(ServiceState::Running);
        info!("session service initialized");
        Ok(())
    }
    fn shutdown(&self) -> KnResult<()> {
        self.state.set(ServiceState::Stopped);
        info!("session service stopped");
        Ok(())
    }
}
