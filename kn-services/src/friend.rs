//! Friend-request service.

use tracing::info;

use kn_api::ApiClient;
use kn_core::error::KnResult;
use kn_models::FriendRequest;

use crate::service::{Service, ServiceState, StateCell};

/// Friend-request operations. Thin proxies over the REST endpoints; the
/// server owns all state transitions.
pub struct FriendService {
    state: StateCell,
    api: ApiClient,
}

impl FriendService {
    pub fn new(api: ApiClient) -> Self {
        Self {
            state: StateCell::new(),
            api,
        }
    }

    /// Send a friend request, optionally with an introduction message.
    pub async fn send_friend_request(
        &self,
        target_user_id: &str,
        message: Option<&str>,
    ) -> KnResult<FriendRequest> {
        let request = self.api.send_friend_request(target_user_id, message).await?;
        info!("friend request sent to {target_user_id}: {}", request.id);
        Ok(request)
    }

    /// Accept a received friend request.
    pub async fn accept_friend_request(&self, request_id: &str) -> KnResult<FriendRequest> {
        self.api.accept_friend_request(request_id).await
    }

    /// Reject a received friend request.
    pub async fn reject_friend_request(&self, request_id: &str) -> KnResult<FriendRequest> {
        self.api.reject_friend_request(request_id).await
    }

    /// Cancel a friend request the user sent.
    pub async fn cancel_friend_request(&self, request_id: &str) -> KnResult<()> {
        self.api.cancel_friend_request(request_id).await
    }

    /// List friend requests received by the user.
    pub async fn get_received_requests(&self) -> KnResult<Vec<FriendRequest>> {
        self.api.get_received_friend_requests().await
    }

    /// List friend requests the user has sent.
    pub async fn get_sent_requests(&self) -> KnResult<Vec<FriendRequest>> {
        self.api.get_sent_friend_requests().await
    }
}

impl Service for FriendService {
    fn name(&self) -> &str {
        "friend"
    }
    fn state(&self) -> ServiceState {
        self.state.get()
    }
    fn init(&self) -> KnResult<()> {
        self.state.set(ServiceState::Running);
        info!("friend service initialized");
        Ok(())
    }
    fn shutdown(&self) -> KnResult<()> {
        self.state.set(ServiceState::Stopped);
        info!("friend service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kn_core::config::ServerConfig;
    use kn_core::error::KnError;

    #[tokio::test]
    async fn test_requests_require_session_token() {
        let api = ApiClient::new(&ServerConfig {
            address: "http://192.0.2.1:9".into(),
            api_timeout_ms: 1_000,
        })
        .unwrap()
        .with_retry_config(kn_api::RetryConfig::none());
        let svc = FriendService::new(api);

        let err = svc.send_friend_request("u2", None).await.unwrap_err();
        assert!(matches!(err, KnError::AuthRequired(_)));

        let err = svc.get_received_requests().await.unwrap_err();
        assert!(matches!(err, KnError::AuthRequired(_)));
    }
}
