//! Friend-request endpoints.

use kn_core::error::KnResult;
use kn_models::FriendRequest;

use crate::client::ApiClient;
use crate::response::{FriendRequestListResponse, FriendRequestResponse};

impl ApiClient {
    /// Send a friend request to another user.
    pub async fn send_friend_request(
        &self,
        target_user_id: &str,
        message: Option<&str>,
    ) -> KnResult<FriendRequest> {
        let mut body = serde_json::json!({ "targetUserId": target_user_id });
        if let Some(msg) = message {
            body["message"] = serde_json::Value::String(msg.to_string());
        }
        let resp: FriendRequestResponse = self.post_json("/friends/request", &body).await?;
        Ok(resp.request)
    }

    /// Accept a received friend request.
    pub async fn accept_friend_request(&self, request_id: &str) -> KnResult<FriendRequest> {
        let resp: FriendRequestResponse = self
            .post_json(
                &format!("/friends/request/{request_id}/accept"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(resp.request)
    }

    /// Reject a received friend request.
    pub async fn reject_friend_request(&self, request_id: &str) -> KnResult<FriendRequest> {
        let resp: FriendRequestResponse = self
            .post_json(
                &format!("/friends/request/{request_id}/reject"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(resp.request)
    }

    /// Cancel a friend request the caller previously sent.
    pub async fn cancel_friend_request(&self, request_id: &str) -> KnResult<()> {
        self.delete(&format!("/friends/request/{request_id}")).await?;
        Ok(())
    }

    /// List friend requests received by the caller.
    pub async fn get_received_friend_requests(&self) -> KnResult<Vec<FriendRequest>> {
        let resp: FriendRequestListResponse =
            self.get_json("/friends/requests/received").await?;
        Ok(resp.requests)
    }

    /// List friend requests sent by the caller.
    pub async fn get_sent_friend_requests(&self) -> KnResult<Vec<FriendRequest>> {
        let resp: FriendRequestListResponse = self.get_json("/friends/requests/sent").await?;
        Ok(resp.requests)
    }
}
