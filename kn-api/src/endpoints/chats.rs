//! Chat endpoints.

use kn_core::error::KnResult;
use kn_models::Chat;

use crate::client::ApiClient;
use crate::response::{ChatListResponse, ChatResponse, Pagination};

impl ApiClient {
    /// Get the caller's chat list, paginated.
    pub async fn get_chats(
        &self,
        page: u32,
        limit: u32,
    ) -> KnResult<(Vec<Chat>, Option<Pagination>)> {
        let resp: ChatListResponse = self
            .get_json(&format!("/chats?page={page}&limit={limit}"))
            .await?;
        Ok((resp.chats, resp.pagination))
    }

    /// Get or create the direct chat with `target_user_id`.
    ///
    /// Idempotent on the server: requesting an existing direct chat
    /// returns the same record.
    pub async fn create_or_get_direct_chat(&self, target_user_id: &str) -> KnResult<Chat> {
        let body = serde_json::json!({ "targetUserId": target_user_id });
        let resp: ChatResponse = self.post_json("/chats/direct", &body).await?;
        Ok(resp.chat)
    }
}
