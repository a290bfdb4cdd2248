//! Engagement event endpoints.

use tracing::debug;

use kn_core::error::KnResult;

use crate::client::ApiClient;

impl ApiClient {
    /// Record a "significant event" engagement marker.
    ///
    /// This is analytics plumbing, not core functionality: callers treat
    /// it as best-effort and must never let a failure here fail the
    /// primary operation.
    pub async fn record_significant_event(
        &self,
        event_type: &str,
        chat_id: Option<&str>,
    ) -> KnResult<()> {
        let mut body = serde_json::json!({ "eventType": event_type });
        if let Some(chat) = chat_id {
            body["chatId"] = serde_json::Value::String(chat.to_string());
        }
        self.post("/events/significant", &body).await?;
        debug!("significant event recorded: {event_type}");
        Ok(())
    }
}
