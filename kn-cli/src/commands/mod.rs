//! CLI command implementations.

pub mod connect;
pub mod status;
pub mod chats;
pub mod messages;
pub mod friends;
pub mod listen;

use std::sync::Arc;

use kn_core::config::ConfigHandle;
use kn_core::error::{KnError, KnResult};
use kn_services::ServiceRegistry;

/// Build the full service stack from config, initialize it, and restore
/// the persisted session if one exists.
pub async fn build_registry(config: ConfigHandle) -> KnResult<Arc<ServiceRegistry>> {
    if !config.read().await.is_server_configured() {
        return Err(KnError::MissingConfig(
            "no server address configured; run `kinnect connect --address <url>` first".into(),
        ));
    }

    let registry = Arc::new(ServiceRegistry::build(config).await?);
    registry.init_all()?;
    registry.start().await;
    registry.session.restore().await?;
    Ok(registry)
}

/// Like `build_registry`, but fails when no session is available.
pub async fn build_authenticated_registry(
    config: ConfigHandle,
) -> KnResult<Arc<ServiceRegistry>> {
    let registry = build_registry(config).await?;
    if !registry.session.is_bound().await {
        return Err(KnError::AuthRequired(
            "no saved session; run `kinnect connect --token <token>` first".into(),
        ));
    }
    Ok(registry)
}

/// Truncate a string to a maximum length, appending an ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{cut}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

/// Shorten an ISO-8601 timestamp to its date part for table display.
pub fn short_date(ts: &str) -> &str {
    if ts.len() > 10 {
        &ts[..10]
    } else {
        ts
    }
}
