//! Connect command: configure the server and bind a session.

use console::style;

use kn_core::config::{AppConfig, ConfigHandle};
use kn_core::error::KnResult;
use kn_models::UserSummary;

pub async fn run(
    config: ConfigHandle,
    address: Option<String>,
    token: Option<String>,
    user: Option<String>,
    save: bool,
) -> KnResult<()> {
    if let Some(address) = address {
        let sanitized = AppConfig::sanitize_server_address(&address);
        config.write().await.server.address = sanitized.clone();
        println!("Server address set to {}", style(&sanitized).cyan());
    }

    let registry = super::build_registry(config.clone()).await?;

    if let Some(token) = token {
        let user = UserSummary {
            id: user.unwrap_or_default(),
            ..UserSummary::default()
        };
        registry.session.bind(&token, user).await?;
        println!("{} Session bound and realtime connected", style("OK").green().bold());
    } else if registry.session.is_bound().await {
        println!("{} Using saved session", style("OK").green().bold());
    } else {
        println!(
            "{} No session token; pass --token to authenticate",
            style("WARN").yellow().bold()
        );
    }

    if save {
        config.save().await?;
        println!("Configuration saved");
    }

    registry.shutdown_all().await;
    Ok(())
}
