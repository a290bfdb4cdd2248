//! Status command: connection, session, and service health.

use console::style;

use kn_core::config::ConfigHandle;
use kn_core::error::KnResult;

use crate::OutputFormat;

pub async fn run(config: ConfigHandle, format: OutputFormat) -> KnResult<()> {
    let (address, has_saved_session) = {
        let cfg = config.read().await;
        (cfg.server.address.clone(), cfg.session.token.is_some())
    };

    if address.is_empty() {
        println!("{} Server not configured", style("WARN").yellow().bold());
        return Ok(());
    }

    let registry = super::build_registry(config).await?;
    let connection_state = registry.manager.state().await.to_string();
    let health = registry.health_check();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "server": address,
                "session_saved": has_saved_session,
                "session_bound": registry.session.is_bound().await,
                "connection": connection_state,
                "services": health.iter().map(|(name, state, healthy)| {
                    serde_json::json!({
                        "name": name,
                        "state": state.to_string(),
                        "healthy": healthy,
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!("{}", style("Kinnect Status").bold().underlined());
            println!("  Server:      {address}");
            println!(
                "  Session:     {}",
                if registry.session.is_bound().await {
                    style("bound").green()
                } else {
                    style("none").yellow()
                }
            );
            println!("  Realtime:    {connection_state}");
            println!();
            println!("{}", style("Services").bold().underlined());
            for (name, state, healthy) in &health {
                let mark = if *healthy {
                    style("*").green()
                } else {
                    style("!").red()
                };
                println!("  {mark} {name:<14} {state}");
            }
        }
    }

    registry.shutdown_all().await;
    Ok(())
}
