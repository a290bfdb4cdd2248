//! Friend-request commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use kn_core::config::ConfigHandle;
use kn_core::error::KnResult;
use kn_models::FriendRequest;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum FriendsAction {
    /// Send a friend request.
    Add {
        /// Target user id.
        user_id: String,
        /// Optional introduction message.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Accept a received friend request.
    Accept {
        /// Request id.
        request_id: String,
    },
    /// Reject a received friend request.
    Reject {
        /// Request id.
        request_id: String,
    },
    /// Cancel a friend request you sent.
    Cancel {
        /// Request id.
        request_id: String,
    },
    /// List received friend requests.
    Received,
    /// List sent friend requests.
    Sent,
}

fn print_requests(requests: &[FriendRequest], format: OutputFormat, incoming: bool) {
    match format {
        OutputFormat::Json => {
            let json: Vec<_> = requests
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "from": r.sender.name,
                        "to": r.recipient.name,
                        "status": r.status,
                        "message": r.message,
                        "created_at": r.created_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            if requests.is_empty() {
                println!("No friend requests.");
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            let who = if incoming { "From" } else { "To" };
            table.set_header(vec!["Id", who, "Status", "Message", "Date"]);

            for r in requests {
                let name = if incoming { &r.sender.name } else { &r.recipient.name };
                table.add_row(vec![
                    r.id.clone(),
                    super::truncate(name, 20),
                    r.status.as_str().to_string(),
                    r.message
                        .as_deref()
                        .map(|m| super::truncate(m, 30))
                        .unwrap_or_else(|| "-".into()),
                    r.created_at
                        .as_deref()
                        .map(super::short_date)
                        .unwrap_or("-")
                        .to_string(),
                ]);
            }
            println!("{table}");
        }
    }
}

pub async fn run(
    config: ConfigHandle,
    action: FriendsAction,
    format: OutputFormat,
) -> KnResult<()> {
    let registry = super::build_authenticated_registry(config).await?;

    match action {
        FriendsAction::Add { user_id, message } => {
            let request = registry
                .friends
                .send_friend_request(&user_id, message.as_deref())
                .await?;
            println!(
                "{} Friend request sent: {}",
                style("OK").green().bold(),
                request.id
            );
        }
        FriendsAction::Accept { request_id } => {
            registry.friends.accept_friend_request(&request_id).await?;
            println!("{} Friend request accepted", style("OK").green().bold());
        }
        FriendsAction::Reject { request_id } => {
            registry.friends.reject_friend_request(&request_id).await?;
            println!("{} Friend request rejected", style("OK").green().bold());
        }
        FriendsAction::Cancel { request_id } => {
            registry.friends.cancel_friend_request(&request_id).await?;
            println!("{} Friend request cancelled", style("OK").green().bold());
        }
        FriendsAction::Received => {
            let requests = registry.friends.get_received_requests().await?;
            print_requests(&requests, format, true);
        }
        FriendsAction::Sent => {
            let requests = registry.friends.get_sent_requests().await?;
            print_requests(&requests, format, false);
        }
    }

    registry.shutdown_all().await;
    Ok(())
}
