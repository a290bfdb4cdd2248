//! Chat commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use kn_core::config::ConfigHandle;
use kn_core::error::KnResult;
use kn_models::chat::sort_chats_recent_first;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ChatsAction {
    /// List all chats.
    List {
        /// Number of chats to show per page.
        #[arg(short = 'n', long, default_value = "25")]
        limit: u32,
        /// Page number (1-based).
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
    /// Get or create the direct chat with a user.
    Direct {
        /// Target user id.
        user_id: String,
    },
    /// Mark a chat as read.
    Read {
        /// Chat id.
        chat_id: String,
        /// Specific message ids; marks the whole chat when omitted.
        #[arg(short, long)]
        message: Vec<String>,
    },
}

pub async fn run(config: ConfigHandle, action: ChatsAction, format: OutputFormat) -> KnResult<()> {
    let registry = super::build_authenticated_registry(config).await?;

    match action {
        ChatsAction::List { limit, page } => {
            let (mut chats, pagination) = registry.chats.get_chats(page, limit).await?;
            sort_chats_recent_first(&mut chats);

            let own_user_id = registry
                .config
                .read()
                .await
                .session
                .user_id
                .clone()
                .unwrap_or_default();

            match format {
                OutputFormat::Json => {
                    let json: Vec<_> = chats
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "id": c.id,
                                "name": c.display_name(&own_user_id),
                                "type": c.chat_type,
                                "pinned": c.is_pinned,
                                "muted": c.is_muted,
                                "last_seen": c.last_seen,
                                "unread_count": c.unread_count,
                                "last_message": c.last_message.as_ref().map(|m| &m.preview),
                                "updated_at": c.updated_at,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
                }
                OutputFormat::Text => {
                    if chats.is_empty() {
                        println!("No chats found.");
                    } else {
                        let mut table = Table::new();
                        table
                            .load_preset(UTF8_FULL)
                            .apply_modifier(UTF8_ROUND_CORNERS)
                            .set_content_arrangement(ContentArrangement::Dynamic);
                        table.set_header(vec!["Chat", "Last Message", "Date", "Unread"]);

                        for chat in &chats {
                            let mut name = super::truncate(&chat.display_name(&own_user_id), 30);
                            if chat.is_pinned {
                                name.push_str(" [P]");
                            }
                            let last = chat
                                .last_message
                                .as_ref()
                                .and_then(|m| m.preview.as_deref())
                                .map(|p| super::truncate(p, 40))
                                .unwrap_or_else(|| "-".into());
                            let date = chat
                                .updated_at
                                .as_deref()
                                .map(super::short_date)
                                .unwrap_or("-");
                            let unread = if chat.unread_count > 0 {
                                chat.unread_count.to_string()
                            } else {
                                "-".into()
                            };
                            table.add_row(vec![name, last, date.to_string(), unread]);
                        }

                        println!("{table}");
                        if let Some(p) = pagination {
                            println!("\nPage {}/{} ({} total chats)", p.page, p.total_pages, p.total);
                        }
                    }
                }
            }
        }
        ChatsAction::Direct { user_id } => {
            let chat = registry.chats.create_or_get_direct_chat(&user_id).await?;
            match format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "id": chat.id,
                            "type": chat.chat_type,
                            "participants": chat.participants.iter().map(|p| &p.id).collect::<Vec<_>>(),
                        }))
                        .unwrap_or_default()
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{} Direct chat ready: {}",
                        style("OK").green().bold(),
                        chat.id
                    );
                }
            }
        }
        ChatsAction::Read { chat_id, message } => {
            registry.chats.mark_messages_as_read(&chat_id, &message).await?;
            if message.is_empty() {
                println!("{} Chat marked as read: {chat_id}", style("OK").green().bold());
            } else {
                println!(
                    "{} {} message(s) marked as read in {chat_id}",
                    style("OK").green().bold(),
                    message.len()
                );
            }
        }
    }

    registry.shutdown_all().await;
    Ok(())
}
