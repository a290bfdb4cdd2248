//! Message commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use kn_api::endpoints::messages::MediaUpload;
use kn_core::config::ConfigHandle;
use kn_core::error::{KnError, KnResult};
use kn_models::MessageKind;

use crate::OutputFormat;

/// Media kind for uploads.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum MediaKind {
    Image,
    Voice,
    Video,
    Document,
}

impl From<MediaKind> for MessageKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => MessageKind::Image,
            MediaKind::Voice => MessageKind::Voice,
            MediaKind::Video => MessageKind::Video,
            MediaKind::Document => MessageKind::Document,
        }
    }
}

#[derive(Subcommand)]
pub enum MessagesAction {
    /// List messages in a chat.
    List {
        /// Chat id.
        chat_id: String,
        /// Number of messages per page.
        #[arg(short = 'n', long, default_value = "25")]
        limit: u32,
        /// Page number (1-based).
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
    /// Send a text message.
    Send {
        /// Chat id.
        chat_id: String,
        /// Message text.
        text: String,
        /// Message id this is a reply to.
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Send a media file.
    SendMedia {
        /// Chat id.
        chat_id: String,
        /// Path to the media file.
        file: String,
        /// Media kind.
        #[arg(short, long, default_value = "image")]
        kind: MediaKind,
        /// MIME type; guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
        /// Duration in seconds (voice and video).
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Edit a text message.
    Edit {
        /// Message id.
        message_id: String,
        /// New text.
        text: String,
    },
    /// Delete a message.
    Delete {
        /// Chat id.
        chat_id: String,
        /// Message id.
        message_id: String,
        /// Delete for all participants instead of only this account.
        #[arg(long)]
        for_everyone: bool,
    },
}

/// Guess a MIME type from a file extension.
fn guess_mime(path: &std::path::Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
        .as_str()
    {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

pub async fn run(
    config: ConfigHandle,
    action: MessagesAction,
    format: OutputFormat,
) -> KnResult<()> {
    let registry = super::build_authenticated_registry(config).await?;

    match action {
        MessagesAction::List {
            chat_id,
            limit,
            page,
        } => {
            let (messages, pagination) = registry
                .messages
                .get_chat_messages(&chat_id, page, limit)
                .await?;

            match format {
                OutputFormat::Json => {
                    let json: Vec<_> = messages
                        .iter()
                        .map(|m| {
                            serde_json::json!({
                                "id": m.id,
                                "sender": m.sender.name,
                                "kind": m.kind,
                                "text": m.text,
                                "status": m.status,
                                "edited": m.is_edited,
                                "deleted": m.is_deleted,
                                "created_at": m.created_at,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
                }
                OutputFormat::Text => {
                    if messages.is_empty() {
                        println!("No messages in {chat_id}.");
                    } else {
                        let mut table = Table::new();
                        table
                            .load_preset(UTF8_FULL)
                            .apply_modifier(UTF8_ROUND_CORNERS)
                            .set_content_arrangement(ContentArrangement::Dynamic);
                        table.set_header(vec!["Sender", "Message", "Date", "Status"]);

                        for m in &messages {
                            let text = if m.is_deleted {
                                style("(deleted)").dim().to_string()
                            } else {
                                let mut t = m
                                    .text
                                    .clone()
                                    .unwrap_or_else(|| format!("[{}]", m.kind.as_str()));
                                if m.is_edited {
                                    t.push_str(" (edited)");
                                }
                                super::truncate(&t, 50)
                            };
                            let date = m
                                .created_at
                                .as_deref()
                                .map(super::short_date)
                                .unwrap_or("-");
                            table.add_row(vec![
                                super::truncate(&m.sender.name, 20),
                                text,
                                date.to_string(),
                                m.status.as_str().to_string(),
                            ]);
                        }

                        println!("{table}");
                        if let Some(p) = pagination {
                            println!(
                                "\nPage {}/{} ({} total messages)",
                                p.page, p.total_pages, p.total
                            );
                        }
                    }
                }
            }
        }
        MessagesAction::Send {
            chat_id,
            text,
            reply_to,
        } => {
            let message = registry
                .messages
                .send_text_message(&chat_id, &text, reply_to.as_deref())
                .await?;
            println!(
                "{} Message sent: {}",
                style("OK").green().bold(),
                message.id
            );
        }
        MessagesAction::SendMedia {
            chat_id,
            file,
            kind,
            mime,
            duration,
        } => {
            let path = std::path::Path::new(&file);
            let bytes = std::fs::read(path)?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| KnError::Config(format!("invalid file path: {file}")))?
                .to_string();
            let mime_type = mime.unwrap_or_else(|| guess_mime(path));

            let media = MediaUpload {
                bytes,
                file_name,
                mime_type,
            };
            let message = registry
                .messages
                .send_media_message(&chat_id, media, kind.into(), None, duration)
                .await?;
            println!(
                "{} Media message sent: {}",
                style("OK").green().bold(),
                message.id
            );
        }
        MessagesAction::Edit { message_id, text } => {
            let message = registry.messages.edit_message(&message_id, &text).await?;
            println!(
                "{} Message edited: {}",
                style("OK").green().bold(),
                message.id
            );
        }
        MessagesAction::Delete {
            chat_id,
            message_id,
            for_everyone,
        } => {
            registry
                .messages
                .delete_message(&chat_id, &message_id, for_everyone)
                .await?;
            println!(
                "{} Message deleted{}",
                style("OK").green().bold(),
                if for_everyone { " for everyone" } else { "" }
            );
        }
    }

    registry.shutdown_all().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(std::path::Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_mime(std::path::Path::new("clip.mp4")), "video/mp4");
        assert_eq!(
            guess_mime(std::path::Path::new("data.bin")),
            "application/octet-stream"
        );
    }
}
