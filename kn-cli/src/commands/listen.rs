//! Listen command: stream realtime events to stdout.

use console::style;
use tokio::sync::broadcast::error::RecvError;

use kn_core::config::ConfigHandle;
use kn_core::error::KnResult;
use kn_services::AppEvent;

pub async fn run(config: ConfigHandle, chat_filter: Option<String>) -> KnResult<()> {
    let registry = super::build_authenticated_registry(config).await?;
    let mut rx = registry.event_bus.subscribe();

    println!(
        "Listening for events{} (Ctrl-C to stop)...",
        chat_filter
            .as_deref()
            .map(|c| format!(" in chat {c}"))
            .unwrap_or_default()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = rx.recv() => match event {
                Ok(event) => print_event(&event, chat_filter.as_deref()),
                Err(RecvError::Lagged(n)) => {
                    eprintln!("{} dropped {n} event(s)", style("WARN").yellow().bold());
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    registry.shutdown_all().await;
    println!("Stopped.");
    Ok(())
}

fn event_chat_id(event: &AppEvent) -> Option<&str> {
    match event {
        AppEvent::MessageReceived { chat_id, .. }
        | AppEvent::MessageDelivered { chat_id, .. }
        | AppEvent::MessageRead { chat_id, .. }
        | AppEvent::MessageEdited { chat_id, .. }
        | AppEvent::MessageDeleted { chat_id, .. }
        | AppEvent::MessageSent { chat_id, .. }
        | AppEvent::MessageFailed { chat_id, .. }
        | AppEvent::TypingChanged { chat_id, .. }
        | AppEvent::ChatUpdated { chat_id, .. } => Some(chat_id),
        _ => None,
    }
}

fn print_event(event: &AppEvent, chat_filter: Option<&str>) {
    if let Some(filter) = chat_filter {
        if event_chat_id(event).is_some_and(|id| id != filter) {
            return;
        }
    }

    match event {
        AppEvent::MessageReceived { message, chat_id } => {
            println!(
                "[{}] {}: {}",
                style(chat_id).cyan(),
                style(&message.sender.name).bold(),
                message.text.as_deref().unwrap_or("[media]")
            );
        }
        AppEvent::MessageDelivered { message_id, .. } => {
            println!("{} delivered: {message_id}", style(">>").dim());
        }
        AppEvent::MessageRead { message_id, read_by, .. } => {
            println!(
                "{} read: {message_id}{}",
                style(">>").dim(),
                read_by
                    .as_deref()
                    .map(|u| format!(" by {u}"))
                    .unwrap_or_default()
            );
        }
        AppEvent::MessageEdited { message_id, new_text, .. } => {
            println!("{} edited {message_id}: {new_text}", style(">>").dim());
        }
        AppEvent::MessageDeleted { message_id, .. } => {
            println!("{} deleted: {message_id}", style(">>").dim());
        }
        AppEvent::TypingChanged { chat_id, typing_users } => {
            if typing_users.is_empty() {
                println!("[{}] nobody is typing", style(chat_id).cyan());
            } else {
                println!(
                    "[{}] typing: {}",
                    style(chat_id).cyan(),
                    typing_users.join(", ")
                );
            }
        }
        AppEvent::UserStatusChanged { user_id, is_online, .. } => {
            println!(
                "{} {user_id} is {}",
                style("**").dim(),
                if *is_online { "online" } else { "offline" }
            );
        }
        AppEvent::ConnectionStateChanged { state, .. } => {
            println!("{} connection: {state}", style("**").dim());
        }
        AppEvent::ConnectionError { message } => {
            println!("{} {message}", style("ERROR").red().bold());
        }
        AppEvent::VoiceCallSignal { event, .. } => {
            println!("{} call signal: {event}", style("**").dim());
        }
        AppEvent::HighMatchesFound { user_id, matches } => {
            println!(
                "{} {} high match(es) found for {user_id}",
                style("**").magenta(),
                matches.len()
            );
        }
        AppEvent::MatchesUpdated { user_id, match_count, .. } => {
            println!(
                "{} matches updated for {user_id}: {match_count}",
                style("**").dim()
            );
        }
        AppEvent::ChatUpdated { chat_id, unread_count } => {
            println!(
                "[{}] updated{}",
                style(chat_id).cyan(),
                unread_count
                    .map(|n| format!(" ({n} unread)"))
                    .unwrap_or_default()
            );
        }
        AppEvent::MessageSent { message_id, .. } => {
            println!("{} sent: {message_id}", style(">>").dim());
        }
        AppEvent::MessageFailed { temp_id, error, .. } => {
            println!(
                "{} send failed ({temp_id}): {error}",
                style("ERROR").red().bold()
            );
        }
    }
}
