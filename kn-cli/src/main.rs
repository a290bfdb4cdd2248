//! Kinnect CLI - Command-line interface for the Kinnect chat client.
//!
//! Provides a terminal front-end for the Kinnect service stack: connect
//! to a server, list chats, send and manage messages, handle friend
//! requests, and stream realtime events. Useful for headless operation,
//! scripting, and debugging.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use kn_core::config::{AppConfig, ConfigHandle};
use kn_core::error::KnResult;
use kn_core::logging;

/// Kinnect - family chat client.
#[derive(Parser)]
#[command(
    name = "kinnect",
    version,
    about = "Kinnect chat client CLI",
    long_about = "A command-line interface for the Kinnect chat client.\n\
                   Connect to a Kinnect server to send and receive messages from the terminal."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the server connection and bind a session.
    Connect {
        /// Server address (overrides config).
        #[arg(short, long)]
        address: Option<String>,
        /// Session bearer token (overrides config).
        #[arg(short, long)]
        token: Option<String>,
        /// The user id the token belongs to.
        #[arg(short, long)]
        user: Option<String>,
        /// Save connection settings to the config file.
        #[arg(long)]
        save: bool,
    },
    /// Show connection, session, and service status.
    Status,
    /// List and manage chats.
    Chats {
        #[command(subcommand)]
        action: commands::chats::ChatsAction,
    },
    /// Send and manage messages.
    Messages {
        #[command(subcommand)]
        action: commands::messages::MessagesAction,
    },
    /// Manage friend requests.
    Friends {
        #[command(subcommand)]
        action: commands::friends::FriendsAction,
    },
    /// Connect and stream realtime events to stdout.
    Listen {
        /// Only show events for this chat.
        #[arg(long)]
        chat: Option<String>,
    },
}

#[tokio::main]
async fn main() -> KnResult<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let log_dir = AppConfig::data_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join("logs");
    let _guard = logging::init_logging(log_level, &log_dir, false)?;

    let config_path = cli.config.as_deref().map(std::path::Path::new);
    let (config, persist_path) = match config_path {
        Some(path) => (AppConfig::load_from_file(path)?, Some(path.to_path_buf())),
        None => (AppConfig::load_default()?, None),
    };
    let config_handle = match persist_path {
        Some(path) => ConfigHandle::with_path(config, path),
        None => ConfigHandle::new(config),
    };

    info!("Kinnect CLI v{}", kn_core::constants::APP_VERSION);

    match cli.command {
        Commands::Connect {
            address,
            token,
            user,
            save,
        } => commands::connect::run(config_handle, address, token, user, save).await,
        Commands::Status => commands::status::run(config_handle, cli.format).await,
        Commands::Chats { action } => {
            commands::chats::run(config_handle, action, cli.format).await
        }
        Commands::Messages { action } => {
            commands::messages::run(config_handle, action, cli.format).await
        }
        Commands::Friends { action } => {
            commands::friends::run(config_handle, action, cli.format).await
        }
        Commands::Listen { chat } => commands::listen::run(config_handle, chat).await,
    }
}
