//! # duet
//!
//! Terminal client for the duet two-party chat engine.
//!
//! ## Commands
//!
//! - `login`: Store the identity to chat as
//! - `logout`: Forget the stored identity
//! - `status`: Show session and server configuration
//! - `history`: Print the stored history with a peer
//! - `chat`: Open a conversation; stdin lines are sent
//!
//! ## Example
//!
//! ```bash
//! # Log in
//! duet login --id 1 --name alice --avatar PHN2Zz4=
//!
//! # Show what was stored with bob
//! duet history --peer 2
//!
//! # Chat with bob
//! duet chat --peer 2 --peer-name bob
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{chat, history, login, logout, status};
use config::AppConfig;

/// Terminal client for the duet chat engine.
#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the session record and config.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use mock transport and store instead of the chat server (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store the identity to chat as
    Login {
        /// Server-assigned user id
        #[arg(long)]
        id: String,

        /// Display name
        #[arg(long, short)]
        name: String,

        /// Avatar image payload
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Forget the stored identity
    Logout,

    /// Show session and server configuration
    Status,

    /// Print the stored history with a peer
    History {
        /// Peer user id
        #[arg(long, short)]
        peer: String,
    },

    /// Chat with a peer
    Chat {
        /// Peer user id
        #[arg(long, short)]
        peer: String,

        /// Peer display name (defaults to the id)
        #[arg(long)]
        peer_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config = AppConfig::load(&data_dir)?;

    match cli.command {
        Commands::Login { id, name, avatar } => {
            login::run(&data_dir, &id, &name, avatar.as_deref()).await?;
        }
        Commands::Logout => {
            logout::run(&data_dir).await?;
        }
        Commands::Status => {
            status::run(&data_dir, &config).await?;
        }
        Commands::History { peer } => {
            history::run(&data_dir, &config, &peer, cli.mock).await?;
        }
        Commands::Chat { peer, peer_name } => {
            chat::run(&data_dir, &config, &peer, peer_name.as_deref(), cli.mock).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for duet.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "duet")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
