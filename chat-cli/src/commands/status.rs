//! Show session and configuration.

use anyhow::Result;
use std::path::Path;

use crate::config::{AppConfig, SessionRecord};

/// Run the status command.
pub async fn run(data_dir: &Path, config: &AppConfig) -> Result<()> {
    println!("=== duet status ===");
    println!();

    match SessionRecord::load(data_dir).await? {
        Some(identity) => {
            println!("Session:");
            println!("  ID:     {}", identity.id);
            println!("  Name:   {}", identity.display_name);
            println!(
                "  Avatar: {}",
                if identity.avatar_set { "set" } else { "NOT SET" }
            );
        }
        None => {
            println!("Session: NOT LOGGED IN");
            println!();
            println!("Run 'duet login --id <id> --name <name>' to log in.");
        }
    }

    println!();

    let client = config.client_config();
    println!("Server:");
    println!("  API:       {}", client.server_url);
    println!("  Live:      {}", client.live_url);
    println!("  History:   {}", client.history_url());
    println!("  Write:     {}", client.write_url());
    println!(
        "  Reconnect: {}",
        if client.reconnect { "on" } else { "off" }
    );
    println!("  Data dir:  {}", data_dir.display());

    Ok(())
}
