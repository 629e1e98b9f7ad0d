//! Store the identity to chat as.

use anyhow::Result;
use chat_types::Identity;
use std::path::Path;

use crate::config::SessionRecord;

/// Run the login command.
pub async fn run(data_dir: &Path, id: &str, name: &str, avatar: Option<&str>) -> Result<()> {
    if id.trim().is_empty() {
        anyhow::bail!("User id must not be empty");
    }

    if let Some(current) = SessionRecord::load(data_dir).await? {
        if current.id.as_str() != id {
            println!("Replacing session for {} ({})", current.display_name, current.id);
        }
    }

    let mut identity = Identity::new(id, name);
    if let Some(avatar) = avatar {
        identity = identity.with_avatar(avatar);
    }
    SessionRecord::save(data_dir, &identity).await?;

    println!("Logged in as {} ({})", identity.display_name, identity.id);
    if !identity.avatar_set {
        println!();
        println!("No avatar set. Log in again with --avatar <image> before chatting.");
    }

    Ok(())
}
