//! Print the stored history of a conversation.

use anyhow::{Context, Result};
use chat_client::{HttpMessageStore, MessageStore, MockMessageStore};
use chat_types::{Conversation, HistoryEntry, HistoryRequest, UserId};
use std::path::Path;

use crate::config::{AppConfig, SessionRecord};

/// Run the history command.
pub async fn run(data_dir: &Path, config: &AppConfig, peer: &str, use_mock: bool) -> Result<()> {
    let identity = SessionRecord::load(data_dir)
        .await?
        .context("Not logged in. Run 'duet login' first.")?;
    let conversation = Conversation::new(identity.id.clone(), UserId::new(peer));
    let request = HistoryRequest::from(&conversation);

    let history = if use_mock {
        fetch(&MockMessageStore::new(), &request).await?
    } else {
        let store = HttpMessageStore::new(&config.client_config());
        println!("Fetching history from {}...", store.history_url());
        fetch(&store, &request).await?
    };

    if history.is_empty() {
        println!("No messages with {} yet.", peer);
        return Ok(());
    }

    println!("{} message(s) with {}:", history.len(), peer);
    println!();
    for entry in &history {
        println!("{}", format_entry(entry, peer));
    }

    Ok(())
}

async fn fetch<S: MessageStore>(store: &S, request: &HistoryRequest) -> Result<Vec<HistoryEntry>> {
    store
        .fetch_history(request)
        .await
        .context("Failed to fetch history")
}

fn format_entry(entry: &HistoryEntry, peer: &str) -> String {
    if entry.from_self {
        format!("  you: {}", entry.message)
    } else {
        format!("  {}: {}", peer, entry.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::Identity;
    use tempfile::tempdir;

    #[tokio::test]
    async fn history_requires_login() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), &AppConfig::default(), "2", true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn history_with_mock_store() {
        let dir = tempdir().unwrap();
        SessionRecord::save(dir.path(), &Identity::new("1", "alice"))
            .await
            .unwrap();

        assert!(run(dir.path(), &AppConfig::default(), "2", true).await.is_ok());
    }

    #[test]
    fn entries_show_their_side() {
        assert_eq!(format_entry(&HistoryEntry::new("yo", true), "bob"), "  you: yo");
        assert_eq!(format_entry(&HistoryEntry::new("hi", false), "bob"), "  bob: hi");
    }
}
