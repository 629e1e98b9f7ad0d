//! Interactive conversation.
//!
//! Each stdin line is sent to the peer; timeline changes are printed as they
//! happen. Input ends on EOF or `/quit`.

use anyhow::{Context, Result};
use chat_client::{
    ChatEngine, Command, EngineUpdate, HttpMessageStore, LiveTransport, MessageStore,
    MockMessageStore, MockTransport, SkipReason, WsTransport,
};
use chat_core::{ConnectionEvent, TimelineEntry};
use chat_types::{DeliveryStatus, Identity, Origin};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::{AppConfig, SessionRecord};

/// Run the chat command.
pub async fn run(
    data_dir: &Path,
    config: &AppConfig,
    peer_id: &str,
    peer_name: Option<&str>,
    use_mock: bool,
) -> Result<()> {
    let identity = SessionRecord::load(data_dir)
        .await?
        .context("Not logged in. Run 'duet login' first.")?;
    if !identity.avatar_set {
        anyhow::bail!("No avatar set. Log in again with --avatar <image> before chatting.");
    }
    let peer = Identity::new(peer_id, peer_name.unwrap_or(peer_id));

    let client_config = config.client_config();
    if use_mock {
        let engine = ChatEngine::new(MockTransport::new(), MockMessageStore::new(), &client_config);
        converse(engine, identity, peer).await
    } else {
        println!("Connecting to {}...", client_config.live_url);
        let store = HttpMessageStore::new(&client_config);
        let engine = ChatEngine::new(WsTransport::new(), store, &client_config);
        converse(engine, identity, peer).await
    }
}

async fn converse<T, S>(engine: ChatEngine<T, S>, local: Identity, peer: Identity) -> Result<()>
where
    T: LiveTransport + 'static,
    S: MessageStore + 'static,
{
    let (updates_tx, mut updates) = mpsc::unbounded_channel();
    let (commands, commands_rx) = mpsc::channel(32);
    let engine_task = tokio::spawn(engine.with_updates(updates_tx).run(commands_rx));

    let peer_name = peer.display_name.clone();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if let Some(line) = describe(&update, &peer_name) {
                println!("{}", line);
            }
        }
    });

    commands.send(Command::Login(local)).await?;
    commands.send(Command::SelectPeer(peer)).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let text = line.trim_end();
        if text == "/quit" {
            break;
        }
        if text.is_empty() {
            continue;
        }
        commands.send(Command::Send(text.to_string())).await?;
    }

    // Closing the command channel logs the engine out.
    drop(commands);
    engine_task.await.context("Chat engine failed")?;
    printer.await.context("Output task failed")?;
    Ok(())
}

/// Render an update as one output line; `None` for updates not worth showing.
fn describe(update: &EngineUpdate, peer_name: &str) -> Option<String> {
    match update {
        EngineUpdate::Connection(event) => Some(match event {
            ConnectionEvent::Connected => "* connected".to_string(),
            ConnectionEvent::ConnectionFailed { error } => format!("* connection failed: {}", error),
            ConnectionEvent::Disconnected { reason } => format!("* disconnected: {}", reason),
            ConnectionEvent::ReconnectFailed { attempt, error } => {
                format!("* reconnect attempt {} failed: {}", attempt, error)
            }
            ConnectionEvent::Closed => "* connection closed".to_string(),
        }),
        EngineUpdate::Opened(conversation) => {
            Some(format!("* chatting with {} ({})", peer_name, conversation.peer))
        }
        EngineUpdate::HistoryLoaded(entries) => Some(
            entries
                .iter()
                .map(|entry| format_entry(entry, peer_name))
                .collect::<Vec<_>>()
                .join("\n"),
        )
        .filter(|lines| !lines.is_empty()),
        EngineUpdate::HistoryFailed(error) => Some(format!("* could not load history: {}", error)),
        EngineUpdate::Appended(entry) => Some(format_entry(entry, peer_name)),
        EngineUpdate::Delivery {
            status: DeliveryStatus::WriteFailed { error },
            sequence,
        } => Some(format!("* message {} was not saved: {}", sequence, error)),
        EngineUpdate::Delivery { .. } => None,
        EngineUpdate::Skipped(SkipReason::NotConnected) => {
            Some("* not connected; message not sent".to_string())
        }
        EngineUpdate::Skipped(_) => None,
        EngineUpdate::LoggedOut => None,
    }
}

fn format_entry(entry: &TimelineEntry, peer_name: &str) -> String {
    match entry.origin {
        Origin::Local => format!("  you: {}", entry.text),
        Origin::Peer => format!("  {}: {}", peer_name, entry.text),
    }
}
