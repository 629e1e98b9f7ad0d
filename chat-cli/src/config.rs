//! Configuration management for duet.
//!
//! Two files live in the data directory:
//!
//! - `config.toml`: server endpoints and connection options (optional)
//! - `session.json`: the logged-in identity

use anyhow::{Context, Result};
use chat_client::ClientConfig;
use chat_types::Identity;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.json";

/// Root configuration, read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Chat server endpoints.
    #[serde(default)]
    pub server: ServerConfig,
    /// Live connection options.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Chat server endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the HTTP API (default: http://localhost:5000).
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Live endpoint; derived from `url` when absent.
    pub live_url: Option<String>,
    /// History route (default: /api/messages/getmsg).
    #[serde(default = "default_history_route")]
    pub history_route: String,
    /// Write route (default: /api/messages/addmsg).
    #[serde(default = "default_write_route")]
    pub write_route: String,
}

/// Live connection options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Reconnect with backoff after a failure or drop (default: true).
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,
    /// Seconds allowed for establishing the live connection (default: 30).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_history_route() -> String {
    chat_client::DEFAULT_HISTORY_ROUTE.to_string()
}

fn default_write_route() -> String {
    chat_client::DEFAULT_WRITE_ROUTE.to_string()
}

fn default_reconnect() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    chat_client::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            live_url: None,
            history_route: default_history_route(),
            write_route: default_write_route(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: default_reconnect(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `config.toml` from the data directory, or defaults if it does
    /// not exist.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Client configuration for the engine.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.server.url)
            .with_routes(&self.server.history_route, &self.server.write_route)
            .with_reconnect(self.connection.reconnect)
            .with_connect_timeout(Duration::from_secs(self.connection.connect_timeout_secs));
        if let Some(live_url) = &self.server.live_url {
            config = config.with_live_url(live_url);
        }
        config
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

/// The stored identity of the logged-in user.
pub struct SessionRecord;

impl SessionRecord {
    /// Path of the record inside `data_dir`.
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(SESSION_FILE)
    }

    /// Load the stored identity.
    ///
    /// Returns `None` when nobody is logged in. A record that does not parse
    /// is removed and treated as absent.
    pub async fn load(data_dir: &Path) -> Result<Option<Identity>> {
        let path = Self::path(data_dir);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read session record"),
        };

        match serde_json::from_str::<Identity>(&contents) {
            Ok(identity) if !identity.id.is_empty() => Ok(Some(identity)),
            Ok(_) => {
                warn!("Session record has no user id; removing it");
                Self::clear(data_dir).await?;
                Ok(None)
            }
            Err(e) => {
                warn!("Session record is corrupt ({}); removing it", e);
                Self::clear(data_dir).await?;
                Ok(None)
            }
        }
    }

    /// Store `identity` as the logged-in user.
    pub async fn save(data_dir: &Path, identity: &Identity) -> Result<()> {
        let path = Self::path(data_dir);
        let contents = serde_json::to_string_pretty(identity)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save session record")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Remove the record. Returns false if there was none.
    pub async fn clear(data_dir: &Path) -> Result<bool> {
        match tokio::fs::remove_file(Self::path(data_dir)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to remove session record"),
        }
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // ===========================================
    // AppConfig Tests
    // ===========================================

    #[test]
    fn default_config_points_at_local_server() {
        let config = AppConfig::default();
        assert_eq!(config.server.url, "http://localhost:5000");
        assert_eq!(config.server.history_route, "/api/messages/getmsg");
        assert!(config.connection.reconnect);

        let client = config.client_config();
        assert_eq!(client.live_url, "ws://localhost:5000");
        assert_eq!(client.write_url(), "http://localhost:5000/api/messages/addmsg");
        assert_eq!(client.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
url = "https://chat.example.com"
write_route = "/v2/messages"

[connection]
reconnect = false
connect_timeout_secs = 5
"#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.url, "https://chat.example.com");
        assert_eq!(config.server.history_route, "/api/messages/getmsg");
        assert!(!config.connection.reconnect);

        let client = config.client_config();
        assert_eq!(client.live_url, "wss://chat.example.com");
        assert_eq!(client.write_url(), "https://chat.example.com/v2/messages");
        assert!(!client.reconnect);
        assert_eq!(client.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn explicit_live_url_wins() {
        let config: AppConfig = toml::from_str(
            r#"
[server]
url = "http://api:5000"
live_url = "ws://live:9000"
"#,
        )
        .unwrap();
        assert_eq!(config.client_config().live_url, "ws://live:9000");
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(AppConfig::load(dir.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[server\nurl = ").unwrap();

        let result = AppConfig::load(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    // ===========================================
    // SessionRecord Tests
    // ===========================================

    #[tokio::test]
    async fn session_roundtrip() {
        let dir = tempdir().unwrap();
        let identity = Identity::new("1", "alice").with_avatar("PHN2Zz4=");

        SessionRecord::save(dir.path(), &identity).await.unwrap();
        let loaded = SessionRecord::load(dir.path()).await.unwrap();

        assert_eq!(loaded, Some(identity));
    }

    #[tokio::test]
    async fn session_uses_wire_field_names() {
        let dir = tempdir().unwrap();
        SessionRecord::save(dir.path(), &Identity::new("1", "alice"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(SessionRecord::path(dir.path())).unwrap();
        assert!(raw.contains("\"_id\""));
        assert!(raw.contains("\"username\""));
        assert!(raw.contains("\"isAvatarImageSet\""));
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let dir = tempdir().unwrap();
        assert!(SessionRecord::load(dir.path()).await.unwrap().is_none());
        assert!(!SessionRecord::clear(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_session_is_removed() {
        let dir = tempdir().unwrap();
        let path = SessionRecord::path(dir.path());
        std::fs::write(&path, "{not json").unwrap();

        assert!(SessionRecord::load(dir.path()).await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn session_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        SessionRecord::save(dir.path(), &Identity::new("1", "alice"))
            .await
            .unwrap();

        let perms = std::fs::metadata(SessionRecord::path(dir.path()))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");
    }
}
