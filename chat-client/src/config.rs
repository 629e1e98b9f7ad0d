//! Client configuration.

use std::time::Duration;

/// Default route for history fetches.
pub const DEFAULT_HISTORY_ROUTE: &str = "/api/messages/getmsg";

/// Default route for message writes.
pub const DEFAULT_WRITE_ROUTE: &str = "/api/messages/addmsg";

/// Default limit on establishing the live connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the chat engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the chat server's HTTP API.
    pub server_url: String,
    /// URL of the live WebSocket endpoint.
    pub live_url: String,
    /// Route of the history fetch, relative to `server_url`.
    pub history_route: String,
    /// Route of the message write, relative to `server_url`.
    pub write_route: String,
    /// Retry dropped or failed live connections with backoff.
    pub reconnect: bool,
    /// Limit on establishing the live connection; a slower handshake counts
    /// as a failed attempt.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for the server at `server_url`.
    ///
    /// The live URL is derived by switching the scheme to `ws`/`wss`.
    pub fn new(server_url: &str) -> Self {
        let server_url = server_url.trim_end_matches('/').to_string();
        Self {
            live_url: derive_live_url(&server_url),
            server_url,
            history_route: DEFAULT_HISTORY_ROUTE.to_string(),
            write_route: DEFAULT_WRITE_ROUTE.to_string(),
            reconnect: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the live endpoint explicitly.
    pub fn with_live_url(mut self, live_url: &str) -> Self {
        self.live_url = live_url.to_string();
        self
    }

    /// Set the persistence API routes.
    pub fn with_routes(mut self, history_route: &str, write_route: &str) -> Self {
        self.history_route = history_route.to_string();
        self.write_route = write_route.to_string();
        self
    }

    /// Enable or disable automatic reconnection.
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Full URL of the history fetch.
    pub fn history_url(&self) -> String {
        join_url(&self.server_url, &self.history_route)
    }

    /// Full URL of the message write.
    pub fn write_url(&self) -> String {
        join_url(&self.server_url, &self.write_route)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:5000")
    }
}

fn derive_live_url(server_url: &str) -> String {
    if let Some(rest) = server_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = server_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        server_url.to_string()
    }
}

fn join_url(base: &str, route: &str) -> String {
    let base = base.trim_end_matches('/');
    if route.starts_with('/') {
        format!("{}{}", base, route)
    } else {
        format!("{}/{}", base, route)
    }
}
