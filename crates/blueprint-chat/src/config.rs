//! Chat engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for connecting a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the chat backend.
    #[serde(default = "ChatConfig::default_backend_url")]
    pub backend_url: String,

    /// URL of the typing-indicator socket.
    #[serde(default = "ChatConfig::default_socket_url")]
    pub socket_url: String,

    /// How many of the newest messages each poll fetches.
    #[serde(default = "ChatConfig::default_latest_window")]
    pub latest_window: usize,

    /// Quiet period before the user is reported as no longer typing.
    #[serde(default = "ChatConfig::default_typing_debounce")]
    pub typing_debounce_ms: u64,
}

impl ChatConfig {
    fn default_backend_url() -> String {
        "http://localhost:4040".to_string()
    }

    fn default_socket_url() -> String {
        "ws://localhost:4040/socket".to_string()
    }

    const fn default_latest_window() -> usize {
        5
    }

    const fn default_typing_debounce() -> u64 {
        500
    }

    /// Get the typing debounce window as a `Duration`.
    #[must_use]
    pub const fn typing_debounce(&self) -> Duration {
        Duration::from_millis(self.typing_debounce_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend_url: Self::default_backend_url(),
            socket_url: Self::default_socket_url(),
            latest_window: Self::default_latest_window(),
            typing_debounce_ms: Self::default_typing_debounce(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.backend_url, "http://localhost:4040");
        assert_eq!(config.socket_url, "ws://localhost:4040/socket");
        assert_eq!(config.latest_window, 5);
        assert_eq!(config.typing_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: ChatConfig =
            serde_json::from_str(r#"{"backend_url":"https://chat.example.com"}"#).unwrap();
        assert_eq!(config.backend_url, "https://chat.example.com");
        assert_eq!(config.latest_window, 5);
        assert_eq!(config.typing_debounce_ms, 500);
    }
}
