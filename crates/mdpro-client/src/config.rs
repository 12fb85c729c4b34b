//! Client configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `MDPRO_API_URL` | `http://localhost:3000` |
//! | `MDPRO_ACCESS_TOKEN` | unset |
//! | `MDPRO_PUBLIC_URL` | same as `MDPRO_API_URL` |
//! | `MDPRO_TIMEOUT_SECS` | `30` |
//! | `MDPRO_SESSION_FILE` | `$HOME/.mdpro/session.json` |

use std::path::PathBuf;
use std::time::Duration;

use mdpro_core::defaults;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the mdpro API.
    pub api_url: String,
    /// Pre-issued access token, bypassing the session file.
    pub access_token: Option<String>,
    /// Base URL share links are composed from.
    pub public_url: String,
    pub timeout: Duration,
    /// Where the CLI keeps the signed-in session between runs.
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::API_URL.to_string(),
            access_token: None,
            public_url: defaults::API_URL.to_string(),
            timeout: Duration::from_secs(defaults::CLIENT_TIMEOUT_SECS),
            session_file: default_session_file(),
        }
    }
}

fn default_session_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".mdpro").join("session.json"),
        None => PathBuf::from(".mdpro-session.json"),
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let api_url = std::env::var("MDPRO_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(d.api_url);
        let public_url = std::env::var("MDPRO_PUBLIC_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| api_url.clone());
        let timeout = std::env::var("MDPRO_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(d.timeout);

        Self {
            api_url,
            access_token: std::env::var("MDPRO_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            public_url,
            timeout,
            session_file: std::env::var_os("MDPRO_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(d.session_file),
        }
    }

    /// WebSocket base URL derived from the API URL (`http` → `ws`, `https` → `wss`).
    pub fn ws_url(&self) -> String {
        self.api_url.replacen("http", "ws", 1)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into().trim_end_matches('/').to_string();
        self
    }
}
