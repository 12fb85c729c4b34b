//! Server configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | `memory` (in-process store) |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `ALLOWED_ORIGINS` | `http://localhost:5173,http://localhost:3000` |
//! | `PUBLIC_URL` | `http://localhost:5173` |
//! | `SESSION_TTL_HOURS` | `168` |
//! | `EVENT_BUS_CAPACITY` | `256` |
//! | `SHARE_RATE_LIMIT_ENABLED` | `true` |
//! | `SHARE_RATE_LIMIT_REQUESTS` | `30` |
//! | `SHARE_RATE_LIMIT_PERIOD_SECS` | `60` |
//! | `SESSION_PURGE_INTERVAL_SECS` | `3600` |

use std::str::FromStr;

use axum::http::HeaderValue;

use mdpro_core::defaults;

/// `DATABASE_URL` value selecting the in-memory store.
pub const MEMORY_DATABASE: &str = "memory";

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:5173";
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Raw comma-separated CORS origin list.
    pub allowed_origins: String,
    /// Base URL of the web frontend; share links are built from it.
    pub public_url: String,
    pub session_ttl_hours: i64,
    pub event_bus_capacity: usize,
    pub share_rate_limit_enabled: bool,
    pub share_rate_limit_requests: u32,
    pub share_rate_limit_period_secs: u64,
    pub purge_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: MEMORY_DATABASE.to_string(),
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            session_ttl_hours: defaults::SESSION_TTL_HOURS,
            event_bus_capacity: defaults::EVENT_BUS_CAPACITY,
            share_rate_limit_enabled: true,
            share_rate_limit_requests: defaults::SHARE_RATE_LIMIT_REQUESTS,
            share_rate_limit_period_secs: defaults::SHARE_RATE_LIMIT_PERIOD_SECS,
            purge_interval_secs: DEFAULT_PURGE_INTERVAL_SECS,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl ServerConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(d.database_url),
            host: std::env::var("HOST").unwrap_or(d.host),
            port: env_or("PORT", d.port),
            allowed_origins: std::env::var("ALLOWED_ORIGINS").unwrap_or(d.allowed_origins),
            public_url: std::env::var("PUBLIC_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(d.public_url),
            session_ttl_hours: env_or("SESSION_TTL_HOURS", d.session_ttl_hours),
            event_bus_capacity: env_or("EVENT_BUS_CAPACITY", d.event_bus_capacity),
            share_rate_limit_enabled: std::env::var("SHARE_RATE_LIMIT_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(d.share_rate_limit_enabled),
            share_rate_limit_requests: env_or(
                "SHARE_RATE_LIMIT_REQUESTS",
                d.share_rate_limit_requests,
            ),
            share_rate_limit_period_secs: env_or(
                "SHARE_RATE_LIMIT_PERIOD_SECS",
                d.share_rate_limit_period_secs,
            ),
            purge_interval_secs: env_or("SESSION_PURGE_INTERVAL_SECS", d.purge_interval_secs),
        }
    }

    /// True when `DATABASE_URL` selects the in-memory store.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }

    /// Public URL of a share link, as handed to the document owner.
    pub fn share_url(&self, token: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_url.trim_end_matches('/'),
            defaults::SHARE_PATH_SEGMENT,
            token
        )
    }

    /// Parse allowed CORS origins.
    ///
    /// Invalid entries and the `*` wildcard are skipped with a warning (a
    /// credentialed CORS layer cannot use a wildcard); an empty list falls back
    /// to the development defaults.
    ///
    /// ```text
    /// ALLOWED_ORIGINS=https://md.example.com,http://localhost:5173
    /// ```
    pub fn parse_allowed_origins(&self) -> Vec<HeaderValue> {
        let parsed: Vec<HeaderValue> = self
            .allowed_origins
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if trimmed == "*" {
                    tracing::warn!("Wildcard CORS origin ignored; list origins explicitly");
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                        None
                    }
                }
            })
            .collect();

        if parsed.is_empty() {
            return DEFAULT_ALLOWED_ORIGINS
                .split(',')
                .map(HeaderValue::from_static)
                .collect();
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_memory_store() {
        let config = ServerConfig::default();
        assert!(config.uses_memory_store());
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.session_ttl(), chrono::Duration::hours(168));
    }

    #[test]
    fn test_share_url() {
        let config = ServerConfig {
            public_url: "https://md.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.share_url("abc-123"),
            "https://md.example.com/share/abc-123"
        );
    }

    #[test]
    fn test_parse_allowed_origins_skips_blank_entries() {
        let config = ServerConfig {
            allowed_origins: "https://a.example.com, ,https://b.example.com".to_string(),
            ..Default::default()
        };
        let origins = config.parse_allowed_origins();
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[1], "https://b.example.com");
    }

    #[test]
    fn test_parse_allowed_origins_empty_falls_back() {
        let config = ServerConfig {
            allowed_origins: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.parse_allowed_origins().len(), 2);
    }

    #[test]
    fn test_parse_allowed_origins_drops_wildcard() {
        let config = ServerConfig {
            allowed_origins: "*,https://md.example.com".to_string(),
            ..Default::default()
        };
        let origins = config.parse_allowed_origins();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0], "https://md.example.com");

        let config = ServerConfig {
            allowed_origins: " * ".to_string(),
            ..Default::default()
        };
        let origins = config.parse_allowed_origins();
        assert_eq!(origins.len(), 2);
        assert!(origins.iter().all(|o| o != "*"));
    }

    #[test]
    fn test_session_ttl_never_zero() {
        let config = ServerConfig {
            session_ttl_hours: 0,
            ..Default::default()
        };
        assert_eq!(config.session_ttl(), chrono::Duration::hours(1));
    }
}
