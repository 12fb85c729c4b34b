//! Shared application state.

use std::num::NonZeroU32;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use mdpro_core::{EventBus, Repositories};

use crate::config::ServerConfig;

/// Global limiter guarding the anonymous share endpoints.
pub type ShareRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub event_bus: Arc<EventBus>,
    pub config: Arc<ServerConfig>,
    /// `None` when share rate limiting is disabled.
    pub share_limiter: Option<Arc<ShareRateLimiter>>,
    /// Active WebSocket connection count.
    pub ws_connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(repos: Repositories, config: ServerConfig) -> Self {
        let share_limiter = share_rate_limiter(&config).map(Arc::new);
        Self {
            repos,
            event_bus: Arc::new(EventBus::new(config.event_bus_capacity.max(1))),
            config: Arc::new(config),
            share_limiter,
            ws_connections: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Build the share limiter: `requests` per `period_secs`, bursting to `requests`.
fn share_rate_limiter(config: &ServerConfig) -> Option<ShareRateLimiter> {
    if !config.share_rate_limit_enabled {
        tracing::info!("Share rate limiting disabled");
        return None;
    }
    let requests = NonZeroU32::new(config.share_rate_limit_requests)?;
    let period = Duration::from_secs(config.share_rate_limit_period_secs.max(1));
    let quota = Quota::with_period(period / requests.get())?.allow_burst(requests);
    tracing::info!(
        requests = requests.get(),
        period_secs = period.as_secs(),
        "Share rate limiting enabled"
    );
    Some(RateLimiter::direct(quota))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdpro_db::MemoryStore;

    #[test]
    fn test_limiter_disabled() {
        let config = ServerConfig {
            share_rate_limit_enabled: false,
            ..Default::default()
        };
        let state = AppState::new(MemoryStore::new().repositories(), config);
        assert!(state.share_limiter.is_none());
    }

    #[test]
    fn test_limiter_allows_burst_then_rejects() {
        let config = ServerConfig {
            share_rate_limit_requests: 3,
            share_rate_limit_period_secs: 3600,
            ..Default::default()
        };
        let limiter = share_rate_limiter(&config).unwrap();
        for _ in 0..3 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());
    }
}
