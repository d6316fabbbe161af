pub mod aggregator;
pub mod config;
pub mod error;
pub mod helpers;
pub mod panel;
pub mod presence;
pub mod profiles;
pub mod query;
pub mod rcon;
mod routes;
pub mod status;
pub mod tasks;
pub mod validation;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::sync::Notify;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::aggregator::StickyCache;
use crate::config::Config;
use crate::presence::PresenceTracker;
use crate::profiles::ProfileRefresher;
use crate::rcon::ConsoleStatClient;

/// Shared context handed to every boundary: the push/read API, the Discord
/// commands, and the background loops. Each piece of mutable state has a
/// single owning component; everything here is behind an Arc.
pub struct AppState {
    pub db: dclink_db::Database,
    pub presence: Arc<PresenceTracker>,
    pub cache: Arc<StickyCache>,
    pub refresher: Arc<ProfileRefresher>,
    /// Wakes the fast publish loop after a push event.
    pub publish_notify: Arc<Notify>,
    /// Cleared when a background loop dies; reported by /health.
    pub healthy: Arc<AtomicBool>,
    /// SHA-256 of the configured push API key; empty means "reject all".
    pub api_key_hash: String,
}

impl AppState {
    pub fn new(db: dclink_db::Database, config: &Config) -> Arc<Self> {
        let presence = Arc::new(PresenceTracker::new());
        let refresher = Arc::new(ProfileRefresher::new(
            db.clone(),
            ConsoleStatClient::from_config(config),
            Arc::clone(&presence),
        ));
        let api_key_hash = if config.api_key.is_empty() {
            String::new()
        } else {
            helpers::hash_api_key(&config.api_key)
        };

        Arc::new(Self {
            db,
            presence,
            cache: Arc::new(StickyCache::new()),
            refresher,
            publish_notify: Arc::new(Notify::new()),
            healthy: Arc::new(AtomicBool::new(true)),
            api_key_hash,
        })
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for push endpoints (/join, /leave, /world-status)
    pub player_per_sec: u64,
    /// Burst size for push endpoints
    pub player_burst: u32,
    /// Requests per second for general endpoints
    pub general_per_sec: u64,
    /// Burst size for general endpoints
    pub general_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            player_per_sec: 50,
            player_burst: 100,
            general_per_sec: 10,
            general_burst: 20,
        }
    }
}

/// Create the application router with the given state and configuration
pub fn create_app(
    state: Arc<AppState>,
    request_body_limit: usize,
    request_timeout: Duration,
    rate_limit: RateLimitConfig,
) -> Router {
    // Lenient rate limit for push endpoints - many players join/leave at once
    let player_governor = GovernorConfigBuilder::default()
        .per_second(rate_limit.player_per_sec)
        .burst_size(rate_limit.player_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .unwrap();

    // General rate limit for other endpoints
    let general_governor = GovernorConfigBuilder::default()
        .per_second(rate_limit.general_per_sec)
        .burst_size(rate_limit.general_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .unwrap();

    // Routes with lenient rate limiting (high traffic from the game server)
    let player_routes = Router::new()
        .route("/join", post(routes::join))
        .route("/leave", post(routes::leave))
        .route("/world-status", post(routes::world_status))
        .route("/registration/{uuid}", get(routes::registration))
        .layer(GovernorLayer::new(player_governor));

    // Routes with general rate limiting
    let general_routes = Router::new()
        .route("/status", get(routes::status))
        .route("/profile/{name}", get(routes::profile))
        .layer(GovernorLayer::new(general_governor));

    Router::new()
        .route("/health", get(routes::health))
        .merge(player_routes)
        .merge(general_routes)
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(request_body_limit))
        .with_state(state)
}
