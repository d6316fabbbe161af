use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Request body size limit in bytes
    /// Env: REQUEST_BODY_LIMIT (default: 1048576 = 1MB)
    pub request_body_limit: usize,

    /// Request timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Server port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Database file path
    /// Env: DATABASE_PATH (default: "dclink.db")
    pub database_path: String,

    /// Discord API Token
    /// Env: DISCORD_TOKEN (optional here; main requires it at startup)
    pub discord_token: Option<String>,

    /// Channel that holds the live status panel message
    /// Env: STATUS_CHANNEL_ID (default: 0 = panel disabled)
    pub status_channel_id: u64,

    /// Shared secret for the server-side push API
    /// Env: API_KEY (default: empty = push API rejects everything)
    pub api_key: String,

    /// Host for the GameSpy4 query protocol (direct path)
    /// Env: QUERY_HOST (optional)
    pub query_host: Option<String>,

    /// Port for the GameSpy4 query protocol
    /// Env: QUERY_PORT (default: 25565)
    pub query_port: u16,

    /// Rcon host
    /// Env: RCON_HOST (optional)
    pub rcon_host: Option<String>,

    /// Rcon port
    /// Env: RCON_PORT (default: 25575)
    pub rcon_port: u16,

    /// Rcon password
    /// Env: RCON_PASSWORD (optional; rcon features are skipped without it)
    pub rcon_password: Option<String>,

    /// Third-party status URL used instead of the direct query when set
    /// Env: STATUS_URL (optional)
    pub status_url: Option<String>,

    /// How often the panel is re-published
    /// Env: PUBLISH_INTERVAL_SECS (default: 30)
    pub publish_interval: Duration,

    /// How often player profiles are drained over rcon
    /// Env: PROFILE_REFRESH_INTERVAL_SECS (default: 600)
    pub refresh_interval: Duration,

    /// Per-round-trip timeout for the query/rcon/fallback transports
    /// Env: PROTOCOL_TIMEOUT_MS (default: 4000)
    pub protocol_timeout: Duration,

    /// Maximum number of linked accounts
    /// Env: MAX_ACCOUNTS (default: 20)
    pub max_accounts: u32,

    /// Rate limit for push endpoints like /join, /leave (requests per second)
    /// Env: RATE_LIMIT_PLAYER_PER_SEC (default: 50)
    /// This is lenient to handle many players joining/leaving at once
    pub rate_limit_player_per_sec: u64,

    /// Burst size for push endpoints
    /// Env: RATE_LIMIT_PLAYER_BURST (default: 100)
    pub rate_limit_player_burst: u32,

    /// Rate limit for general endpoints (requests per second)
    /// Env: RATE_LIMIT_GENERAL_PER_SEC (default: 10)
    pub rate_limit_general_per_sec: u64,

    /// Burst size for general endpoints
    /// Env: RATE_LIMIT_GENERAL_BURST (default: 20)
    pub rate_limit_general_burst: u32,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            request_body_limit: env_or_default("REQUEST_BODY_LIMIT", 1024 * 1024),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            port: env_or_default("PORT", 3000),
            database_path: env_or_default_string("DATABASE_PATH", "dclink.db"),
            discord_token: var("DISCORD_TOKEN").ok(),
            status_channel_id: env_or_default("STATUS_CHANNEL_ID", 0),
            api_key: env_or_default_string("API_KEY", ""),
            query_host: var("QUERY_HOST").ok(),
            query_port: env_or_default("QUERY_PORT", 25565),
            rcon_host: var("RCON_HOST").ok(),
            rcon_port: env_or_default("RCON_PORT", 25575),
            rcon_password: var("RCON_PASSWORD").ok(),
            status_url: var("STATUS_URL").ok(),
            publish_interval: Duration::from_secs(env_or_default("PUBLISH_INTERVAL_SECS", 30)),
            refresh_interval: Duration::from_secs(env_or_default(
                "PROFILE_REFRESH_INTERVAL_SECS",
                600,
            )),
            protocol_timeout: Duration::from_millis(env_or_default("PROTOCOL_TIMEOUT_MS", 4000)),
            max_accounts: env_or_default("MAX_ACCOUNTS", 20),
            rate_limit_player_per_sec: env_or_default("RATE_LIMIT_PLAYER_PER_SEC", 50),
            rate_limit_player_burst: env_or_default("RATE_LIMIT_PLAYER_BURST", 100),
            rate_limit_general_per_sec: env_or_default("RATE_LIMIT_GENERAL_PER_SEC", 10),
            rate_limit_general_burst: env_or_default("RATE_LIMIT_GENERAL_BURST", 20),
        }
    }

    /// Create configuration with all default values
    pub fn default() -> Self {
        Self {
            request_body_limit: 1024 * 1024, // 1 MB
            request_timeout: Duration::from_secs(30),
            port: 3000,
            database_path: "dclink.db".to_string(),
            discord_token: None,
            status_channel_id: 0,
            api_key: String::new(),
            query_host: None,
            query_port: 25565,
            rcon_host: None,
            rcon_port: 25575,
            rcon_password: None,
            status_url: None,
            publish_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(600),
            protocol_timeout: Duration::from_millis(4000),
            max_accounts: 20,
            rate_limit_player_per_sec: 50,
            rate_limit_player_burst: 100,
            rate_limit_general_per_sec: 10,
            rate_limit_general_burst: 20,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
