//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; a `.env` file is honoured for local
//! development.

use std::env;

/// Default OAuth scope requested from Strava.
pub const DEFAULT_SCOPE: &str = "read,activity:read_all";

/// Default spacing between sync cycle starts (24 hours).
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 24 * 60 * 60;

const DEFAULT_SYNC_WORKERS: usize = 8;
const DEFAULT_SYNC_QUEUE_CAPACITY: usize = 256;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava OAuth ---
    /// Strava OAuth client ID (public)
    pub client_id: String,
    /// Strava OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with Strava (points at `/exchange_token`)
    pub redirect_uri: String,
    /// Requested OAuth scope
    pub scope: String,

    // --- Store ---
    /// Store location: `memory://`, `firestore://<project>` or an http(s) REST endpoint
    pub store_url: String,
    /// API key for REST stores
    pub store_key: Option<String>,

    // --- Server ---
    /// Server port
    pub port: u16,
    /// HS256 key for session cookies (raw bytes)
    pub session_key: Vec<u8>,
    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,
    /// Allowed browser origin for client applications, if any
    pub cors_origin: Option<String>,

    // --- Background sync ---
    pub sync_interval_secs: u64,
    pub sync_workers: usize,
    pub sync_queue_capacity: usize,
    /// Timeout applied to every outbound HTTP call
    pub http_timeout_secs: u64,
}

impl Config {
    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            client_id: "test_client_id".to_string(),
            client_secret: "test_secret".to_string(),
            redirect_uri: "http://localhost:8080/exchange_token".to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            store_url: "memory://".to_string(),
            store_key: None,
            port: 8080,
            session_key: b"test_session_key_32_bytes_min!!".to_vec(),
            cookie_secure: false,
            cors_origin: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            sync_workers: 4,
            sync_queue_capacity: 16,
            http_timeout_secs: 5,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_url = required("STORE_URL")?;
        let store_key = env::var("STORE_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if (store_url.starts_with("http://") || store_url.starts_with("https://"))
            && store_key.is_none()
        {
            return Err(ConfigError::Missing("STORE_KEY"));
        }

        Ok(Self {
            client_id: required("STRAVA_CLIENT_ID")?,
            client_secret: required("STRAVA_CLIENT_SECRET")?,
            redirect_uri: required("STRAVA_REDIRECT_URI")?,
            scope: env::var("STRAVA_SCOPE").unwrap_or_else(|_| DEFAULT_SCOPE.to_string()),
            store_url,
            store_key,
            port: parse_or("PORT", 8080),
            session_key: required("SESSION_SIGNING_KEY")?.into_bytes(),
            cookie_secure: parse_or("COOKIE_SECURE", true),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
            sync_interval_secs: positive_or("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS),
            sync_workers: parse_or("SYNC_WORKERS", DEFAULT_SYNC_WORKERS).max(1),
            sync_queue_capacity: parse_or("SYNC_QUEUE_CAPACITY", DEFAULT_SYNC_QUEUE_CAPACITY)
                .max(1),
            http_timeout_secs: positive_or("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Like [`parse_or`], but zero is also invalid (a zero period or timeout
/// can never succeed).
fn positive_or(name: &str, default: u64) -> u64 {
    match parse_or(name, default) {
        0 => default,
        value => value,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Unsupported store URL: {0}")]
    UnsupportedStore(String),
}
