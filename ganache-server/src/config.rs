//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use ganache_core::{
    DEFAULT_CONTENT_MAX_WIDTH, DEFAULT_MAX_PIXELS, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_THUMB_MAX_WIDTH,
};

/// Room for multipart framing and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8080)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: IpAddr,
    /// PostgreSQL connection string; absent means the in-memory store
    pub database_url: Option<String>,
    /// Root of the content-addressed media tree (default: ./data)
    pub storage_root: PathBuf,
    /// Largest accepted upload in bytes (default: 20 MiB)
    pub max_upload_bytes: u64,
    /// Largest accepted decoded image, width times height (default: 50M)
    pub max_pixels: u64,
    /// Max width of the `content` variant (default: 1600)
    pub content_max_width: u32,
    /// Max width of the `thumb` variant (default: 400)
    pub thumb_max_width: u32,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 2)
    pub database_min_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            database_url: None,
            storage_root: PathBuf::from("./data"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_pixels: DEFAULT_MAX_PIXELS,
            content_max_width: DEFAULT_CONTENT_MAX_WIDTH,
            thumb_max_width: DEFAULT_THUMB_MAX_WIDTH,
            allowed_origins: None, // None = allow all (dev mode)
            timeout_secs: 60,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_max_connections: 20,
            database_min_connections: 2,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);
        let host = env_parse("HOST").unwrap_or(defaults.host);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let storage_root = std::env::var("GANACHE_STORAGE_ROOT")
            .ok()
            .filter(|root| !root.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_root);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            port,
            host,
            database_url,
            storage_root,
            max_upload_bytes: env_parse("GANACHE_MAX_UPLOAD_BYTES")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_upload_bytes),
            max_pixels: env_parse("GANACHE_MAX_PIXELS")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_pixels),
            content_max_width: env_parse("GANACHE_CONTENT_MAX_WIDTH")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.content_max_width),
            thumb_max_width: env_parse("GANACHE_THUMB_MAX_WIDTH")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.thumb_max_width),
            allowed_origins,
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            database_min_connections: env_parse("DATABASE_MIN_CONNECTIONS")
                .unwrap_or(defaults.database_min_connections),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Request body limit: the upload cap plus multipart overhead
    pub fn body_limit_bytes(&self) -> usize {
        usize::try_from(self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
            .unwrap_or(usize::MAX)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
