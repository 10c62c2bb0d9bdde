//! Application configuration loaded from environment variables.

/// Secret used when `TOKEN_SECRET` is unset. Fine for local runs only.
pub const DEV_TOKEN_SECRET: &str = "dev-only-token-secret-change-me";

/// Longest session lifetime accepted from `TOKEN_TTL_HOURS` (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `TOKEN_SECRET`: HMAC key for session tokens
/// - `TOKEN_TTL_HOURS`: session lifetime (default: `24`, capped at one year)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub token_secret: String,
    pub token_ttl_hours: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            token_secret: lookup("TOKEN_SECRET")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.token_secret),
            token_ttl_hours: lookup("TOKEN_TTL_HOURS")
                .and_then(|h| h.parse().ok())
                .filter(|h| *h > 0)
                .map(|h: i64| h.min(MAX_TOKEN_TTL_HOURS))
                .unwrap_or(defaults.token_ttl_hours),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.token_secret == DEV_TOKEN_SECRET
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            token_secret: DEV_TOKEN_SECRET.to_string(),
            token_ttl_hours: 24,
        }
    }
}
