//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How log lines are rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    Json,
    Pretty,
}

/// Where the store or cache lives. `memory://` keeps everything in-process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Url(String),
}

impl Backend {
    fn parse(raw: String) -> Self {
        if raw.starts_with("memory://") {
            Backend::Memory
        } else {
            Backend::Url(raw)
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub http_debug_errors: bool,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub store: Backend,
    pub store_max_connections: u32,
    pub cache: Backend,
    pub log_level: String,
    pub log_mode: LogMode,
    pub cors_origin: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server ---
        let host: IpAddr = parse_var("BIND_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = match std::env::var("HTTP_PORT").or_else(|_| std::env::var("SERVER_PORT")) {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string(), raw))?,
            Err(_) => 8080,
        };
        let http_debug_errors = parse_var("HTTP_DEBUG_ERRORS", false)?;
        let request_timeout = Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECONDS", 15)?);
        let cors_origin = std::env::var("CORS_ORIGIN").ok();

        // --- Auth ---
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must not be empty".to_string(),
            ));
        }
        let session_ttl = Duration::from_secs(parse_var("SESSION_EXPIRE_SECONDS", 86_400)?);
        let access_token_ttl = Duration::from_secs(parse_var("ACCESS_TOKEN_TTL_SECONDS", 900)?);
        let refresh_token_ttl =
            Duration::from_secs(parse_var("REFRESH_TOKEN_TTL_SECONDS", 86_400)?);
        let admin_email = std::env::var("ADMIN_EMAIL").ok();
        let admin_password = std::env::var("ADMIN_PASSWORD").ok();

        // --- Store and Cache ---
        let store = std::env::var("STORE_DSN")
            .map(Backend::parse)
            .map_err(|_| ConfigError::MissingVar("STORE_DSN".to_string()))?;
        let store_max_connections = parse_var("STORE_MAX_CONNECTIONS", 10)?;
        let cache = std::env::var("CACHE_ADDR")
            .map(Backend::parse)
            .map_err(|_| ConfigError::MissingVar("CACHE_ADDR".to_string()))?;
        let cache_ttl = Duration::from_secs(parse_var("CACHE_TTL_SECONDS", 3600)?);

        // --- Logging ---
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_mode = match std::env::var("LOG_MODE").as_deref() {
            Ok("json") => LogMode::Json,
            Ok("pretty") | Ok("text") | Ok("") | Err(_) => LogMode::Pretty,
            Ok(other) => {
                return Err(ConfigError::InvalidValue(
                    "LOG_MODE".to_string(),
                    format!("'{}' is not one of json, pretty", other),
                ))
            }
        };

        Ok(Self {
            bind_address: SocketAddr::new(host, port),
            http_debug_errors,
            jwt_secret,
            session_ttl,
            access_token_ttl,
            refresh_token_ttl,
            cache_ttl,
            request_timeout,
            store,
            store_max_connections,
            cache,
            log_level,
            log_mode,
            cors_origin,
            admin_email,
            admin_password,
        })
    }

    /// A configuration with in-process backends, used by tests and local tooling.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            http_debug_errors: false,
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::from_secs(86_400),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(86_400),
            cache_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(15),
            store: Backend::Memory,
            store_max_connections: 1,
            cache: Backend::Memory,
            log_level: "info".to_string(),
            log_mode: LogMode::Pretty,
            cors_origin: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

/// Reads and parses an optional variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
