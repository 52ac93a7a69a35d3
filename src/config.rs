//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "feed.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://feed.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// Username of the shared fallback account for anonymous writes
    #[serde(default = "default_guest_username")]
    pub guest_username: String,
}

fn default_guest_username() -> String {
    "guest".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (KARMAFEED_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/karmafeed.db")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.guest_username", "guest")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (KARMAFEED_*)
            .add_source(
                Environment::with_prefix("KARMAFEED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.guest_username.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.guest_username must not be empty".to_string(),
            ));
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);

    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    host.parse::<std::net::IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
