//! Configuration management for PaperDesk services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Blob storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Outgoing mail configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted request body (manuscript + cover letter + fields)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply embedded migrations on startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory blobs are written under
    #[serde(default = "default_storage_root")]
    pub root_dir: String,

    /// Public URL prefix that resolves to `root_dir`
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Folder for manuscripts
    #[serde(default = "default_manuscript_folder")]
    pub manuscript_folder: String,

    /// Folder for cover letters
    #[serde(default = "default_cover_letter_folder")]
    pub cover_letter_folder: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    /// Mail provider API base URL
    #[serde(default = "default_mail_base_url")]
    pub base_url: String,

    /// API key; when absent mail is only logged
    pub api_key: Option<String>,

    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Editorial office address copied on every submission
    #[serde(default = "default_admin_address")]
    pub admin_address: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for a single message
    #[serde(default = "default_mail_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_upload_bytes() -> usize { 25 * 1024 * 1024 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_storage_root() -> String { "./data/blobs".to_string() }
fn default_public_base_url() -> String { "http://localhost:8080/files".to_string() }
fn default_manuscript_folder() -> String { "papers".to_string() }
fn default_cover_letter_folder() -> String { "coverletters".to_string() }
fn default_mail_base_url() -> String { "https://api.resend.com".to_string() }
fn default_from_address() -> String { "no-reply@paperdesk.local".to_string() }
fn default_admin_address() -> String { "editor@paperdesk.local".to_string() }
fn default_mail_timeout() -> u64 { 5 }
fn default_mail_retries() -> u32 { 2 }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "paperdesk".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl MailConfig {
    /// Longest a single send may take including retries
    pub fn delivery_budget(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1)) * (self.max_retries + 1)
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__MAIL__API_KEY=re_123
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot work at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mail = self.mail.delivery_budget();
        let request = self.request_timeout();
        if mail >= request {
            return Err(ConfigError::Message(format!(
                "mail delivery budget ({}s = timeout_secs x (max_retries + 1)) must be below server.request_timeout_secs ({}s)",
                mail.as_secs(),
                request.as_secs()
            )));
        }
        Ok(())
    }

    /// How long a workflow operation waits for its notification before reporting it failed
    pub fn notification_timeout(&self) -> Duration {
        self.mail.delivery_budget().min(self.request_timeout() / 2)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
            public_base_url: default_public_base_url(),
            manuscript_folder: default_manuscript_folder(),
            cover_letter_folder: default_cover_letter_folder(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            base_url: default_mail_base_url(),
            api_key: None,
            from_address: default_from_address(),
            admin_address: default_admin_address(),
            timeout_secs: default_mail_timeout(),
            max_retries: default_mail_retries(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/paperdesk".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: default_enabled(),
            },
            storage: StorageConfig::default(),
            mail: MailConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.manuscript_folder, "papers");
        assert_eq!(config.storage.cover_letter_folder, "coverletters");
        assert!(config.mail.api_key.is_none());
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/paperdesk");
    }

    #[test]
    fn test_default_mail_budget_fits_request_timeout() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.mail.delivery_budget() < config.request_timeout());
        assert!(config.notification_timeout() < config.request_timeout());
    }

    #[test]
    fn test_mail_budget_above_request_timeout_rejected() {
        let mut config = AppConfig::default();
        config.mail.timeout_secs = 10;
        config.mail.max_retries = 3;
        config.server.request_timeout_secs = 30;
        assert!(config.validate().is_err());

        config.server.request_timeout_secs = 60;
        assert!(config.validate().is_ok());
        assert_eq!(config.notification_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_upload_limit_covers_two_manuscripts() {
        let config = AppConfig::default();
        assert!(config.server.max_upload_bytes >= 2 * crate::domain::validation::MAX_FILE_BYTES);
    }
}
