//! Configuration management.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Token blacklist configuration
    #[serde(default)]
    pub blacklist: BlacklistConfig,

    /// OIDC identity provider configuration
    #[serde(default)]
    pub oidc: OidcConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Pool acquire timeout
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Apply pending migrations on connect
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlacklistConfig {
    /// Maximum lifetime of an access token; blacklist entries never live longer
    #[serde(default = "default_token_max_lifetime", with = "humantime_serde")]
    pub token_max_lifetime: Duration,

    /// Cache key prefix for blacklisted token hashes
    #[serde(default = "default_blacklist_prefix")]
    pub key_prefix: String,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            token_max_lifetime: default_token_max_lifetime(),
            key_prefix: default_blacklist_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    /// Upper bound on any single identity provider round trip
    #[serde(default = "default_oidc_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Registered providers keyed by name
    #[serde(default)]
    pub providers: HashMap<String, OidcProviderConfig>,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_oidc_timeout(),
            providers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcProviderConfig {
    pub client_id: String,

    /// RP-initiated logout endpoint
    pub end_session_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Default retention used by the cleanup command
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Page size when a query does not set one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Hard cap on rows returned by an export
    #[serde(default = "default_max_export_records")]
    pub max_export_records: usize,

    /// Record an audit entry for every permission check
    #[serde(default = "default_record_permission_checks")]
    pub record_permission_checks: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            default_page_size: default_page_size(),
            max_export_records: default_max_export_records(),
            record_permission_checks: default_record_permission_checks(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Install the Prometheus recorder
    #[serde(default)]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: false,
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> Duration { Duration::from_secs(5) }
fn default_run_migrations() -> bool { true }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_redis_pool_size() -> u32 { 10 }
fn default_token_max_lifetime() -> Duration { Duration::from_secs(15 * 60) }
fn default_blacklist_prefix() -> String { "blacklist:".to_string() }
fn default_oidc_timeout() -> Duration { Duration::from_secs(10) }
fn default_retention_days() -> i64 { 90 }
fn default_page_size() -> usize { 50 }
fn default_max_export_records() -> usize { 100_000 }
fn default_record_permission_checks() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }

impl Config {
    /// Load configuration from the environment (`ACCESS__SECTION__KEY`).
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ACCESS").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("ACCESS").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}
