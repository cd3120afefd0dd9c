pub use crate::networks::{ChainType, NetworkConfig};
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use validator::Validate;

// Default constants
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_SERVER_NAME: &str = "chaingate";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8123";
pub const DEFAULT_BACKEND_USERNAME: &str = "default";
pub const DEFAULT_MAX_EXECUTION_TIME_SECS: u64 = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_MAX_LIMIT: u64 = 1000;

pub const DEFAULT_SQL_DIRECTORY: &str = "sql";
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_TELEMETRY_ENABLED: bool = false;
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

pub const ENV_PREFIX: &str = "CHAINGATE";

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(SecretString::from))
}

#[derive(Debug, Deserialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerSettings,
    #[serde(default)]
    #[validate(nested)]
    pub backend: BackendSettings,
    #[serde(default)]
    #[validate(nested)]
    pub limits: QueryLimits,
    #[serde(default)]
    #[validate(custom(function = "validate_networks"))]
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub sql: SqlSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    #[validate(length(min = 1))]
    pub listen_addr: String,

    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            name: default_server_name(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

/// Column-store connection and execution settings.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct BackendSettings {
    #[serde(default = "default_backend_url")]
    #[validate(url)]
    pub url: String,

    #[serde(default = "default_backend_username")]
    pub username: String,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Server-side execution ceiling. Responses whose elapsed time reaches
    /// it are reported as timeouts.
    #[serde(default = "default_max_execution_time")]
    #[validate(range(min = 1))]
    pub max_execution_time_secs: u64,

    /// Backend query-cache TTL; 0 disables the cache setting.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Extra backend settings appended to every query
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            username: default_backend_username(),
            password: None,
            max_execution_time_secs: default_max_execution_time(),
            cache_ttl_secs: default_cache_ttl(),
            request_timeout_secs: default_request_timeout(),
            settings: HashMap::new(),
        }
    }
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_backend_username() -> String {
    DEFAULT_BACKEND_USERNAME.to_string()
}

fn default_max_execution_time() -> u64 {
    DEFAULT_MAX_EXECUTION_TIME_SECS
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Pagination bounds for the `limit` field every paginated route accepts.
#[derive(Debug, Deserialize, Clone, Copy, Validate)]
#[validate(schema(function = "validate_limits"))]
pub struct QueryLimits {
    /// Baseline page size when `limit` is absent
    #[serde(default = "default_limit")]
    #[validate(range(min = 1))]
    pub default_limit: u64,
    /// Operator ceiling for `limit`
    #[serde(default = "default_max_limit")]
    #[validate(range(min = 1))]
    pub max_limit: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_max_limit() -> u64 {
    DEFAULT_MAX_LIMIT
}

fn validate_limits(limits: &QueryLimits) -> Result<(), validator::ValidationError> {
    if limits.default_limit > limits.max_limit {
        return Err(validator::ValidationError::new("default_limit_exceeds_max_limit"));
    }
    Ok(())
}

fn validate_networks(networks: &[NetworkConfig]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    for network in networks {
        if network.id.is_empty() || network.database.is_empty() {
            return Err(validator::ValidationError::new("empty_network_entry"));
        }
        if !seen.insert(network.id.as_str()) {
            return Err(validator::ValidationError::new("duplicate_network_id"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqlSettings {
    #[serde(default = "default_sql_directory")]
    pub directory: String,
}

impl Default for SqlSettings {
    fn default() -> Self {
        Self {
            directory: default_sql_directory(),
        }
    }
}

fn default_sql_directory() -> String {
    DEFAULT_SQL_DIRECTORY.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for the rolling `queries`/`errors` JSON logs
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_otlp_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    #[serde(default = "default_server_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            endpoint: default_otlp_endpoint(),
            service_name: default_server_name(),
        }
    }
}

fn default_telemetry_enabled() -> bool {
    DEFAULT_TELEMETRY_ENABLED
}

fn default_otlp_endpoint() -> String {
    DEFAULT_OTLP_ENDPOINT.to_string()
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // CHAINGATE_BACKEND__URL maps to backend.url, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}
