//! Identity verification service configuration
//!
//! Configuration is resolved once at startup:
//! 1. built-in defaults
//! 2. optional TOML file (path in `IDV_CONFIG`)
//! 3. environment variable overrides
//!
//! ## Environment Variables
//!
//! | Variable | Section field |
//! |----------|---------------|
//! | `IDV_HOST` | `server.host` |
//! | `IDV_PORT` / `PORT` | `server.port` |
//! | `IDV_METRICS_PORT` | `server.metrics_port` |
//! | `IDV_MONGO_URL` | `mongo.url` |
//! | `IDV_MONGO_DB` | `mongo.database` |
//! | `IDV_PROVIDER_BASE_URL` | `provider.api_base_url` |
//! | `IDV_AUTH_BASE_URL` | `auth_identity.api_base_url` |
//! | `IDV_AUTH_PROJECT_ID` | `auth_identity.project_id` |
//! | `IDV_POLICY` | `reconciliation.policy` |
//! | `IDV_SECRETS_PROVIDER` | `secrets.provider` |
//! | `IDV_LOG_FORMAT` | `logging.format` |

use std::path::Path;
use std::time::Duration;

use idv_common::{LogFormat, ReconciliationPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable holding the optional TOML file path
pub const CONFIG_PATH_ENV: &str = "IDV_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            metrics_port: 9090,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub url: String,
    pub database: String,
    pub users_collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "idv".to_string(),
            users_collection: "users".to_string(),
        }
    }
}

/// Identity provider REST API and webhook settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_base_url: String,
    /// Maximum age of a signed webhook timestamp
    pub signature_tolerance_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.stripe.com".to_string(),
            signature_tolerance_secs: 300,
        }
    }
}

/// Auth provider admin API used to delete rejected accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthIdentityConfig {
    pub api_base_url: String,
    pub project_id: String,
}

impl Default for AuthIdentityConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://identitytoolkit.googleapis.com".to_string(),
            project_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub policy: ReconciliationPolicy,
    /// Unit suffixes stripped from stored age labels. The first one is used
    /// when rendering a corrected age.
    pub age_suffixes: Vec<String>,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            policy: ReconciliationPolicy::Lenient,
            age_suffixes: vec!["ans".to_string()],
        }
    }
}

/// Bounds on every remote call made while handling an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub provider_ms: u64,
    pub store_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            provider_ms: 10_000,
            store_ms: 5_000,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn provider(&self) -> Duration {
        Duration::from_millis(self.provider_ms)
    }

    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsSection {
    /// Secrets backend; only `env` is supported
    pub provider: String,
}

impl Default for SecretsSection {
    fn default() -> Self {
        Self {
            provider: "env".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mongo: MongoConfig,
    pub provider: ProviderConfig,
    pub auth_identity: AuthIdentityConfig,
    pub reconciliation: ReconciliationConfig,
    pub timeouts: TimeoutConfig,
    pub secrets: SecretsSection,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from `IDV_CONFIG` (if set) and the process environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IDV_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("IDV_PORT").or_else(|| lookup("PORT")) {
            self.server.port = parse_env("IDV_PORT", &v)?;
        }
        if let Some(v) = lookup("IDV_METRICS_PORT") {
            self.server.metrics_port = parse_env("IDV_METRICS_PORT", &v)?;
        }
        if let Some(v) = lookup("IDV_MONGO_URL") {
            self.mongo.url = v;
        }
        if let Some(v) = lookup("IDV_MONGO_DB") {
            self.mongo.database = v;
        }
        if let Some(v) = lookup("IDV_PROVIDER_BASE_URL") {
            self.provider.api_base_url = v;
        }
        if let Some(v) = lookup("IDV_AUTH_BASE_URL") {
            self.auth_identity.api_base_url = v;
        }
        if let Some(v) = lookup("IDV_AUTH_PROJECT_ID") {
            self.auth_identity.project_id = v;
        }
        if let Some(v) = lookup("IDV_POLICY") {
            self.reconciliation.policy = parse_env("IDV_POLICY", &v)?;
        }
        if let Some(v) = lookup("IDV_SECRETS_PROVIDER") {
            self.secrets.provider = v;
        }
        if let Some(v) = lookup("IDV_LOG_FORMAT") {
            self.logging.format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "IDV_LOG_FORMAT".to_string(),
                        value: v,
                    })
                }
            };
        }
        debug!("Applied environment overrides");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mongo.database.trim().is_empty() {
            return Err(ConfigError::Validation("mongo.database must not be empty".to_string()));
        }
        if self.reconciliation.age_suffixes.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "reconciliation.age_suffixes needs at least one non-empty suffix".to_string(),
            ));
        }
        if self.timeouts.connect_ms == 0 || self.timeouts.provider_ms == 0 || self.timeouts.store_ms == 0 {
            return Err(ConfigError::Validation("timeouts must be greater than zero".to_string()));
        }
        if self.server.port == self.server.metrics_port {
            return Err(ConfigError::Validation(
                "server.port and server.metrics_port must differ".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
