//! Secrets resolution
//!
//! Provides a unified interface for the credentials the service needs at
//! startup:
//! - Environment variables (default)
//! - Static in-memory map for tests and embedding callers

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

mod env;
mod memory;

pub use env::EnvProvider;
pub use memory::StaticProvider;

/// Identity provider API key
pub const PROVIDER_API_KEY: &str = "STRIPE_SECRET_KEY";
/// Shared secret used to sign webhook deliveries
pub const WEBHOOK_SIGNING_SECRET: &str = "STRIPE_WEBHOOK_SECRET";
/// Bearer token for the auth provider admin API
pub const AUTH_ADMIN_TOKEN: &str = "AUTH_ADMIN_TOKEN";

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secret not found: {0}")]
    NotFound(String),
    #[error("Secret is empty: {0}")]
    Empty(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Configuration for secrets providers
#[derive(Debug, Clone)]
pub struct SecretsConfig {
    pub provider: String,
    /// Prefix tried before the bare key by the env provider
    pub env_prefix: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: "env".to_string(),
            env_prefix: "IDV_SECRET_".to_string(),
        }
    }
}

/// Secrets provider trait
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get a secret by key
    async fn get(&self, key: &str) -> Result<String, SecretsError>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Create a provider based on configuration
pub fn create_provider(config: &SecretsConfig) -> Result<Arc<dyn Provider>, SecretsError> {
    match config.provider.as_str() {
        "env" => {
            info!("Using environment variable secrets provider");
            Ok(Arc::new(EnvProvider::with_prefix(config.env_prefix.clone())))
        }
        other => Err(SecretsError::ProviderError(format!("Unknown provider: {}", other))),
    }
}

/// Credentials resolved once at startup
#[derive(Clone)]
pub struct ServiceSecrets {
    pub provider_api_key: String,
    pub webhook_signing_secret: String,
    pub auth_admin_token: String,
}

impl std::fmt::Debug for ServiceSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSecrets")
            .field("provider_api_key", &"***")
            .field("webhook_signing_secret", &"***")
            .field("auth_admin_token", &"***")
            .finish()
    }
}

impl ServiceSecrets {
    pub async fn resolve(provider: &dyn Provider) -> Result<Self, SecretsError> {
        let secrets = Self {
            provider_api_key: require(provider, PROVIDER_API_KEY).await?,
            webhook_signing_secret: require(provider, WEBHOOK_SIGNING_SECRET).await?,
            auth_admin_token: require(provider, AUTH_ADMIN_TOKEN).await?,
        };
        info!(provider = provider.name(), "Service secrets resolved");
        Ok(secrets)
    }
}

async fn require(provider: &dyn Provider, key: &str) -> Result<String, SecretsError> {
    let value = provider.get(key).await?;
    if value.trim().is_empty() {
        return Err(SecretsError::Empty(key.to_string()));
    }
    Ok(value)
}
