//! Environment variable secrets provider

use async_trait::async_trait;

use crate::{Provider, SecretsError};

/// Reads `<prefix><KEY>` first, then the bare `KEY`
#[derive(Debug, Clone, Default)]
pub struct EnvProvider {
    prefix: String,
}

impl EnvProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn candidates(&self, key: &str) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if !self.prefix.is_empty() {
            keys.push(format!("{}{}", self.prefix, key));
        }
        keys.push(key.to_string());
        keys
    }
}

#[async_trait]
impl Provider for EnvProvider {
    async fn get(&self, key: &str) -> Result<String, SecretsError> {
        self.candidates(key)
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .ok_or_else(|| SecretsError::NotFound(key.to_string()))
    }

    fn name(&self) -> &str {
        "env"
    }
}
