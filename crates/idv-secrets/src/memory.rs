//! In-memory secrets provider

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{Provider, SecretsError};

/// Fixed set of secrets held in memory
#[derive(Debug, Default)]
pub struct StaticProvider {
    values: RwLock<HashMap<String, String>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }
}

#[async_trait]
impl Provider for StaticProvider {
    async fn get(&self, key: &str) -> Result<String, SecretsError> {
        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SecretsError::NotFound(key.to_string()))
    }

    fn name(&self) -> &str {
        "static"
    }
}
