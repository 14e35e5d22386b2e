//! Lookup of externally managed secrets

use crate::error::Result;
use async_trait::async_trait;

/// Answers whether a secret exists in the configuration store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretProbe: Send + Sync {
    async fn secret_exists(&self, namespace: &str, name: &str) -> Result<bool>;
}

/// Probe for callers without a secret store; nothing exists
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSecretProbe;

#[async_trait]
impl SecretProbe for NoopSecretProbe {
    async fn secret_exists(&self, _namespace: &str, _name: &str) -> Result<bool> {
        Ok(false)
    }
}
