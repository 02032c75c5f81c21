use async_trait::async_trait;
use std::fmt::Debug;

use super::Credential;
use crate::domain::DomainError;

/// Source of provider secrets (environment, static map, ...)
#[async_trait]
pub trait CredentialProvider: Send + Sync + Debug {
    /// Resolve the credential stored under `key`
    async fn get_credential(&self, key: &str) -> Result<Credential, DomainError>;

    /// Whether `key` can currently be resolved
    async fn supports(&self, key: &str) -> bool {
        self.get_credential(key).await.is_ok()
    }

    /// Get provider name for logging/debugging
    fn provider_name(&self) -> &'static str;
}
