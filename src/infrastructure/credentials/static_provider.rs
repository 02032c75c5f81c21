use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::{Credential, CredentialProvider, DomainError};

/// Fixed key/secret map, read from configuration
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialProvider {
    secrets: HashMap<String, String>,
}

impl StaticCredentialProvider {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    pub fn with_secret(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), secret.into());
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get_credential(&self, key: &str) -> Result<Credential, DomainError> {
        self.secrets
            .get(key)
            .map(|secret| Credential::new(key, secret.clone()))
            .ok_or_else(|| DomainError::credential(format!("No static credential for '{}'", key)))
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}

/// Tries each provider in order, returning the first credential found
#[derive(Debug)]
pub struct ChainedCredentialProvider {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainedCredentialProvider {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl CredentialProvider for ChainedCredentialProvider {
    async fn get_credential(&self, key: &str) -> Result<Credential, DomainError> {
        let mut tried = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.get_credential(key).await {
                Ok(credential) => return Ok(credential),
                Err(_) => tried.push(provider.provider_name()),
            }
        }

        Err(DomainError::credential(format!(
            "Credential '{}' not found (tried: {})",
            key,
            tried.join(", ")
        )))
    }

    fn provider_name(&self) -> &'static str {
        "chained"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credentials::mock::MockCredentialProvider;

    #[tokio::test]
    async fn test_static_lookup() {
        let provider = StaticCredentialProvider::default().with_secret("openai", "sk-1");

        assert_eq!(provider.get_credential("openai").await.unwrap().api_key(), "sk-1");
        assert!(!provider.supports("anthropic").await);
    }

    #[tokio::test]
    async fn test_chain_falls_through_in_order() {
        let chain = ChainedCredentialProvider::new(vec![
            Box::new(StaticCredentialProvider::default().with_secret("a", "from-static")),
            Box::new(
                MockCredentialProvider::new()
                    .with_credential("a", "from-mock")
                    .with_credential("b", "only-mock"),
            ),
        ]);

        assert_eq!(chain.get_credential("a").await.unwrap().api_key(), "from-static");
        assert_eq!(chain.get_credential("b").await.unwrap().api_key(), "only-mock");

        let err = chain.get_credential("c").await.unwrap_err();
        assert!(err.to_string().contains("tried: static, mock"));
    }
}
