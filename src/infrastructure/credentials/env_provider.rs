use async_trait::async_trait;
use std::env;

use crate::domain::{Credential, CredentialProvider, DomainError};

/// Resolves credential keys as environment variable names.
///
/// An optional prefix is prepended on lookup, so `OPENAI_API_KEY` with prefix
/// `STAGING_` reads `STAGING_OPENAI_API_KEY`.
#[derive(Debug, Default)]
pub struct EnvCredentialProvider {
    prefix: Option<String>,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn get_credential(&self, key: &str) -> Result<Credential, DomainError> {
        let var = self.var_name(key);

        match env::var(&var) {
            Ok(value) if !value.trim().is_empty() => Ok(Credential::new(key, value)),
            Ok(_) => Err(DomainError::credential(format!(
                "Environment variable '{}' is empty",
                var
            ))),
            Err(_) => Err(DomainError::credential(format!(
                "Environment variable '{}' not set",
                var
            ))),
        }
    }

    async fn supports(&self, key: &str) -> bool {
        env::var(self.var_name(key)).is_ok_and(|value| !value.trim().is_empty())
    }

    fn provider_name(&self) -> &'static str {
        "env"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_set_variable() {
        // SAFETY: variable name is unique to this test
        unsafe { env::set_var("ORCH_TEST_OPENAI_KEY", "sk-test-123") };

        let provider = EnvCredentialProvider::new();
        let cred = provider.get_credential("ORCH_TEST_OPENAI_KEY").await.unwrap();

        assert_eq!(cred.api_key(), "sk-test-123");
        assert_eq!(cred.key(), "ORCH_TEST_OPENAI_KEY");

        // SAFETY: test cleanup
        unsafe { env::remove_var("ORCH_TEST_OPENAI_KEY") };
    }

    #[tokio::test]
    async fn test_prefix_is_applied() {
        // SAFETY: variable name is unique to this test
        unsafe { env::set_var("STAGING_ORCH_TEST_KEY", "sk-staging") };

        let provider = EnvCredentialProvider::new().with_prefix("STAGING_");

        assert!(provider.supports("ORCH_TEST_KEY").await);
        let cred = provider.get_credential("ORCH_TEST_KEY").await.unwrap();
        assert_eq!(cred.api_key(), "sk-staging");

        // SAFETY: test cleanup
        unsafe { env::remove_var("STAGING_ORCH_TEST_KEY") };
    }

    #[tokio::test]
    async fn test_missing_variable() {
        let provider = EnvCredentialProvider::new();

        let result = provider.get_credential("ORCH_NONEXISTENT_VAR_12345").await;

        assert!(matches!(result, Err(DomainError::Credential { .. })));
        assert!(!provider.supports("ORCH_NONEXISTENT_VAR_12345").await);
    }
}
