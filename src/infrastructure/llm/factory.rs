use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::http_client::HttpClient;
use super::{AnthropicAdapter, OpenAiAdapter};
use crate::config::ProviderConfig;
use crate::domain::{Credential, DomainError, ProviderAdapter, ProviderKind};

/// Builds adapters from provider configuration
pub trait AdapterFactory: Send + Sync + Debug {
    /// Create an adapter; `credential` is `None` when the provider has no
    /// credential key configured
    fn create(
        &self,
        config: &ProviderConfig,
        credential: Option<&Credential>,
    ) -> Result<Arc<dyn ProviderAdapter>, DomainError>;
}

/// Factory for the HTTP-backed adapters
#[derive(Debug, Clone)]
pub struct HttpAdapterFactory {
    default_timeout: Duration,
}

impl HttpAdapterFactory {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        credential: Option<&Credential>,
    ) -> Result<Arc<dyn ProviderAdapter>, DomainError> {
        if config.requires_credential() && credential.is_none() {
            return Err(DomainError::credential(format!(
                "Provider '{}' requires a credential",
                config.name
            )));
        }

        let api_key = credential.map(Credential::api_key).unwrap_or_default();
        let timeout = config.timeout().unwrap_or(self.default_timeout);
        let http_client = HttpClient::with_timeout(timeout)?;
        let profile = config.profile();

        debug!(provider = %config.name, kind = %config.kind, "Creating provider adapter");

        let adapter: Arc<dyn ProviderAdapter> = match (config.kind, &config.base_url) {
            (ProviderKind::OpenAi, Some(base_url)) => Arc::new(OpenAiAdapter::with_base_url(
                profile,
                http_client,
                api_key,
                base_url,
            )),
            (ProviderKind::OpenAi, None) => {
                Arc::new(OpenAiAdapter::new(profile, http_client, api_key))
            }
            (ProviderKind::Anthropic, Some(base_url)) => Arc::new(
                AnthropicAdapter::with_base_url(profile, http_client, api_key, base_url),
            ),
            (ProviderKind::Anthropic, None) => {
                Arc::new(AnthropicAdapter::new(profile, http_client, api_key))
            }
        };

        Ok(adapter)
    }
}
