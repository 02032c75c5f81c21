//! PMP LLM Orchestrator
//!
//! Routes completion, embedding and streaming requests across multiple LLM
//! providers with support for:
//! - Per-provider circuit breakers and ordered fallback
//! - Token and cost estimation
//! - Response caching (in-memory or Redis)
//! - Sticky A/B experiments over provider bindings

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use self::config::AppConfig;

use std::sync::Arc;

use tracing::{info, warn};

use self::config::{ConfigurationSource, CredentialsConfig};
use domain::CredentialProvider;
use infrastructure::{
    cache::create_cache,
    credentials::{ChainedCredentialProvider, EnvCredentialProvider, StaticCredentialProvider},
    experiment::{AbTestManager, InMemoryAssignmentRepository, InMemoryExperimentResultRepository},
    llm::HttpAdapterFactory,
    orchestrator::ServiceManager,
};

/// Experiment manager backed by the in-memory repositories
pub type ExperimentManager =
    AbTestManager<InMemoryAssignmentRepository, InMemoryExperimentResultRepository>;

/// Wired services
#[derive(Debug)]
pub struct App {
    pub orchestrator: Arc<ServiceManager>,
    pub experiments: ExperimentManager,
}

/// Static keys take precedence over environment variables
pub fn create_credential_provider(config: &CredentialsConfig) -> Arc<dyn CredentialProvider> {
    let env = match &config.env_prefix {
        Some(prefix) => EnvCredentialProvider::new().with_prefix(prefix.clone()),
        None => EnvCredentialProvider::new(),
    };

    Arc::new(ChainedCredentialProvider::new(vec![
        Box::new(StaticCredentialProvider::new(config.static_keys.clone())),
        Box::new(env),
    ]))
}

/// Build the orchestrator and experiment manager for `config`.
///
/// `source` is kept by the orchestrator for later reloads. An unreachable
/// cache backend disables caching instead of failing startup.
pub async fn create_app(
    config: &AppConfig,
    source: Arc<dyn ConfigurationSource>,
) -> anyhow::Result<App> {
    let credentials = create_credential_provider(&config.credentials);
    let factory = Arc::new(HttpAdapterFactory::new(config.orchestrator.default_timeout()));

    let mut orchestrator = ServiceManager::start(source, factory, credentials).await?;

    if config.orchestrator.enable_caching {
        match create_cache(&config.cache).await {
            Ok(cache) => {
                info!(backend = %config.cache.cache_type, "Response cache enabled");
                orchestrator = orchestrator.with_cache(cache);
            }
            Err(e) => warn!(error = %e, "Response cache unavailable, continuing without it"),
        }
    }

    let orchestrator = Arc::new(orchestrator);
    let experiments = AbTestManager::new(
        Arc::clone(&orchestrator),
        Arc::new(InMemoryAssignmentRepository::new()),
        Arc::new(InMemoryExperimentResultRepository::new()),
    );

    Ok(App {
        orchestrator,
        experiments,
    })
}
