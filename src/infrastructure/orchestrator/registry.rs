//! Immutable routing snapshot swapped on configuration reload

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::OrchestratorConfig;
use crate::domain::{
    Capability, CircuitBreaker, DomainError, ExperimentDefinition, ProviderAdapter,
    ProviderMetrics,
};

/// Which providers a dispatch may use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Route {
    /// Every capable provider, by ascending priority
    #[default]
    Ranked,
    /// Only the named provider
    Pinned(String),
}

impl Route {
    pub fn pinned(provider: impl Into<String>) -> Self {
        Self::Pinned(provider.into())
    }

    pub fn pin(&self) -> Option<&str> {
        match self {
            Self::Ranked => None,
            Self::Pinned(name) => Some(name),
        }
    }
}

/// A registered provider with its breaker and counters
#[derive(Debug)]
pub struct ProviderEntry {
    adapter: Arc<dyn ProviderAdapter>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<ProviderMetrics>,
}

impl ProviderEntry {
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        breaker: Arc<CircuitBreaker>,
        metrics: Arc<ProviderMetrics>,
    ) -> Self {
        Self {
            adapter,
            breaker,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn metrics(&self) -> &Arc<ProviderMetrics> {
        &self.metrics
    }

    pub fn priority(&self) -> u32 {
        self.adapter.profile().priority
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.adapter.capabilities().contains(capability)
    }

    /// Per-attempt deadline
    pub fn timeout(&self, default: Duration) -> Duration {
        self.adapter.profile().timeout.unwrap_or(default)
    }
}

/// Everything one dispatch needs, read from a single configuration load
#[derive(Debug)]
pub struct RoutingTable {
    settings: OrchestratorConfig,
    entries: Vec<Arc<ProviderEntry>>,
    experiments: Vec<ExperimentDefinition>,
    limiter: Arc<Semaphore>,
}

impl RoutingTable {
    pub fn new(
        settings: OrchestratorConfig,
        mut entries: Vec<Arc<ProviderEntry>>,
        experiments: Vec<ExperimentDefinition>,
    ) -> Self {
        entries.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        let limiter = Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1)));

        Self {
            settings,
            entries,
            experiments,
            limiter,
        }
    }

    /// Same providers and concurrency budget with a new experiment set
    pub fn with_experiments(&self, experiments: Vec<ExperimentDefinition>) -> Self {
        Self {
            settings: self.settings.clone(),
            entries: self.entries.clone(),
            experiments,
            limiter: Arc::clone(&self.limiter),
        }
    }

    pub fn settings(&self) -> &OrchestratorConfig {
        &self.settings
    }

    /// Providers in routing order
    pub fn entries(&self) -> &[Arc<ProviderEntry>] {
        &self.entries
    }

    pub fn experiments(&self) -> &[ExperimentDefinition] {
        &self.experiments
    }

    pub fn limiter(&self) -> &Arc<Semaphore> {
        &self.limiter
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ProviderEntry>> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    /// Ordered providers eligible to serve `capability` on `route`
    pub fn candidates(
        &self,
        route: &Route,
        capability: Capability,
    ) -> Result<Vec<Arc<ProviderEntry>>, DomainError> {
        if self.entries.is_empty() {
            return Err(DomainError::configuration("No providers are registered"));
        }

        let candidates: Vec<_> = match route.pin() {
            Some(name) => {
                let entry = self
                    .get(name)
                    .ok_or_else(|| DomainError::unknown_provider(name))?;
                vec![Arc::clone(entry)]
            }
            None => self.entries.clone(),
        };

        let capable: Vec<_> = candidates
            .into_iter()
            .filter(|entry| entry.supports(capability))
            .collect();

        if capable.is_empty() {
            return Err(DomainError::invalid_request(match route.pin() {
                Some(name) => format!("Provider '{}' does not support {}", name, capability),
                None => format!("No registered provider supports {}", capability),
            }));
        }

        Ok(capable)
    }
}
