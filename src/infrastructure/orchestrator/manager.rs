//! Multi-provider dispatch with circuit breaking, fallback and response caching

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock};
use tracing::{debug, info, instrument, warn};

use super::health::{ProviderHealth, SystemHealth};
use super::registry::{ProviderEntry, Route, RoutingTable};
use super::stream::CompletionStream;
use super::validation::{validate_config, ValidationReport};
use crate::config::{AppConfig, ConfigurationSource, OrchestratorConfig, ProviderConfig};
use crate::domain::experiment::validate_experiment;
use crate::domain::{
    completion_fingerprint, Cache, CacheExt, CallPermit, Capability, CircuitBreaker,
    CircuitBreakerSettings, CircuitBreakerSnapshot, CostEstimate, CredentialProvider, DomainError,
    EmbeddingRequest, EmbeddingResponse, ExperimentDefinition, ProviderFailure,
    ProviderMetricsSnapshot, ProviderProfile, UnifiedRequest, UnifiedResponse,
};
use crate::infrastructure::llm::AdapterFactory;
use crate::infrastructure::observability::{
    record_cache_lookup, record_circuit_transition, record_provider_request, record_tokens,
    AttemptOutcome,
};

/// Operator command for [`ServiceManager::force_provider_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedStatus {
    Open,
    Close,
}

impl FromStr for ForcedStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "close" | "closed" => Ok(Self::Close),
            other => Err(DomainError::invalid_request(format!(
                "Unknown provider status '{}'. Valid values: open, close",
                other
            ))),
        }
    }
}

/// An attempt that succeeded and still holds its breaker permit
struct Served<T> {
    value: T,
    entry: Arc<ProviderEntry>,
    permit: CallPermit,
    started: Instant,
}

impl<T> Served<T> {
    fn succeed(self, operation: &'static str) -> (T, Arc<ProviderEntry>) {
        let elapsed = self.started.elapsed();

        self.permit.succeed();
        self.entry.metrics().record_success(elapsed);
        record_provider_request(self.entry.name(), operation, AttemptOutcome::Success, elapsed);

        (self.value, self.entry)
    }
}

/// Routes unified requests across registered providers.
///
/// The routing table is an immutable snapshot; each dispatch reads it once,
/// so a concurrent reload is observed entirely or not at all.
#[derive(Debug)]
pub struct ServiceManager {
    source: Arc<dyn ConfigurationSource>,
    factory: Arc<dyn AdapterFactory>,
    credentials: Arc<dyn CredentialProvider>,
    cache: Option<Arc<dyn Cache>>,
    table: RwLock<Arc<RoutingTable>>,
    reload_lock: Mutex<()>,
}

impl ServiceManager {
    /// Load configuration and register every provider that can be built.
    ///
    /// Providers whose credential or adapter cannot be resolved are skipped
    /// with a warning; `validate_configuration` reports them.
    pub async fn start(
        source: Arc<dyn ConfigurationSource>,
        factory: Arc<dyn AdapterFactory>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, DomainError> {
        let config = source.load().await?;
        let table = build_table(&config, factory.as_ref(), credentials.as_ref(), None).await;

        info!(
            providers = table.entries().len(),
            fallback = config.orchestrator.enable_fallback,
            circuit_breaker = config.orchestrator.enable_circuit_breaker,
            caching = config.orchestrator.enable_caching,
            "Service manager started"
        );

        Ok(Self {
            source,
            factory,
            credentials,
            cache: None,
            table: RwLock::new(Arc::new(table)),
            reload_lock: Mutex::new(()),
        })
    }

    /// Attach the response cache consulted when caching is enabled
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn snapshot(&self) -> Arc<RoutingTable> {
        Arc::clone(&*self.table.read().await)
    }

    async fn acquire_slot(&self, table: &RoutingTable) -> Result<OwnedSemaphorePermit, DomainError> {
        Arc::clone(table.limiter())
            .acquire_owned()
            .await
            .map_err(|_| DomainError::internal("Dispatch limiter closed"))
    }

    fn admit(settings: &OrchestratorConfig, entry: &ProviderEntry) -> Result<CallPermit, DomainError> {
        if settings.enable_circuit_breaker {
            entry.breaker().try_acquire()
        } else {
            Ok(CallPermit::unguarded())
        }
    }

    /// Try candidates in order until one succeeds or a non-recoverable error
    /// surfaces
    async fn dispatch<T, F, Fut>(
        &self,
        table: &RoutingTable,
        route: &Route,
        capability: Capability,
        operation: &'static str,
        call: F,
    ) -> Result<Served<T>, DomainError>
    where
        F: Fn(Arc<ProviderEntry>) -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let candidates = table.candidates(route, capability)?;
        let settings = table.settings();
        let mut failures = Vec::with_capacity(candidates.len());

        for entry in candidates {
            let permit = match Self::admit(settings, &entry) {
                Ok(permit) => permit,
                Err(e) => {
                    debug!(provider = %entry.name(), operation, "Skipping provider, circuit open");
                    record_provider_request(
                        entry.name(),
                        operation,
                        AttemptOutcome::Rejected,
                        Duration::ZERO,
                    );
                    failures.push(ProviderFailure::new(entry.name(), e.to_string()));
                    continue;
                }
            };

            let timeout = entry.timeout(settings.default_timeout());
            let started = Instant::now();

            let result = match tokio::time::timeout(timeout, call(Arc::clone(&entry))).await {
                Ok(result) => result,
                Err(_) => Err(DomainError::provider_timeout(
                    entry.name(),
                    timeout.as_millis() as u64,
                )),
            };

            match result {
                Ok(value) => {
                    return Ok(Served {
                        value,
                        entry,
                        permit,
                        started,
                    });
                }
                Err(e) if e.is_recoverable() => {
                    let elapsed = started.elapsed();
                    let outcome = match e {
                        DomainError::ProviderTimeout { .. } => AttemptOutcome::Timeout,
                        _ => AttemptOutcome::Failure,
                    };

                    warn!(provider = %entry.name(), operation, error = %e, "Provider attempt failed");
                    permit.fail();
                    entry.metrics().record_failure(elapsed);
                    record_provider_request(entry.name(), operation, outcome, elapsed);
                    failures.push(ProviderFailure::new(entry.name(), e.to_string()));

                    if !settings.enable_fallback {
                        break;
                    }
                }
                Err(e) => {
                    permit.release();
                    return Err(e);
                }
            }
        }

        warn!(operation, attempts = failures.len(), "All providers exhausted");
        Err(DomainError::exhausted(failures))
    }

    fn cache_for<'a>(&'a self, table: &RoutingTable) -> Option<&'a Arc<dyn Cache>> {
        self.cache
            .as_ref()
            .filter(|_| table.settings().enable_caching)
    }

    /// Generate a completion on the first live provider of `route`
    #[instrument(skip(self, request))]
    pub async fn execute_completion(
        &self,
        request: &UnifiedRequest,
        route: &Route,
    ) -> Result<UnifiedResponse, DomainError> {
        request.validate()?;
        let table = self.snapshot().await;

        let cache = self
            .cache_for(&table)
            .map(|cache| (cache, cache_key(request, route)));

        if let Some((cache, key)) = &cache {
            if let Some(mut cached) = lookup(cache.as_ref(), key).await {
                debug!(provider = %cached.provider, "Serving completion from cache");
                cached.cached = true;
                return Ok(cached);
            }
        }

        let _slot = self.acquire_slot(&table).await?;

        let served = self
            .dispatch(
                &table,
                route,
                Capability::Completion,
                "complete",
                move |entry| async move {
                    let model = entry.adapter().profile().resolve_model(request.model.as_deref());
                    entry.adapter().complete(&model, request).await
                },
            )
            .await?;

        let (mut response, entry) = served.succeed("complete");
        response.provider = entry.name().to_string();
        record_tokens(
            entry.name(),
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
        );

        if let Some((cache, key)) = &cache {
            let ttl = table.settings().cache_ttl();
            if let Err(e) = cache.set(key, &response, ttl).await {
                warn!(error = %e, "Failed to populate response cache");
            }
        }

        Ok(response)
    }

    /// Embed text on the first live embedding-capable provider of `route`
    #[instrument(skip(self, request))]
    pub async fn execute_embedding(
        &self,
        request: &EmbeddingRequest,
        route: &Route,
    ) -> Result<EmbeddingResponse, DomainError> {
        request.validate()?;
        let table = self.snapshot().await;
        let _slot = self.acquire_slot(&table).await?;

        let served = self
            .dispatch(
                &table,
                route,
                Capability::Embedding,
                "embed",
                move |entry| async move {
                    let model = entry
                        .adapter()
                        .profile()
                        .resolve_embedding_model(request.model());
                    entry.adapter().embed(&model, request).await
                },
            )
            .await?;

        let (response, entry) = served.succeed("embed");
        Ok(response.with_provider(entry.name()))
    }

    /// Open a streaming completion; fallback applies until a provider accepts
    #[instrument(skip(self, request))]
    pub async fn stream_completion(
        &self,
        request: &UnifiedRequest,
        route: &Route,
    ) -> Result<CompletionStream, DomainError> {
        request.validate()?;
        let table = self.snapshot().await;
        let slot = self.acquire_slot(&table).await?;

        let served = self
            .dispatch(
                &table,
                route,
                Capability::Streaming,
                "stream",
                move |entry| async move {
                    let model = entry.adapter().profile().resolve_model(request.model.as_deref());
                    let chunks = entry.adapter().stream(&model, request).await?;
                    Ok((model, chunks))
                },
            )
            .await?;

        let Served {
            value: (model, chunks),
            entry,
            permit,
            started,
        } = served;
        let idle_timeout = entry.timeout(table.settings().default_timeout());

        Ok(CompletionStream::new(
            entry.name(),
            model,
            chunks,
            permit,
            Arc::clone(entry.metrics()),
            started,
            slot,
            idle_timeout,
        ))
    }

    /// Pre-dispatch cost estimate on every candidate of `route`, in routing order
    pub async fn estimate_costs(
        &self,
        request: &UnifiedRequest,
        route: &Route,
    ) -> Result<Vec<(String, CostEstimate)>, DomainError> {
        request.validate()?;
        let table = self.snapshot().await;

        Ok(table
            .candidates(route, Capability::Completion)?
            .iter()
            .map(|entry| (entry.name().to_string(), entry.adapter().estimate_cost(request)))
            .collect())
    }

    /// Availability derived from breaker states and the last health checks
    pub async fn get_system_health_status(&self) -> SystemHealth {
        let table = self.snapshot().await;

        let providers = table
            .entries()
            .iter()
            .map(|entry| {
                let metrics = entry.metrics().snapshot(entry.name());
                ProviderHealth::new(
                    entry.name(),
                    entry.breaker().status(),
                    metrics.success_rate(),
                    metrics.last_health_check,
                )
            })
            .collect();

        SystemHealth::from_providers(providers)
    }

    /// Probe every provider once, concurrently, and record the results
    pub async fn run_health_checks(&self) -> BTreeMap<String, bool> {
        let table = self.snapshot().await;
        let default_timeout = table.settings().default_timeout();

        let checks = table.entries().iter().map(|entry| {
            let entry = Arc::clone(entry);
            async move {
                let timeout = entry.timeout(default_timeout);
                let healthy = tokio::time::timeout(timeout, entry.adapter().health_check())
                    .await
                    .unwrap_or_else(|_| {
                        warn!(provider = %entry.name(), "Health check timed out");
                        false
                    });

                entry.metrics().record_health_check(healthy);
                (entry.name().to_string(), healthy)
            }
        });

        join_all(checks).await.into_iter().collect()
    }

    pub async fn get_provider_metrics(&self) -> Vec<ProviderMetricsSnapshot> {
        let table = self.snapshot().await;

        table
            .entries()
            .iter()
            .map(|entry| entry.metrics().snapshot(entry.name()))
            .collect()
    }

    pub async fn get_circuit_breaker_status(&self) -> Vec<CircuitBreakerSnapshot> {
        let table = self.snapshot().await;

        table
            .entries()
            .iter()
            .map(|entry| entry.breaker().snapshot())
            .collect()
    }

    /// Registered providers in routing order
    pub async fn get_configured_providers(&self) -> Vec<ProviderProfile> {
        let table = self.snapshot().await;

        table
            .entries()
            .iter()
            .map(|entry| entry.adapter().profile().clone())
            .collect()
    }

    pub async fn provider_profile(&self, name: &str) -> Option<ProviderProfile> {
        let table = self.snapshot().await;
        table.get(name).map(|entry| entry.adapter().profile().clone())
    }

    /// Experiment definitions from the configuration currently in effect
    pub async fn configured_experiments(&self) -> Vec<ExperimentDefinition> {
        self.snapshot().await.experiments().to_vec()
    }

    pub async fn experiment(&self, id: &str) -> Option<ExperimentDefinition> {
        let table = self.snapshot().await;
        table.experiments().iter().find(|e| e.id == id).cloned()
    }

    /// Swap the experiment set while keeping providers, breakers and the
    /// concurrency budget. Definitions with validation errors are rejected
    /// and the current set stays in effect.
    pub async fn replace_experiments(
        &self,
        experiments: Vec<ExperimentDefinition>,
    ) -> Result<(), DomainError> {
        let _guard = self.reload_lock.lock().await;
        let previous = self.snapshot().await;

        let known: HashSet<&str> = previous.entries().iter().map(|e| e.name()).collect();
        let mut ids = HashSet::new();
        let mut errors = Vec::new();

        for experiment in &experiments {
            if !ids.insert(experiment.id.as_str()) {
                errors.push(format!("Experiment '{}' is declared more than once", experiment.id));
            }
            errors.extend(
                validate_experiment(experiment, &known)
                    .into_iter()
                    .filter(|issue| !issue.is_warning())
                    .map(|issue| issue.to_string()),
            );
        }

        if !errors.is_empty() {
            warn!(errors = ?errors, "Experiment reload rejected");
            return Err(DomainError::configuration(format!(
                "Invalid experiments: {}",
                errors.join("; ")
            )));
        }

        let count = experiments.len();
        let table = previous.with_experiments(experiments);
        *self.table.write().await = Arc::new(table);

        info!(experiments = count, "Experiments replaced");
        Ok(())
    }

    /// Close the provider's circuit and clear its counters
    pub async fn reset_provider(&self, name: &str) -> Result<(), DomainError> {
        let table = self.snapshot().await;
        let entry = table
            .get(name)
            .ok_or_else(|| DomainError::unknown_provider(name))?;

        entry.breaker().reset();
        entry.metrics().reset();

        info!(provider = %name, "Provider reset");
        Ok(())
    }

    pub async fn force_provider_status(
        &self,
        name: &str,
        status: ForcedStatus,
    ) -> Result<CircuitBreakerSnapshot, DomainError> {
        let table = self.snapshot().await;
        let entry = table
            .get(name)
            .ok_or_else(|| DomainError::unknown_provider(name))?;

        match status {
            ForcedStatus::Open => entry.breaker().force_open(),
            ForcedStatus::Close => entry.breaker().force_close(),
        }

        info!(provider = %name, status = ?status, "Provider status forced");
        Ok(entry.breaker().snapshot())
    }

    /// Reload from the configuration source and swap the routing table.
    ///
    /// A configuration with validation errors is rejected and the current
    /// table stays in effect. Breakers and counters carry over for providers
    /// whose name is unchanged.
    pub async fn reload_configuration(&self) -> Result<ValidationReport, DomainError> {
        let _guard = self.reload_lock.lock().await;

        let config = self.source.load().await?;
        let report = validate_config(&config, self.credentials.as_ref()).await;

        if !report.is_valid() {
            warn!(errors = ?report.errors, "Configuration reload rejected");
            return Err(DomainError::configuration(format!(
                "Invalid configuration: {}",
                report.errors.join("; ")
            )));
        }

        let previous = self.snapshot().await;
        let table = build_table(
            &config,
            self.factory.as_ref(),
            self.credentials.as_ref(),
            Some(&previous),
        )
        .await;
        let providers = table.entries().len();

        *self.table.write().await = Arc::new(table);

        info!(providers, warnings = report.warnings.len(), "Configuration reloaded");
        Ok(report)
    }

    /// Validate the configuration the source currently holds
    pub async fn validate_configuration(&self) -> Result<ValidationReport, DomainError> {
        let config = self.source.load().await?;
        Ok(validate_config(&config, self.credentials.as_ref()).await)
    }
}

fn cache_key(request: &UnifiedRequest, route: &Route) -> String {
    let fingerprint = completion_fingerprint(request);

    // Pinned responses must not leak into other routes
    match route.pin() {
        Some(provider) => format!("{}:{}", fingerprint, provider),
        None => fingerprint,
    }
}

async fn lookup(cache: &dyn Cache, key: &str) -> Option<UnifiedResponse> {
    let result: Result<Option<UnifiedResponse>, DomainError> = cache.get(key).await;

    match result {
        Ok(hit) => {
            record_cache_lookup(hit.is_some());
            hit
        }
        Err(e) => {
            warn!(error = %e, "Cache lookup failed, dispatching");
            record_cache_lookup(false);
            None
        }
    }
}

async fn build_table(
    config: &AppConfig,
    factory: &dyn AdapterFactory,
    credentials: &dyn CredentialProvider,
    previous: Option<&RoutingTable>,
) -> RoutingTable {
    let settings = config.orchestrator.circuit_breaker.settings();
    let mut entries: Vec<Arc<ProviderEntry>> = Vec::new();

    for provider in config.providers.iter().filter(|p| p.enabled) {
        if entries.iter().any(|entry| entry.name() == provider.name) {
            warn!(provider = %provider.name, "Duplicate provider name, keeping the first");
            continue;
        }

        match build_entry(provider, factory, credentials, settings, previous).await {
            Ok(entry) => entries.push(Arc::new(entry)),
            Err(e) => warn!(provider = %provider.name, error = %e, "Provider not registered"),
        }
    }

    RoutingTable::new(
        config.orchestrator.clone(),
        entries,
        config.experiments.clone(),
    )
}

async fn build_entry(
    provider: &ProviderConfig,
    factory: &dyn AdapterFactory,
    credentials: &dyn CredentialProvider,
    settings: CircuitBreakerSettings,
    previous: Option<&RoutingTable>,
) -> Result<ProviderEntry, DomainError> {
    let credential = match &provider.credential_key {
        Some(key) => Some(credentials.get_credential(key).await?),
        None => None,
    };

    let adapter = factory.create(provider, credential.as_ref())?;
    let existing = previous.and_then(|table| table.get(&provider.name));

    let breaker = match existing {
        Some(entry) if *entry.breaker().settings() == settings => Arc::clone(entry.breaker()),
        _ => Arc::new(
            CircuitBreaker::new(provider.name.clone(), settings)
                .with_observer(Arc::new(record_circuit_transition)),
        ),
    };
    let metrics = existing
        .map(|entry| Arc::clone(entry.metrics()))
        .unwrap_or_default();

    Ok(ProviderEntry::new(adapter, breaker, metrics))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;
    use super::super::health::HealthStatus;
    use crate::config::{CircuitBreakerConfig, StaticConfigurationSource};
    use crate::domain::credentials::mock::MockCredentialProvider;
    use crate::domain::provider::MockBehavior;
    use crate::domain::{CircuitStatus, ProviderKind};
    use crate::infrastructure::cache::InMemoryCache;
    use crate::infrastructure::llm::MockAdapterFactory;

    fn provider(name: &str, priority: u32) -> ProviderConfig {
        ProviderConfig::new(name, ProviderKind::OpenAi, "base-model")
            .with_base_url("http://mock.invalid")
            .with_priority(priority)
    }

    fn config(providers: Vec<ProviderConfig>) -> AppConfig {
        let mut config = AppConfig {
            providers,
            ..Default::default()
        };
        config.orchestrator.circuit_breaker = CircuitBreakerConfig {
            failure_threshold: 2,
            failure_window_ms: 60_000,
            cooldown_ms: 60_000,
        };
        config
    }

    fn abc() -> AppConfig {
        config(vec![provider("A", 1), provider("B", 2), provider("C", 3)])
    }

    async fn manager_with_source(
        source: Arc<StaticConfigurationSource>,
    ) -> (ServiceManager, Arc<MockAdapterFactory>) {
        let factory = Arc::new(MockAdapterFactory::new());
        let manager = ServiceManager::start(
            source,
            factory.clone(),
            Arc::new(MockCredentialProvider::new().with_credential("KEY", "secret")),
        )
        .await
        .unwrap();

        (manager, factory)
    }

    async fn manager(config: AppConfig) -> (ServiceManager, Arc<MockAdapterFactory>) {
        manager_with_source(Arc::new(StaticConfigurationSource::new(config))).await
    }

    fn request() -> UnifiedRequest {
        UnifiedRequest::from_prompt("Summarize the quarterly report")
    }

    async fn metrics_for(manager: &ServiceManager, name: &str) -> ProviderMetricsSnapshot {
        manager
            .get_provider_metrics()
            .await
            .into_iter()
            .find(|m| m.provider == name)
            .unwrap()
    }

    async fn breaker_for(manager: &ServiceManager, name: &str) -> CircuitBreakerSnapshot {
        manager
            .get_circuit_breaker_status()
            .await
            .into_iter()
            .find(|b| b.provider == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_served_by_first_priority_provider() {
        let (manager, factory) = manager(abc()).await;

        let response = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();

        assert_eq!(response.provider, "A");
        assert_eq!(response.text, "response from A");
        assert!(!response.cached);
        assert_eq!(factory.adapter("B").calls(), 0);
        assert_eq!(metrics_for(&manager, "A").await.success_count, 1);
    }

    #[tokio::test]
    async fn test_open_circuits_are_skipped() {
        let (manager, factory) = manager(abc()).await;
        manager.force_provider_status("A", ForcedStatus::Open).await.unwrap();
        manager.force_provider_status("B", ForcedStatus::Open).await.unwrap();

        let response = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();

        assert_eq!(response.provider, "C");
        assert_eq!(factory.adapter("A").calls(), 0);
        assert_eq!(factory.adapter("B").calls(), 0);
    }

    #[tokio::test]
    async fn test_forced_open_skips_provider_with_zero_failures() {
        let (manager, factory) = manager(abc()).await;

        let snapshot = manager.force_provider_status("A", ForcedStatus::Open).await.unwrap();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.status, CircuitStatus::Open);

        let response = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();

        assert_eq!(response.provider, "B");
        assert_eq!(factory.adapter("A").calls(), 0);
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let (manager, factory) = manager(abc()).await;
        for name in ["A", "B", "C"] {
            factory
                .adapter(name)
                .set_behavior(MockBehavior::Fail(format!("{} is down", name)));
        }

        let error = manager
            .execute_completion(&request(), &Route::Ranked)
            .await
            .unwrap_err();

        let failures = error.failures();
        assert!(matches!(error, DomainError::AllProvidersExhausted { .. }));
        assert_eq!(failures.len(), 3);
        assert_eq!(
            failures.iter().map(|f| f.provider.as_str()).collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
        assert!(failures[1].reason.contains("B is down"));
        assert_eq!(metrics_for(&manager, "C").await.failure_count, 1);
    }

    #[tokio::test]
    async fn test_fallback_on_failure_counts_against_breaker() {
        let (manager, factory) = manager(abc()).await;
        factory.adapter("A").set_behavior(MockBehavior::Fail("HTTP 503".into()));

        let response = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        assert_eq!(response.provider, "B");
        assert_eq!(breaker_for(&manager, "A").await.consecutive_failures, 1);

        manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        assert_eq!(breaker_for(&manager, "A").await.status, CircuitStatus::Open);

        manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        assert_eq!(factory.adapter("A").calls(), 2);
    }

    #[tokio::test]
    async fn test_timeout_triggers_fallback() {
        let mut config = abc();
        config.providers[0] = provider("A", 1).with_timeout_ms(20);
        let (manager, factory) = manager(config).await;
        factory
            .adapter("A")
            .set_behavior(MockBehavior::Delay(Duration::from_millis(500)));

        let response = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();

        assert_eq!(response.provider, "B");
        assert_eq!(metrics_for(&manager, "A").await.failure_count, 1);
        assert_eq!(breaker_for(&manager, "A").await.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_retried() {
        let (manager, factory) = manager(abc()).await;
        factory
            .adapter("A")
            .set_behavior(MockBehavior::Reject("context too long".into()));

        let error = manager
            .execute_completion(&request(), &Route::Ranked)
            .await
            .unwrap_err();

        assert!(matches!(error, DomainError::InvalidRequest { .. }));
        assert_eq!(factory.adapter("B").calls(), 0);
        assert_eq!(breaker_for(&manager, "A").await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_malformed_request_never_dispatched() {
        let (manager, factory) = manager(abc()).await;

        let error = manager
            .execute_completion(&UnifiedRequest::from_prompt("  "), &Route::Ranked)
            .await
            .unwrap_err();

        assert!(matches!(error, DomainError::InvalidRequest { .. }));
        assert_eq!(factory.adapter("A").calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_disabled_attempts_one_provider() {
        let mut config = abc();
        config.orchestrator.enable_fallback = false;
        let (manager, factory) = manager(config).await;
        factory.adapter("A").set_behavior(MockBehavior::Fail("down".into()));

        let error = manager
            .execute_completion(&request(), &Route::Ranked)
            .await
            .unwrap_err();

        assert_eq!(error.failures().len(), 1);
        assert_eq!(factory.adapter("B").calls(), 0);
    }

    #[tokio::test]
    async fn test_circuit_breaker_disabled() {
        let mut config = abc();
        config.orchestrator.enable_circuit_breaker = false;
        let (manager, factory) = manager(config).await;
        factory.adapter("A").set_behavior(MockBehavior::Fail("down".into()));

        for _ in 0..3 {
            manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        }

        assert_eq!(factory.adapter("A").calls(), 3);
        assert_eq!(breaker_for(&manager, "A").await.status, CircuitStatus::Closed);
    }

    #[tokio::test]
    async fn test_pinned_route() {
        let (manager, factory) = manager(abc()).await;

        let response = manager
            .execute_completion(&request(), &Route::pinned("C"))
            .await
            .unwrap();
        assert_eq!(response.provider, "C");
        assert_eq!(factory.adapter("A").calls(), 0);

        let unknown = manager
            .execute_completion(&request(), &Route::pinned("Z"))
            .await;
        assert!(matches!(unknown, Err(DomainError::UnknownProvider { .. })));
    }

    #[tokio::test]
    async fn test_pinned_provider_does_not_fall_back() {
        let (manager, factory) = manager(abc()).await;
        factory.adapter("B").set_behavior(MockBehavior::Fail("down".into()));

        let error = manager
            .execute_completion(&request(), &Route::pinned("B"))
            .await
            .unwrap_err();

        assert_eq!(error.failures().len(), 1);
        assert_eq!(factory.adapter("C").calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers_and_metrics() {
        let mut config = abc();
        config.orchestrator.enable_caching = true;
        let factory = Arc::new(MockAdapterFactory::new());
        let manager = ServiceManager::start(
            Arc::new(StaticConfigurationSource::new(config)),
            factory.clone(),
            Arc::new(MockCredentialProvider::new()),
        )
        .await
        .unwrap()
        .with_cache(Arc::new(InMemoryCache::new()));

        let first = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        let second = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.text, first.text);
        assert_eq!(second.provider, "A");
        assert_eq!(factory.adapter("A").calls(), 1);
        assert_eq!(metrics_for(&manager, "A").await.request_count, 1);
    }

    #[tokio::test]
    async fn test_cache_ignored_when_disabled() {
        let factory = Arc::new(MockAdapterFactory::new());
        let manager = ServiceManager::start(
            Arc::new(StaticConfigurationSource::new(abc())),
            factory.clone(),
            Arc::new(MockCredentialProvider::new()),
        )
        .await
        .unwrap()
        .with_cache(Arc::new(InMemoryCache::new()));

        manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        let second = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();

        assert!(!second.cached);
        assert_eq!(factory.adapter("A").calls(), 2);
    }

    #[tokio::test]
    async fn test_embedding_routes_to_capable_provider() {
        let config = config(vec![
            ProviderConfig::new("claude", ProviderKind::Anthropic, "claude-3-5-haiku-20241022")
                .with_priority(0),
            provider("openai", 1).with_embedding_model("text-embedding-3-small"),
        ]);
        let (manager, factory) = manager(config).await;

        let response = manager
            .execute_embedding(&EmbeddingRequest::single("hello"), &Route::Ranked)
            .await
            .unwrap();

        assert_eq!(response.provider(), "openai");
        assert_eq!(response.model(), "text-embedding-3-small");
        assert_eq!(factory.adapter("claude").calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_success_recorded_on_completion() {
        let (manager, _factory) = manager(abc()).await;

        let stream = manager.stream_completion(&request(), &Route::Ranked).await.unwrap();
        assert_eq!(stream.provider(), "A");

        let chunks: Vec<_> = stream.collect().await;
        let text: String = chunks
            .iter()
            .filter_map(|c| c.as_ref().ok().and_then(|c| c.delta.clone()))
            .collect();

        assert_eq!(text, "Hello world");
        assert_eq!(metrics_for(&manager, "A").await.success_count, 1);
    }

    #[tokio::test]
    async fn test_stream_error_mid_flight_counts_as_failure() {
        let (manager, factory) = manager(abc()).await;
        factory.adapter("A").set_behavior(MockBehavior::BreakMidStream);

        let stream = manager.stream_completion(&request(), &Route::Ranked).await.unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
        assert_eq!(metrics_for(&manager, "A").await.failure_count, 1);
        assert_eq!(breaker_for(&manager, "A").await.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_not_a_failure() {
        let (manager, _factory) = manager(abc()).await;

        let mut stream = manager.stream_completion(&request(), &Route::Ranked).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta.as_deref(), Some("Hello"));
        drop(stream);

        let metrics = metrics_for(&manager, "A").await;
        assert_eq!(metrics.request_count, 0);
        assert_eq!(breaker_for(&manager, "A").await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_dropped_trial_stream_frees_trial_slot() {
        let mut config = abc();
        config.orchestrator.circuit_breaker.cooldown_ms = 0;
        let (manager, factory) = manager(config).await;
        factory.adapter("A").set_behavior(MockBehavior::Fail("down".into()));
        for _ in 0..2 {
            manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        }
        assert_eq!(breaker_for(&manager, "A").await.status, CircuitStatus::Open);
        factory.adapter("A").set_behavior(MockBehavior::Succeed);

        let stream = manager.stream_completion(&request(), &Route::Ranked).await.unwrap();
        assert_eq!(stream.provider(), "A");
        assert!(breaker_for(&manager, "A").await.trial_in_flight);
        drop(stream);

        assert!(!breaker_for(&manager, "A").await.trial_in_flight);
        let response = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        assert_eq!(response.provider, "A");
        assert_eq!(breaker_for(&manager, "A").await.status, CircuitStatus::Closed);
    }

    #[tokio::test]
    async fn test_concurrency_limit_serializes_dispatch() {
        let mut config = config(vec![provider("A", 1)]);
        config.orchestrator.max_concurrent_requests = 1;
        let (manager, factory) = manager(config).await;
        factory
            .adapter("A")
            .set_behavior(MockBehavior::Delay(Duration::from_millis(50)));

        let started = Instant::now();
        let request = request();
        let (first, second) = tokio::join!(
            manager.execute_completion(&request, &Route::Ranked),
            manager.execute_completion(&request, &Route::Ranked)
        );

        assert!(first.is_ok() && second.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_reset_provider() {
        let (manager, factory) = manager(abc()).await;
        factory.adapter("A").set_behavior(MockBehavior::Fail("down".into()));
        for _ in 0..2 {
            manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        }
        assert_eq!(breaker_for(&manager, "A").await.status, CircuitStatus::Open);

        manager.reset_provider("A").await.unwrap();

        let breaker = breaker_for(&manager, "A").await;
        assert_eq!(breaker.status, CircuitStatus::Closed);
        assert_eq!(breaker.consecutive_failures, 0);
        assert_eq!(metrics_for(&manager, "A").await.request_count, 0);
        assert!(matches!(
            manager.reset_provider("Z").await,
            Err(DomainError::UnknownProvider { .. })
        ));
    }

    #[tokio::test]
    async fn test_system_health_and_health_checks() {
        let (manager, factory) = manager(abc()).await;
        assert_eq!(
            manager.get_system_health_status().await.status,
            HealthStatus::Healthy
        );

        factory.adapter("B").set_behavior(MockBehavior::Fail("down".into()));
        let results = manager.run_health_checks().await;

        assert_eq!(results.get("A"), Some(&true));
        assert_eq!(results.get("B"), Some(&false));
        let health = manager.get_system_health_status().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(
            metrics_for(&manager, "B").await.last_health_check.map(|h| h.healthy),
            Some(false)
        );
        // Health probes do not touch the breaker
        assert_eq!(breaker_for(&manager, "B").await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_reload_preserves_breakers_and_swaps_providers() {
        let source = Arc::new(StaticConfigurationSource::new(abc()));
        let (manager, _factory) = manager_with_source(source.clone()).await;
        manager.force_provider_status("A", ForcedStatus::Open).await.unwrap();

        let mut updated = abc();
        updated.providers.remove(2);
        updated.providers.push(provider("D", 0));
        source.replace(updated);

        manager.reload_configuration().await.unwrap();

        let names: Vec<_> = manager
            .get_configured_providers()
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["D", "A", "B"]);
        assert_eq!(breaker_for(&manager, "A").await.status, CircuitStatus::Open);

        let response = manager.execute_completion(&request(), &Route::Ranked).await.unwrap();
        assert_eq!(response.provider, "D");
    }

    #[tokio::test]
    async fn test_invalid_reload_keeps_current_table() {
        let source = Arc::new(StaticConfigurationSource::new(abc()));
        let (manager, _factory) = manager_with_source(source.clone()).await;

        source.replace(config(vec![provider("A", 1).disabled()]));
        let result = manager.reload_configuration().await;

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
        assert_eq!(manager.get_configured_providers().await.len(), 3);
    }

    #[tokio::test]
    async fn test_validate_configuration_reports_missing_credentials() {
        let config = config(vec![
            provider("A", 1),
            provider("B", 2).with_credential_key("MISSING_KEY"),
        ]);
        let (manager, _factory) = manager(config).await;

        let report = manager.validate_configuration().await.unwrap();

        assert!(!report.is_valid());
        assert!(report.errors[0].contains("MISSING_KEY"));
        // B could not be built, so only A is registered
        assert_eq!(manager.get_configured_providers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_estimate_costs_follow_route() {
        let mut config = abc();
        config.providers[1] = provider("B", 2).with_price("base-model", 1.0, 2.0);
        let (manager, factory) = manager(config).await;
        let request = UnifiedRequest::builder()
            .user("Estimate this prompt")
            .max_tokens(100)
            .build();

        let estimates = manager.estimate_costs(&request, &Route::Ranked).await.unwrap();

        assert_eq!(
            estimates.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
        let (_, priced) = &estimates[1];
        assert_eq!(priced.completion_tokens, 100);
        assert_eq!(priced.cost_micros, priced.prompt_tokens as i64 * 1_000 + 200_000);
        assert_eq!(estimates[0].1.cost_micros, 0);
        assert_eq!(factory.adapter("A").calls(), 0);
    }

    #[test]
    fn test_forced_status_parsing() {
        assert_eq!("open".parse::<ForcedStatus>().unwrap(), ForcedStatus::Open);
        assert_eq!("CLOSED".parse::<ForcedStatus>().unwrap(), ForcedStatus::Close);
        assert!("half".parse::<ForcedStatus>().is_err());
    }
}
