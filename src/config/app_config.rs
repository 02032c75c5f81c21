use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Capability, CapabilitySet, CircuitBreakerSettings, ExperimentDefinition, ModelPricing,
    PricingTable, ProviderKind, ProviderProfile,
};
use crate::infrastructure::cache::CacheConfig;
use crate::infrastructure::observability::ObservabilityConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub observability: ObservabilityConfig,
    pub orchestrator: OrchestratorConfig,
    pub cache: CacheConfig,
    pub credentials: CredentialsConfig,
    pub providers: Vec<ProviderConfig>,
    pub experiments: Vec<ExperimentDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Dispatch toggles and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub enable_fallback: bool,
    pub enable_circuit_breaker: bool,
    pub enable_caching: bool,
    pub max_concurrent_requests: usize,
    /// Per-attempt timeout for providers without their own
    pub default_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enable_fallback: true,
            enable_circuit_breaker: true,
            enable_caching: false,
            max_concurrent_requests: 100,
            default_timeout_ms: 30_000,
            cache_ttl_secs: 3600,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub failure_window_ms: u64,
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        let settings = CircuitBreakerSettings::default();
        Self {
            failure_threshold: settings.failure_threshold,
            failure_window_ms: settings.failure_window.as_millis() as u64,
            cooldown_ms: settings.cooldown.as_millis() as u64,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn settings(&self) -> CircuitBreakerSettings {
        CircuitBreakerSettings {
            failure_threshold: self.failure_threshold,
            failure_window: Duration::from_millis(self.failure_window_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }
}

/// Where provider secrets come from.
///
/// Static entries win over environment variables with the same key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub env_prefix: Option<String>,
    #[serde(rename = "static")]
    pub static_keys: HashMap<String, String>,
}

/// Per-1K-token prices in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceConfig {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// One backend provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Key looked up in the credential source
    #[serde(default)]
    pub credential_key: Option<String>,
    /// Defaults to everything the kind supports
    #[serde(default)]
    pub capabilities: Option<CapabilitySet>,
    pub default_model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    /// Model hint -> provider-native model name
    #[serde(default)]
    pub models: HashMap<String, String>,
    #[serde(default)]
    pub pricing: HashMap<String, PriceConfig>,
    /// Lower runs first
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, kind: ProviderKind, default_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            base_url: None,
            credential_key: None,
            capabilities: None,
            default_model: default_model.into(),
            embedding_model: None,
            models: HashMap::new(),
            pricing: HashMap::new(),
            priority: 0,
            timeout_ms: None,
        }
    }

    pub fn with_credential_key(mut self, key: impl Into<String>) -> Self {
        self.credential_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = Some(capabilities.into_iter().collect());
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_model(mut self, hint: impl Into<String>, model: impl Into<String>) -> Self {
        self.models.insert(hint.into(), model.into());
        self
    }

    pub fn with_price(mut self, model: impl Into<String>, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.pricing.insert(
            model.into(),
            PriceConfig {
                input_per_1k,
                output_per_1k,
            },
        );
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Hosted APIs always need a key; an OpenAI-compatible endpoint on a
    /// custom base URL (e.g. a local server) may not.
    pub fn requires_credential(&self) -> bool {
        self.credential_key.is_some()
            || !matches!((self.kind, &self.base_url), (ProviderKind::OpenAi, Some(_)))
    }

    /// Capabilities declared, narrowed to what the kind can do
    pub fn effective_capabilities(&self) -> CapabilitySet {
        let supported = self.kind.supported_capabilities();

        match &self.capabilities {
            Some(declared) => declared.iter().filter(|c| supported.contains(*c)).collect(),
            None => supported,
        }
    }

    pub fn profile(&self) -> ProviderProfile {
        let pricing = self
            .pricing
            .iter()
            .fold(PricingTable::new(), |table, (model, price)| {
                table.with_pricing(ModelPricing::new(
                    model.clone(),
                    price.input_per_1k,
                    price.output_per_1k,
                ))
            });

        let mut profile = ProviderProfile::new(self.name.clone(), self.kind, self.default_model.clone())
            .with_capabilities(self.effective_capabilities())
            .with_pricing(pricing)
            .with_priority(self.priority);

        for (hint, model) in &self.models {
            profile = profile.with_mapping(hint.clone(), model.clone());
        }
        if let Some(model) = &self.embedding_model {
            profile = profile.with_embedding_model(model.clone());
        }
        if let Some(timeout) = self.timeout() {
            profile = profile.with_timeout(timeout);
        }

        profile
    }
}

impl AppConfig {
    /// Layered load: `config/default`, `config/local`, then `APP__*` env vars
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::builder(None)?.build()?.try_deserialize()
    }

    /// Like [`load`](Self::load), with `path` layered over the defaults
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        Self::builder(Some(path))?.build()?.try_deserialize()
    }

    fn builder(
        path: Option<&Path>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        Ok(builder.add_source(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert!(config.orchestrator.enable_fallback);
        assert!(config.orchestrator.enable_circuit_breaker);
        assert!(!config.orchestrator.enable_caching);
        assert_eq!(config.orchestrator.circuit_breaker.failure_threshold, 5);
        assert_eq!(
            config.orchestrator.circuit_breaker.settings().cooldown,
            Duration::from_secs(30)
        );
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_provider_deserializes_with_defaults() {
        let provider: ProviderConfig = serde_json::from_value(serde_json::json!({
            "name": "claude",
            "kind": "anthropic",
            "default_model": "claude-3-5-haiku-20241022",
            "credential_key": "ANTHROPIC_API_KEY",
            "models": {"fast": "claude-3-5-haiku-20241022"}
        }))
        .unwrap();

        assert!(provider.enabled);
        assert_eq!(provider.priority, 0);
        let profile = provider.profile();
        assert!(profile.supports(Capability::Streaming));
        assert!(!profile.supports(Capability::Embedding));
        assert_eq!(profile.resolve_model(Some("fast")), "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_declared_capabilities_are_narrowed_to_kind() {
        let provider = ProviderConfig::new("claude", ProviderKind::Anthropic, "m")
            .with_capabilities([Capability::Completion, Capability::Embedding]);

        let capabilities = provider.effective_capabilities();
        assert!(capabilities.contains(Capability::Completion));
        assert!(!capabilities.contains(Capability::Embedding));
    }

    #[test]
    fn test_requires_credential() {
        assert!(ProviderConfig::new("openai", ProviderKind::OpenAi, "m").requires_credential());
        assert!(ProviderConfig::new("claude", ProviderKind::Anthropic, "m")
            .with_base_url("http://proxy")
            .requires_credential());
        assert!(!ProviderConfig::new("local", ProviderKind::OpenAi, "m")
            .with_base_url("http://localhost:11434")
            .requires_credential());
    }

    #[test]
    fn test_profile_carries_pricing_and_timeout() {
        let profile = ProviderConfig::new("openai", ProviderKind::OpenAi, "gpt-4o-mini")
            .with_price("gpt-4o-mini", 0.001, 0.002)
            .with_timeout_ms(250)
            .profile();

        assert_eq!(profile.timeout, Some(Duration::from_millis(250)));
        assert_eq!(profile.pricing.cost("gpt-4o-mini", 1000, 1000), 3000);
    }

    #[test]
    fn test_shipped_default_file_parses() {
        let config = AppConfig::load_from(Path::new("config/default.toml")).unwrap();

        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].models.get("smart").map(String::as_str), Some("gpt-4o"));
        assert_eq!(config.orchestrator.circuit_breaker.cooldown_ms, 30_000);
        assert_eq!(config.experiments[0].total_weight(), 100);
    }
}
