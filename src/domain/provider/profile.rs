use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Capability, CapabilitySet};
use crate::domain::estimator::PricingTable;

/// Wire protocol family spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI and OpenAI-compatible endpoints
    #[serde(rename = "openai", alias = "openai_compatible")]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Capabilities served by the adapter for this kind
    pub fn supported_capabilities(&self) -> CapabilitySet {
        match self {
            Self::OpenAi => CapabilitySet::all(),
            Self::Anthropic => CapabilitySet::new()
                .with(Capability::Completion)
                .with(Capability::Streaming),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity, routing attributes and pricing of one registered provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub kind: ProviderKind,
    pub capabilities: CapabilitySet,
    /// Model hint to provider-native model name
    #[serde(default)]
    pub model_mapping: HashMap<String, String>,
    pub default_model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub pricing: PricingTable,
    /// Lower values are tried first
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl ProviderProfile {
    pub fn new(name: impl Into<String>, kind: ProviderKind, default_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            capabilities: kind.supported_capabilities(),
            model_mapping: HashMap::new(),
            default_model: default_model.into(),
            embedding_model: None,
            pricing: PricingTable::new(),
            priority: 0,
            timeout: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_mapping(mut self, hint: impl Into<String>, model: impl Into<String>) -> Self {
        self.model_mapping.insert(hint.into(), model.into());
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Resolve a model hint: mapped hints are translated, unmapped hints pass
    /// through verbatim, and no hint selects the default model.
    pub fn resolve_model(&self, hint: Option<&str>) -> String {
        match hint {
            Some(hint) => self
                .model_mapping
                .get(hint)
                .cloned()
                .unwrap_or_else(|| hint.to_string()),
            None => self.default_model.clone(),
        }
    }

    /// Like [`resolve_model`](Self::resolve_model) but falls back to the
    /// embedding model.
    pub fn resolve_embedding_model(&self, hint: Option<&str>) -> String {
        match hint {
            Some(_) => self.resolve_model(hint),
            None => self
                .embedding_model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
        }
    }
}
