//! Structural checks over a loaded configuration

use std::collections::HashSet;

use serde::Serialize;

use crate::config::AppConfig;
use crate::domain::experiment::validate_experiment;
use crate::domain::CredentialProvider;

/// Problems found by [`validate_config`]; warnings do not block a reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

pub async fn validate_config(
    config: &AppConfig,
    credentials: &dyn CredentialProvider,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let settings = &config.orchestrator;

    if settings.default_timeout_ms == 0 {
        report.error("default_timeout_ms must be greater than zero");
    }
    if settings.max_concurrent_requests == 0 {
        report.error("max_concurrent_requests must be greater than zero");
    }
    if settings.enable_circuit_breaker && settings.circuit_breaker.failure_threshold == 0 {
        report.error("circuit_breaker.failure_threshold must be greater than zero");
    }
    if settings.enable_caching && settings.cache_ttl_secs == 0 {
        report.warning("Caching is enabled with a zero TTL; entries expire immediately");
    }

    let mut names = HashSet::new();
    for provider in &config.providers {
        if !names.insert(provider.name.as_str()) {
            report.error(format!("Provider '{}' is declared more than once", provider.name));
        }
    }

    let enabled: Vec<_> = config.providers.iter().filter(|p| p.enabled).collect();
    if enabled.is_empty() {
        report.error("No enabled providers are configured");
    }

    for provider in &enabled {
        let name = &provider.name;

        if provider.name.trim().is_empty() {
            report.error("A provider has an empty name");
        }
        if provider.default_model.trim().is_empty() {
            report.error(format!("Provider '{}' has no default_model", name));
        }
        if provider.timeout_ms == Some(0) {
            report.error(format!("Provider '{}' has a zero timeout", name));
        }
        if provider.effective_capabilities().is_empty() {
            report.warning(format!(
                "Provider '{}' declares no capabilities its kind supports and will never be routed to",
                name
            ));
        }

        match &provider.credential_key {
            Some(key) if !credentials.supports(key).await => report.error(format!(
                "Provider '{}': credential '{}' is not available from the {} credential source",
                name,
                key,
                credentials.provider_name()
            )),
            Some(_) => {}
            None if provider.requires_credential() => report.error(format!(
                "Provider '{}' ({}) requires a credential_key",
                name, provider.kind
            )),
            None => {}
        }
    }

    let known: HashSet<&str> = enabled.iter().map(|p| p.name.as_str()).collect();
    let mut experiment_ids = HashSet::new();

    for experiment in &config.experiments {
        if !experiment_ids.insert(experiment.id.as_str()) {
            report.error(format!("Experiment '{}' is declared more than once", experiment.id));
        }

        for issue in validate_experiment(experiment, &known) {
            if issue.is_warning() {
                report.warning(issue.to_string());
            } else {
                report.error(issue.to_string());
            }
        }
    }

    report
}
