//! Operator commands: validate and health

use serde_json::json;

use super::print_json;
use crate::App;

/// Print the validation report; fails when it carries errors
pub async fn validate(app: &App) -> anyhow::Result<()> {
    let report = app.orchestrator.validate_configuration().await?;
    print_json(&report)?;

    if !report.is_valid() {
        anyhow::bail!("configuration has {} error(s)", report.errors.len());
    }

    Ok(())
}

/// Probe providers, then print health, breakers and counters
pub async fn health(app: &App) -> anyhow::Result<()> {
    let checks = app.orchestrator.run_health_checks().await;
    let health = app.orchestrator.get_system_health_status().await;
    let breakers = app.orchestrator.get_circuit_breaker_status().await;
    let metrics = app.orchestrator.get_provider_metrics().await;

    print_json(&json!({
        "checks": checks,
        "health": health,
        "circuit_breakers": breakers,
        "metrics": metrics,
    }))
}
