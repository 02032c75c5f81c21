//! Subscriber setup with optional OpenTelemetry export

use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::config::TracingConfig;
use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level. A second call is a no-op.
pub fn init_tracing(logging: &LoggingConfig, tracing_config: &TracingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (json_layer, pretty_layer) = match logging.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    let (otel_layer, otel_error) = if tracing_config.enabled {
        match init_otel_tracing(tracing_config) {
            Ok(provider) => {
                let tracer = provider.tracer(tracing_config.service_name.clone());
                opentelemetry::global::set_tracer_provider(provider);
                (Some(tracing_opentelemetry::layer().with_tracer(tracer)), None)
            }
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match (tracing_config.enabled, otel_error) {
        (true, None) => tracing::info!(
            endpoint = %tracing_config.otlp_endpoint,
            "Tracing initialized with OpenTelemetry export"
        ),
        (true, Some(e)) => tracing::warn!(
            error = %e,
            "Failed to initialize OpenTelemetry, span export disabled"
        ),
        (false, _) => tracing::debug!(level = %logging.level, "Tracing initialized"),
    }
}

fn init_otel_tracing(
    config: &TracingConfig,
) -> Result<TracerProvider, opentelemetry::trace::TraceError> {
    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        config.service_name.clone(),
    )]);

    let sampler = if config.sampling_ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if config.sampling_ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(config.sampling_ratio)
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    Ok(TracerProvider::builder()
        .with_sampler(sampler)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter, runtime::Tokio)
        .build())
}

/// Flush pending spans
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let logging = LoggingConfig::default();
        let tracing_config = TracingConfig::default();

        init_tracing(&logging, &tracing_config);
        init_tracing(&logging, &tracing_config);
    }
}
