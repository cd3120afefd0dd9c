//! Logging and tracing initialization for the gateway.
//!
//! Sets up a `tracing` registry with:
//! - a stdout layer (plain or JSON) filtered by `RUST_LOG` or the configured level
//! - daily-rolling JSON files for the `queries` and `errors` targets
//! - an OTLP exporter when the `telemetry` feature is enabled

use crate::config::{LoggingConfig, TelemetryConfig};
use anyhow::{Context, Result};

#[cfg(feature = "telemetry")]
use {
    opentelemetry::trace::TracerProvider, opentelemetry::KeyValue,
    opentelemetry_otlp::WithExportConfig,
    opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider, opentelemetry_sdk::Resource,
    tracing_opentelemetry::OpenTelemetryLayer,
};

use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Target of the executor's per-query trace records.
pub const QUERIES_TARGET: &str = "queries";
/// Target of classified request failures.
pub const ERRORS_TARGET: &str = "errors";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub fn init_logging(logging: &LoggingConfig, telemetry: &TelemetryConfig) -> Result<()> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log filter")?;

    if logging.json {
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_filter(filter)
                .boxed(),
        );
    } else {
        layers.push(tracing_subscriber::fmt::layer().with_filter(filter).boxed());
    }

    if let Some(directory) = &logging.directory {
        std::fs::create_dir_all(directory)
            .with_context(|| format!("Failed to create log directory {}", directory))?;

        for target in [QUERIES_TARGET, ERRORS_TARGET] {
            let appender =
                tracing_appender::rolling::daily(directory, format!("{}.jsonl", target));
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(appender)
                    .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
                        metadata.target() == target
                    }))
                    .boxed(),
            );
        }
    }

    if telemetry.enabled {
        layers.push(init_telemetry(&telemetry.service_name, &telemetry.endpoint)?);
    }

    tracing_subscriber::registry().with(layers).try_init().ok();
    Ok(())
}

pub fn init_telemetry<S>(
    service_name: &str,
    endpoint: &str,
) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    #[cfg(feature = "telemetry")]
    {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]))
            .build();

        let tracer = provider.tracer(service_name.to_string());
        opentelemetry::global::set_tracer_provider(provider);

        Ok(Box::new(OpenTelemetryLayer::new(tracer)))
    }
    #[cfg(not(feature = "telemetry"))]
    {
        tracing::warn!(
            "Telemetry requested for {} ({}) but the `telemetry` feature is disabled",
            service_name,
            endpoint
        );
        Ok(Box::new(tracing_subscriber::layer::Identity::new()))
    }
}

pub fn shutdown_telemetry() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
