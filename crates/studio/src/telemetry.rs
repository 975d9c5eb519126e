//! Logging and trace export.
//!
//! Always installs an env-filtered fmt subscriber. With an OTLP endpoint
//! configured, spans are also exported over gRPC.

use std::time::Duration;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};
use opentelemetry_sdk::Resource;
use studioconf::TelemetryConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Timeout for OTLP exports - prevents blocking on unavailable endpoints
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

const SERVICE_NAME: &str = "studio";

fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(from_env.as_deref(), &config.log_level)
}

/// `RUST_LOG` when set and valid, else the configured level, else info.
fn filter_from(env_directives: Option<&str>, level: &str) -> EnvFilter {
    env_directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

pub fn init(config: &TelemetryConfig) -> Result<()> {
    if !config.otlp_enabled() {
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(());
    }

    let resource = Resource::builder_empty()
        .with_service_name(SERVICE_NAME)
        .with_attributes(vec![KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build();

    let endpoint = if config.otlp_endpoint.contains("://") {
        config.otlp_endpoint.clone()
    } else {
        format!("http://{}", config.otlp_endpoint)
    };

    let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .context("Failed to create OTLP span exporter")?;

    let batch_span_processor =
        opentelemetry_sdk::trace::BatchSpanProcessor::builder(trace_exporter).build();

    let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_span_processor(batch_span_processor)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(tracer_provider);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(otlp.endpoint = %config.otlp_endpoint, "OpenTelemetry trace export enabled");
    Ok(())
}

/// Providers flush on drop within the export timeout; this only logs.
pub fn shutdown() {
    tracing::info!("Shutting down telemetry");
}

/// W3C traceparent for the current span, if it belongs to a valid trace.
pub fn current_traceparent() -> Option<String> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let span = tracing::Span::current();
    let context = span.context();
    let ctx_span = context.span();
    let span_context = ctx_span.span_context();

    if !span_context.is_valid() {
        return None;
    }

    let flags = if span_context.is_sampled() { "01" } else { "00" };
    Some(format!(
        "00-{}-{}-{}",
        span_context.trace_id(),
        span_context.span_id(),
        flags
    ))
}
