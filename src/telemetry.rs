//! src/telemetry.rs
use crate::configuration::TelemetrySettings;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn build_tracer_provider(
    service_name: &'static str,
    endpoint: &str,
) -> anyhow::Result<SdkTracerProvider> {
    let tracer_provider = SdkTracerProvider::builder()
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(service_name)
                .build(),
        )
        .with_batch_exporter(
            opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .build()?,
        )
        .build();
    opentelemetry::global::set_tracer_provider(tracer_provider.clone());
    Ok(tracer_provider)
}

/// `RUST_LOG` wins over `settings.log_filter`. Spans are exported over OTLP
/// only when an endpoint is configured; callers shut the returned provider down.
pub fn init_tracing(
    service_name: &'static str,
    settings: &TelemetrySettings,
) -> anyhow::Result<Option<SdkTracerProvider>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))?;

    let tracer_provider = settings
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| build_tracer_provider(service_name, endpoint))
        .transpose()?;
    let otel_layer = tracer_provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(false),
        )
        .with(otel_layer)
        .try_init()?;

    Ok(tracer_provider)
}
