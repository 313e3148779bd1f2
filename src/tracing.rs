//! Tracing setup with optional OpenTelemetry export
//!
//! Console logs always go to stderr (stdout carries command output). When an
//! OTLP endpoint is supplied, spans are also exported to it:
//!
//! ```text
//! toolpilot → OTLP (gRPC) → OTel Collector → Tempo (traces)
//! ```

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,toolpilot=debug";

/// Initialize the tracing subsystem
///
/// # Arguments
/// * `service_name` - Name for the service in exported traces
/// * `otlp_endpoint` - OTLP collector URL; `None` disables export
///
/// # Example
/// ```ignore
/// init_tracing("toolpilot", Some("http://localhost:4317"))?;
/// ```
pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let otel_layer = match otlp_endpoint {
        Some(endpoint) => {
            let tracer = build_tracer(service_name, endpoint)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::debug!(
        service = service_name,
        otlp_endpoint = otlp_endpoint.unwrap_or("disabled"),
        "Tracing initialized"
    );

    Ok(())
}

fn build_tracer(service_name: &str, endpoint: &str) -> Result<sdktrace::Tracer, opentelemetry::trace::TraceError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])))
        .install_batch(runtime::Tokio)
}

/// Flush pending spans to the collector
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
