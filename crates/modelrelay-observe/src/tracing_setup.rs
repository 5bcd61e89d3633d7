//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! // Human-readable logs only
//! modelrelay_observe::tracing_setup::init_tracing(false).unwrap();
//! ```
//!
//! ```no_run
//! use modelrelay_observe::tracing_setup::{init_tracing_with, TracingOptions};
//!
//! // JSON logs plus OpenTelemetry spans on stdout
//! init_tracing_with(&TracingOptions {
//!     json: true,
//!     enable_otel: true,
//!     ..TracingOptions::default()
//! })
//! .unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
    /// Bridge spans to OpenTelemetry with a stdout exporter.
    pub enable_otel: bool,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_directive: String,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            json: false,
            enable_otel: false,
            default_directive: "info".to_string(),
        }
    }
}

/// Initialize the global subscriber with text output.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(enable_otel: bool) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing_with(&TracingOptions {
        enable_otel,
        ..TracingOptions::default()
    })
}

/// Initialize the global subscriber.
///
/// - Installs a `fmt` layer (text or JSON) with target visibility and span
///   close timing, so each routed request logs its duration.
/// - When `enable_otel` is set, additionally bridges spans to OpenTelemetry
///   using a stdout exporter.
/// - Respects `RUST_LOG`, falling back to `default_directive`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing_with(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_directive));

    let text_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });

    let otel_layer = if options.enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("modelrelay");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
