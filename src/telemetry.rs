//! Logging and (optionally) OpenTelemetry export.
//!
//! Logs go to stderr; stdout stays free for command output such as
//! `replay`. The filter comes from `SIGNAL_BANG_LOG` (default `info`).
//! With the `otel` feature, setting `OTEL_EXPORTER_OTLP_ENDPOINT` also ships
//! traces, logs and a per-outcome message counter over OTLP/HTTP.

use std::io::{self, IsTerminal};

use clap::ValueEnum;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(feature = "otel")]
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;

use crate::session::Outcome;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "SIGNAL_BANG_LOG";

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Keeps exporters alive; flushes them on drop.
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    otel: Option<otel::Providers>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(providers) = self.otel.take() {
            providers.shutdown();
        }
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init(format: LogFormat) -> TelemetryGuard {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (json, text) = match format {
        LogFormat::Json => (Some(fmt::layer().json().with_writer(io::stderr)), None),
        LogFormat::Text => (
            None,
            Some(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(io::stderr().is_terminal()),
            ),
        ),
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text);

    #[cfg(feature = "otel")]
    let guard = {
        let providers = otel::Providers::from_env();
        let traces = providers
            .as_ref()
            .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer.clone()));
        let logs = providers
            .as_ref()
            .map(|p| OpenTelemetryTracingBridge::new(&p.logger_provider));
        let _ = registry.with(traces).with(logs).try_init();
        TelemetryGuard { otel: providers }
    };

    #[cfg(not(feature = "otel"))]
    let guard = {
        let _ = registry.try_init();
        TelemetryGuard::default()
    };

    guard
}

/// Count one processed line by outcome. No-op without an OTLP endpoint.
pub fn record_outcome(outcome: &Outcome) {
    #[cfg(feature = "otel")]
    otel::record_outcome(outcome.label());
    #[cfg(not(feature = "otel"))]
    let _ = outcome;
}

#[cfg(feature = "otel")]
mod otel {
    use std::sync::OnceLock;

    use opentelemetry::KeyValue;
    use opentelemetry::metrics::Counter;
    use opentelemetry::trace::TracerProvider;
    use opentelemetry_sdk::Resource;
    use opentelemetry_sdk::logs::SdkLoggerProvider;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use opentelemetry_sdk::trace::SdkTracerProvider;

    const SERVICE_NAME: &str = "signal-bang";
    const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

    pub struct Providers {
        tracer_provider: SdkTracerProvider,
        pub tracer: <SdkTracerProvider as TracerProvider>::Tracer,
        pub logger_provider: SdkLoggerProvider,
        meter_provider: SdkMeterProvider,
    }

    impl Providers {
        /// Build OTLP/HTTP exporters if an endpoint is configured.
        pub fn from_env() -> Option<Self> {
            std::env::var_os(ENDPOINT_ENV)?;
            match Self::build() {
                Ok(providers) => Some(providers),
                Err(e) => {
                    eprintln!("warning: OTLP export disabled: {e}");
                    None
                }
            }
        }

        fn build() -> Result<Self, opentelemetry_otlp::ExporterBuildError> {
            let resource = Resource::builder().with_service_name(SERVICE_NAME).build();

            let spans = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .build()?;
            let tracer_provider = SdkTracerProvider::builder()
                .with_batch_exporter(spans)
                .with_resource(resource.clone())
                .build();

            let logs = opentelemetry_otlp::LogExporter::builder()
                .with_http()
                .build()?;
            let logger_provider = SdkLoggerProvider::builder()
                .with_batch_exporter(logs)
                .with_resource(resource.clone())
                .build();

            let metrics = opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .build()?;
            let meter_provider = SdkMeterProvider::builder()
                .with_periodic_exporter(metrics)
                .with_resource(resource)
                .build();
            opentelemetry::global::set_meter_provider(meter_provider.clone());

            Ok(Self {
                tracer: tracer_provider.tracer(SERVICE_NAME),
                tracer_provider,
                logger_provider,
                meter_provider,
            })
        }

        pub fn shutdown(self) {
            // Flush failures at exit have nowhere useful to go.
            let _ = self.tracer_provider.shutdown();
            let _ = self.logger_provider.shutdown();
            let _ = self.meter_provider.shutdown();
        }
    }

    fn messages() -> &'static Counter<u64> {
        static COUNTER: OnceLock<Counter<u64>> = OnceLock::new();
        COUNTER.get_or_init(|| {
            opentelemetry::global::meter(SERVICE_NAME)
                .u64_counter("signal_bang.messages")
                .with_description("Inbound lines by outcome")
                .build()
        })
    }

    pub fn record_outcome(outcome: &'static str) {
        messages().add(1, &[KeyValue::new("outcome", outcome)]);
    }
}
