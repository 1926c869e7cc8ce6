//! Tracing setup shared by the executer binaries.
//!
//! Logs always go to stdout. When an OTLP collector URL is configured, spans
//! are also exported over gRPC.

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use thiserror::Error;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::env::{get_nonempty_env, parse_env_or};

pub const OTLP_URL_ENVVAR: &str = "GOLIATH_OTLP_URL";
pub const SVC_LABEL_ENVVAR: &str = "GOLIATH_SVC_LABEL";
pub const LOG_ANSI_ENVVAR: &str = "GOLIATH_LOG_ANSI";

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Name of the tracer spans are exported under.
const TRACER_NAME: &str = "goliath-log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("otlp exporter: {0}")]
    Otlp(#[from] opentelemetry::trace::TraceError),

    #[error("subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    whoami: String,
    otlp_url: Option<String>,
    default_filter: String,
    ansi: bool,
}

impl LoggerConfig {
    pub fn new(whoami: String) -> Self {
        Self {
            whoami,
            otlp_url: None,
            default_filter: DEFAULT_FILTER.to_owned(),
            ansi: true,
        }
    }

    /// Builds a config for the service named `base`, picking up the service
    /// label, OTLP URL and ansi setting from the environment.
    pub fn from_env(base: &str) -> Self {
        let mut config = Self::new(get_whoami_string(base));
        config.otlp_url = get_otlp_url_from_env();
        config.ansi = parse_env_or(LOG_ANSI_ENVVAR, true);
        config
    }

    pub fn with_otlp_url(mut self, url: impl Into<String>) -> Self {
        self.otlp_url = Some(url.into());
        self
    }

    /// Sets the filter directives used when `RUST_LOG` is absent.
    pub fn with_default_filter(mut self, directives: impl Into<String>) -> Self {
        self.default_filter = directives.into();
        self
    }

    pub fn whoami(&self) -> &str {
        &self.whoami
    }

    pub fn otlp_url(&self) -> Option<&str> {
        self.otlp_url.as_deref()
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Installs the global subscriber.
///
/// The OTLP exporter is spawned on the current tokio runtime, so when an OTLP
/// URL is set this must be called from within a runtime context.
pub fn init(config: LoggerConfig) -> Result<(), LoggingError> {
    let stdout = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(config.ansi)
        .with_filter(config.env_filter());

    let otel = match config.otlp_url() {
        Some(url) => {
            let exporter = opentelemetry_otlp::new_exporter().tonic().with_endpoint(url);
            let provider = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;

            let tracer = provider.tracer(TRACER_NAME);
            let _ = opentelemetry::global::set_tracer_provider(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    // An absent layer is a no-op.
    tracing_subscriber::registry()
        .with(stdout)
        .with(otel)
        .try_init()?;

    info!(whoami = %config.whoami, otlp = ?config.otlp_url, "logging started");
    Ok(())
}

/// Flushes pending spans to the OTLP collector, if one was configured.
pub fn finalize() {
    info!("shutting down logging");
    opentelemetry::global::shutdown_tracer_provider();
}

pub fn get_otlp_url_from_env() -> Option<String> {
    get_nonempty_env(OTLP_URL_ENVVAR)
}

/// Appends the service label from the environment to `base`, if there is one.
pub fn get_whoami_string(base: &str) -> String {
    match get_nonempty_env(SVC_LABEL_ENVVAR) {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    // Both cases share one test since they touch the same envvar.
    #[test]
    fn test_whoami_includes_label() {
        env::set_var(SVC_LABEL_ENVVAR, "replica-2");
        assert_eq!(get_whoami_string("goliath-executer"), "goliath-executer%replica-2");

        env::set_var(SVC_LABEL_ENVVAR, "");
        assert_eq!(get_whoami_string("goliath-executer"), "goliath-executer");

        env::remove_var(SVC_LABEL_ENVVAR);
        assert_eq!(get_whoami_string("goliath-executer"), "goliath-executer");
    }

    #[test]
    fn test_builder() {
        let config = LoggerConfig::new("svc".to_string())
            .with_otlp_url("http://collector:4317")
            .with_default_filter("goliath_watcher=debug");
        assert_eq!(config.whoami(), "svc");
        assert_eq!(config.otlp_url(), Some("http://collector:4317"));
        assert_eq!(config.default_filter, "goliath_watcher=debug");
        assert!(config.ansi);
    }
}
