use std::{env, net::SocketAddr, sync::Arc};

use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::hydrate_env_file;

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();
static METRICS_HANDLE: OnceCell<Arc<PrometheusHandle>> = OnceCell::new();

/// Shared observability options for binaries.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    service: String,
    log_filter: String,
    metrics_address: Option<String>,
}

impl TelemetryConfig {
    /// Reads `<PREFIX>_LOG_FILTER` and `<PREFIX>_METRICS_ADDRESS`. The
    /// lowercased prefix doubles as the `service` label on every exported
    /// series, so the api and monitor binaries can share one scrape job.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let upper = prefix.trim().to_ascii_uppercase();
        let log_key = format!("{}_LOG_FILTER", upper);
        let metrics_key = format!("{}_METRICS_ADDRESS", upper);

        let log_filter = env::var(log_key).unwrap_or_else(|_| "info".to_string());
        let metrics_address = env::var(metrics_key).ok().and_then(|value| {
            if value.trim().is_empty() {
                None
            } else {
                Some(value)
            }
        });

        Self {
            service: upper.to_ascii_lowercase(),
            log_filter,
            metrics_address,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn metrics_address(&self) -> Option<&str> {
        self.metrics_address.as_deref()
    }
}

/// Guard returned after telemetry initialization.
#[derive(Clone)]
pub struct TelemetryGuard {
    metrics: Arc<PrometheusHandle>,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }
}

/// Installs the log subscriber and the Prometheus recorder. Safe to call more
/// than once; later calls reuse the first recorder.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    install_tracing(config)?;
    let metrics = install_metrics(config)?;

    Ok(TelemetryGuard { metrics })
}

fn install_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(config.log_filter())
        .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;

    if SUBSCRIBER_INSTALLED.set(()).is_ok() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .map_err(|err| TelemetryError::Tracing(err.to_string()))?;
    }

    Ok(())
}

fn install_metrics(config: &TelemetryConfig) -> Result<Arc<PrometheusHandle>, TelemetryError> {
    METRICS_HANDLE
        .get_or_try_init(|| {
            let mut builder =
                PrometheusBuilder::new().add_global_label("service", config.service());
            if let Some(addr) = config.metrics_address() {
                let socket: SocketAddr =
                    addr.parse().map_err(|err: std::net::AddrParseError| {
                        TelemetryError::InvalidMetricsAddress(addr.to_string(), err.to_string())
                    })?;
                builder = builder.with_http_listener(socket);
            }

            let handle = builder
                .install_recorder()
                .map_err(|err| TelemetryError::Metrics(err.to_string()))?;
            describe_engine_metrics();
            Ok(Arc::new(handle))
        })
        .cloned()
}

/// Registers help text for the series the watchers, hub and api emit, and
/// seeds the gauges so a scrape before the first poll still sees them.
fn describe_engine_metrics() {
    describe_gauge!("monitor_watchers", "Watcher tasks currently polling");
    describe_counter!(
        "monitor_rpc_calls_total",
        "Upstream transaction queries by result"
    );
    describe_counter!(
        "monitor_transactions_total",
        "New incoming transactions observed"
    );
    describe_counter!("monitor_alerts_total", "Audible alerts by kind and outcome");
    describe_gauge!("hub_subscribers", "Connected real-time subscribers");
    describe_counter!("hub_broadcasts_total", "Messages fanned out by the hub");
    describe_counter!(
        "hub_subscribers_dropped_total",
        "Subscribers removed by the hub or their connection task"
    );
    describe_counter!(
        "api_reload_requests_total",
        "Registry reloads requested over the internal api"
    );

    gauge!("monitor_watchers").set(0.0);
    gauge!("hub_subscribers").set(0.0);
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("invalid metrics address `{0}`: {1}")]
    InvalidMetricsAddress(String, String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
