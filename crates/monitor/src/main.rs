//! Headless monitor: watches the configured accounts and fires local alerts
//! without serving any HTTP surface.

use std::io;
use std::sync::Arc;

use sui_watch_domain::config::MonitorConfig;
use sui_watch_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use sui_watch_monitor::{
    build_alert_sink, build_monitor_source, build_rpc_source, event_channel, run_dispatch,
    BroadcastHub, MonitorError, MonitoringSupervisor, WatcherTiming, EVENT_CHANNEL_CAPACITY,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[monitor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let config = MonitorConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("MONITOR");
    init_telemetry(&telemetry_config)?;

    let source = build_monitor_source(&config).await?;
    let upstream = build_rpc_source(&config)?;
    let alerts = build_alert_sink(&config);

    // Nobody subscribes here; the hub only drains the event channel.
    let hub = Arc::new(BroadcastHub::default());
    let (events, receiver) = event_channel(EVENT_CHANNEL_CAPACITY);
    let dispatch_cancel = CancellationToken::new();
    let dispatcher = tokio::spawn(run_dispatch(hub, receiver, dispatch_cancel.clone()));

    let supervisor = MonitoringSupervisor::new(
        source,
        upstream,
        alerts,
        events,
        WatcherTiming::from_config(&config),
    );
    supervisor.start().await?;

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");

    supervisor.shutdown().await;
    dispatch_cancel.cancel();
    if let Err(err) = dispatcher.await {
        warn!(?err, "event dispatcher ended abnormally");
    }
    Ok(())
}
