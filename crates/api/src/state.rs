use std::{sync::Arc, time::Duration};

use sui_watch_domain::services::telemetry::TelemetryGuard;
use sui_watch_monitor::{BroadcastHub, MonitoringSupervisor};

#[derive(Clone)]
pub struct AppState {
    supervisor: Arc<MonitoringSupervisor>,
    hub: Arc<BroadcastHub>,
    telemetry: TelemetryGuard,
    send_timeout: Duration,
}

impl AppState {
    pub fn new(
        supervisor: Arc<MonitoringSupervisor>,
        hub: Arc<BroadcastHub>,
        telemetry: TelemetryGuard,
        send_timeout: Duration,
    ) -> Self {
        Self {
            supervisor,
            hub,
            telemetry,
            send_timeout,
        }
    }

    pub fn supervisor(&self) -> &MonitoringSupervisor {
        self.supervisor.as_ref()
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn telemetry(&self) -> &TelemetryGuard {
        &self.telemetry
    }

    /// Upper bound for a single WebSocket write.
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }
}
