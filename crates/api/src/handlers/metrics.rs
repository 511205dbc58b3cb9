use actix_web::{web, HttpResponse};
use metrics::gauge;

use crate::state::AppState;

/// Prometheus exposition. Live gauges are refreshed at scrape time so they
/// never lag behind tasks that exited on their own.
pub async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    gauge!("monitor_watchers").set(state.supervisor().running_watchers() as f64);
    gauge!("hub_subscribers").set(state.hub().subscriber_count() as f64);

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.telemetry().render_metrics())
}
