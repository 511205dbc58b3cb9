use actix_web::{web, HttpResponse};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub watchers: usize,
}

/// Re-reads the registry and replaces the running watchers.
pub async fn reload_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let watchers = match state.supervisor().start().await {
        Ok(watchers) => watchers,
        Err(err) => {
            counter!("api_reload_requests_total", "status" => "failed").increment(1);
            return Err(err.into());
        }
    };
    counter!("api_reload_requests_total", "status" => "ok").increment(1);
    info!(watchers, "monitoring reloaded");
    Ok(HttpResponse::Ok().json(ReloadResponse { watchers }))
}
