use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use sui_watch_domain::model::{format_local, MonitoredAccount};
use sui_watch_monitor::MonitorStatus;

use crate::state::AppState;

pub const NO_ACCOUNTS_MESSAGE: &str = "no accounts configured";

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub time: String,
    pub monitor_data: Vec<MonitoredAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub watchers: usize,
    pub subscribers: usize,
}

pub async fn status_handler(state: web::Data<AppState>) -> HttpResponse {
    let supervisor = state.supervisor();
    let (monitor_data, error) = match supervisor.status().await {
        MonitorStatus::NoAccounts => (Vec::new(), Some(NO_ACCOUNTS_MESSAGE.to_string())),
        // a failed reload keeps the old watchers running but is still worth reporting
        MonitorStatus::Monitoring { accounts, .. } => (accounts, supervisor.startup_error()),
        MonitorStatus::Unavailable { error } => (Vec::new(), Some(error)),
    };

    HttpResponse::Ok().json(StatusResponse {
        time: format_local(&Utc::now()),
        monitor_data,
        error,
        watchers: supervisor.running_watchers(),
        subscribers: state.hub().subscriber_count(),
    })
}
