pub mod metrics;
pub mod reload;
pub mod status;
pub mod ws;

pub use metrics::metrics_handler;
pub use reload::reload_handler;
pub use status::status_handler;
pub use ws::ws_handler;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use sui_watch_monitor::MonitorError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("monitor failure: {0}")]
    Monitor(#[from] MonitorError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Monitor(MonitorError::Storage(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Monitor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
