//! Domain-level building blocks shared across the API and monitor crates:
//! the account/event model, the registry contract, environment
//! configuration and process telemetry.

pub mod config;
pub mod model;
pub mod services;
pub mod storage;

pub use model::*;
pub use services::*;
pub use storage::*;
