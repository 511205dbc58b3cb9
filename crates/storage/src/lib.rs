//! Read-only adapters that satisfy the domain `MonitorSource` contract: a
//! SeaORM-backed registry (SQLite by default, PostgreSQL via feature flag)
//! and a JSON accounts file for the headless monitor.

mod builder;
mod entity;
mod file_source;
mod migration;
mod monitor_source;

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection};
use sui_watch_domain::storage::StorageResult;
use tracing::info;

pub use builder::StorageBuilder;
pub use entity::monitor;
pub use file_source::FileMonitorSource;

/// Shared storage handle used by the HTTP API and monitor services.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStorage {
    /// Connects to the provided database URL and ensures the schema is present.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::builder().database_url(database_url).build().await
    }

    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub(crate) fn from_connection(db: DatabaseConnection) -> Self {
        info!(backend = ?db.get_database_backend(), "monitor registry connected");
        Self { db: Arc::new(db) }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}
