use async_trait::async_trait;
use sea_orm::{EntityTrait, PaginatorTrait, QueryOrder};
use sui_watch_domain::model::MonitoredAccount;
use sui_watch_domain::storage::{MonitorSource, StorageError, StorageResult};

use crate::entity::monitor;
use crate::SeaOrmStorage;

impl From<monitor::Model> for MonitoredAccount {
    fn from(value: monitor::Model) -> Self {
        Self {
            id: value.id,
            name: value.name,
            address: value.address,
            alert_ref: value.audio_path.filter(|path| !path.trim().is_empty()),
        }
    }
}

#[async_trait]
impl MonitorSource for SeaOrmStorage {
    async fn list_accounts(&self) -> StorageResult<Vec<MonitoredAccount>> {
        let rows = monitor::Entity::find()
            .order_by_asc(monitor::Column::CreatedAt)
            .order_by_asc(monitor::Column::Id)
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(rows.into_iter().map(MonitoredAccount::from).collect())
    }

    async fn has_accounts(&self) -> StorageResult<bool> {
        let count = monitor::Entity::find()
            .count(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(count > 0)
    }
}
