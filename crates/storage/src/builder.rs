use sea_orm::Database;
use sui_watch_domain::storage::{StorageError, StorageResult};

use crate::{migration::run_migrations, SeaOrmStorage};

#[derive(Default)]
pub struct StorageBuilder {
    database_url: Option<String>,
    skip_migrations: bool,
}

impl StorageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Leaves the schema untouched, for registries owned by the management
    /// service. Reads then fail until that service has created the table.
    pub fn skip_migrations(mut self, skip: bool) -> Self {
        self.skip_migrations = skip;
        self
    }

    pub async fn build(self) -> StorageResult<SeaOrmStorage> {
        let url = self
            .database_url
            .ok_or_else(|| StorageError::Database("missing database url".into()))?;
        let db = Database::connect(url)
            .await
            .map_err(StorageError::from_source)?;
        if !self.skip_migrations {
            run_migrations(&db).await?;
        }
        Ok(SeaOrmStorage::from_connection(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sui_watch_domain::storage::MonitorSource;

    #[tokio::test]
    async fn requires_database_url() {
        let err = StorageBuilder::new().build().await.err().expect("missing url");
        assert_eq!(err, StorageError::Database("missing database url".into()));
    }

    #[tokio::test]
    async fn migrated_database_is_readable() {
        let storage = SeaOrmStorage::builder()
            .database_url("sqlite::memory:")
            .build()
            .await
            .expect("storage inits");
        assert!(!storage.has_accounts().await.unwrap());
    }

    #[tokio::test]
    async fn skipped_migrations_surface_as_read_errors() {
        let storage = SeaOrmStorage::builder()
            .database_url("sqlite::memory:")
            .skip_migrations(true)
            .build()
            .await
            .expect("connects");
        assert!(matches!(
            storage.list_accounts().await,
            Err(StorageError::Database(_))
        ));
    }
}
