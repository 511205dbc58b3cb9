use async_trait::async_trait;
use thiserror::Error;

use crate::model::MonitoredAccount;

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("accounts file error: {0}")]
    File(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Provider of the accounts the supervisor should watch.
#[async_trait]
pub trait MonitorSource: Send + Sync {
    async fn list_accounts(&self) -> StorageResult<Vec<MonitoredAccount>>;

    /// Cheap existence check used to tell an empty registry apart from a
    /// failed read.
    async fn has_accounts(&self) -> StorageResult<bool> {
        Ok(!self.list_accounts().await?.is_empty())
    }
}
