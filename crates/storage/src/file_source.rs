use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use sui_watch_domain::model::MonitoredAccount;
use sui_watch_domain::storage::{MonitorSource, StorageError, StorageResult};
use tracing::debug;

/// Registry read from a JSON document of the form
/// `{"accounts": [{"name": .., "address": .., "audio": ..}]}`.
/// The file is re-read on every call so edits show up on the next start.
#[derive(Debug, Clone)]
pub struct FileMonitorSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<FileAccount>,
}

#[derive(Debug, Deserialize)]
struct FileAccount {
    #[serde(default)]
    id: Option<String>,
    name: String,
    address: String,
    #[serde(default, alias = "alert_ref")]
    audio: Option<String>,
}

impl FileMonitorSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MonitorSource for FileMonitorSource {
    async fn list_accounts(&self) -> StorageResult<Vec<MonitoredAccount>> {
        let raw = tokio::fs::read(&self.path).await.map_err(|err| {
            StorageError::File(format!("{}: {err}", self.path.display()))
        })?;
        let parsed: AccountsFile = serde_json::from_slice(&raw).map_err(|err| {
            StorageError::File(format!("{}: {err}", self.path.display()))
        })?;

        let accounts: Vec<MonitoredAccount> = parsed
            .accounts
            .into_iter()
            .map(|entry| MonitoredAccount {
                id: entry.id.unwrap_or_else(|| entry.name.clone()),
                name: entry.name,
                address: entry.address.trim().to_string(),
                alert_ref: entry.audio.filter(|audio| !audio.trim().is_empty()),
            })
            .collect();
        debug!(path = %self.path.display(), accounts = accounts.len(), "read accounts file");
        Ok(accounts)
    }
}
