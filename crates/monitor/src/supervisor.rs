use std::sync::{Arc, Mutex};

use metrics::gauge;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sui_watch_domain::{
    config::{AccountSource, MonitorConfig},
    model::{MonitoredAccount, PushMessage},
    storage::MonitorSource,
};
use sui_watch_storage::{FileMonitorSource, SeaOrmStorage};

use crate::{
    alert::{AlertSink, CommandAlertSink, LogAlertSink},
    rpc::{RpcTransactionSource, TransactionSource},
    worker::{MonitorError, Watcher, WatcherTiming},
};

/// Aggregate view reported to status endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStatus {
    /// The registry is readable and empty.
    NoAccounts,
    Monitoring {
        accounts: Vec<MonitoredAccount>,
        watchers: usize,
    },
    /// The registry could not be read.
    Unavailable { error: String },
}

#[derive(Default)]
struct Generation {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Owns one watcher task per monitored account.
///
/// Accounts are read once per [`start`](Self::start); registry edits are
/// picked up only by calling `start` again, which replaces the running
/// generation of watchers.
pub struct MonitoringSupervisor {
    source: Arc<dyn MonitorSource>,
    upstream: Arc<dyn TransactionSource>,
    alerts: Arc<dyn AlertSink>,
    events: mpsc::Sender<PushMessage>,
    timing: WatcherTiming,
    root: CancellationToken,
    generation: Mutex<Generation>,
    startup_error: Mutex<Option<String>>,
}

impl MonitoringSupervisor {
    pub fn new(
        source: Arc<dyn MonitorSource>,
        upstream: Arc<dyn TransactionSource>,
        alerts: Arc<dyn AlertSink>,
        events: mpsc::Sender<PushMessage>,
        timing: WatcherTiming,
    ) -> Self {
        Self {
            source,
            upstream,
            alerts,
            events,
            timing,
            root: CancellationToken::new(),
            generation: Mutex::new(Generation::default()),
            startup_error: Mutex::new(None),
        }
    }

    /// Reads the registry snapshot and spawns one watcher per account,
    /// returning the number of watchers started. Any previous generation is
    /// cancelled first. A registry read failure leaves the current watchers
    /// untouched and is remembered for [`startup_error`](Self::startup_error).
    pub async fn start(&self) -> Result<usize, MonitorError> {
        let accounts = match self.source.list_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                error!(error = %err, "failed to read monitor registry");
                *self.startup_error.lock().expect("status lock poisoned") = Some(err.to_string());
                return Err(err.into());
            }
        };
        *self.startup_error.lock().expect("status lock poisoned") = None;

        if accounts.is_empty() {
            warn!("no accounts configured; nothing to monitor");
        }

        let started = accounts.len();
        {
            let mut guard = self.generation.lock().expect("generation lock poisoned");
            guard.token.cancel();

            let token = self.root.child_token();
            let handles = accounts
                .into_iter()
                .map(|account| {
                    let watcher = Watcher::new(
                        account,
                        self.upstream.clone(),
                        self.alerts.clone(),
                        self.events.clone(),
                        self.timing,
                    );
                    tokio::spawn(watcher.run(token.child_token()))
                })
                .collect();
            *guard = Generation { token, handles };
        }

        gauge!("monitor_watchers").set(started as f64);
        info!(watchers = started, "monitoring started");
        Ok(started)
    }

    /// Uses the registry's own "has any accounts" check first so an empty
    /// registry is never reported as a read failure.
    pub async fn status(&self) -> MonitorStatus {
        match self.source.has_accounts().await {
            Ok(false) => MonitorStatus::NoAccounts,
            Ok(true) => match self.source.list_accounts().await {
                Ok(accounts) => MonitorStatus::Monitoring {
                    accounts,
                    watchers: self.running_watchers(),
                },
                Err(err) => MonitorStatus::Unavailable {
                    error: err.to_string(),
                },
            },
            Err(err) => MonitorStatus::Unavailable {
                error: err.to_string(),
            },
        }
    }

    pub fn running_watchers(&self) -> usize {
        self.generation
            .lock()
            .expect("generation lock poisoned")
            .handles
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn startup_error(&self) -> Option<String> {
        self.startup_error
            .lock()
            .expect("status lock poisoned")
            .clone()
    }

    /// Cancels every watcher and waits for their tasks to finish. Terminal:
    /// watchers started afterwards are cancelled immediately.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let handles = std::mem::take(
            &mut self
                .generation
                .lock()
                .expect("generation lock poisoned")
                .handles,
        );
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(?err, "watcher task ended abnormally");
            }
        }
        gauge!("monitor_watchers").set(0.0);
        info!("monitoring stopped");
    }
}

/// Opens the account registry selected by the config.
pub async fn build_monitor_source(
    config: &MonitorConfig,
) -> Result<Arc<dyn MonitorSource>, MonitorError> {
    let source: Arc<dyn MonitorSource> = match config.account_source() {
        AccountSource::Database(url) => Arc::new(
            SeaOrmStorage::builder()
                .database_url(url.as_str())
                .skip_migrations(config.skip_migrations())
                .build()
                .await?,
        ),
        AccountSource::File(path) => Arc::new(FileMonitorSource::new(path)),
    };
    Ok(source)
}

pub fn build_rpc_source(config: &MonitorConfig) -> Result<Arc<dyn TransactionSource>, MonitorError> {
    Ok(Arc::new(RpcTransactionSource::new(
        config.rpc_url(),
        config.rpc_timeout(),
    )?))
}

pub fn build_alert_sink(config: &MonitorConfig) -> Arc<dyn AlertSink> {
    match config.alert_player().and_then(CommandAlertSink::from_command_line) {
        Some(sink) => Arc::new(sink.with_warning_audio(config.warning_audio())),
        None => Arc::new(LogAlertSink),
    }
}
