use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use strum_macros::IntoStaticStr;
use thiserror::Error;
use tokio::{sync::mpsc, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sui_watch_domain::{
    config::{ConfigError, MonitorConfig, DEFAULT_DEDUP_CAPACITY},
    model::{MonitoredAccount, PushMessage, TransactionEvent, WatcherErrorEvent},
    services::telemetry::TelemetryError,
    storage::StorageError,
};

use crate::{
    alert::AlertSink,
    pipeline::{ingest_page, WatcherState},
    rpc::TransactionSource,
};

#[derive(Debug, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {0}")]
    UpstreamStatus(u16),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

impl MonitorError {
    pub fn label(&self) -> &'static str {
        self.into()
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Malformed(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Poll cadence shared by every watcher of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherTiming {
    pub poll_interval: Duration,
    pub failure_interval: Duration,
    pub dedup_capacity: usize,
}

impl WatcherTiming {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            failure_interval: config.failure_interval(),
            dedup_capacity: config.dedup_capacity(),
        }
    }
}

impl Default for WatcherTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            failure_interval: Duration::from_secs(10),
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

/// Poll loop for a single monitored account.
pub struct Watcher {
    account: MonitoredAccount,
    source: Arc<dyn TransactionSource>,
    alerts: Arc<dyn AlertSink>,
    events: mpsc::Sender<PushMessage>,
    timing: WatcherTiming,
    state: WatcherState,
}

impl Watcher {
    pub fn new(
        account: MonitoredAccount,
        source: Arc<dyn TransactionSource>,
        alerts: Arc<dyn AlertSink>,
        events: mpsc::Sender<PushMessage>,
        timing: WatcherTiming,
    ) -> Self {
        Self {
            account,
            source,
            alerts,
            events,
            state: WatcherState::new(timing.dedup_capacity, timing.poll_interval),
            timing,
        }
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    /// Runs until `cancel` fires. Poll failures only change the delay before
    /// the next attempt.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            account = %self.account.name,
            address = %self.account.address,
            "watcher started"
        );

        loop {
            let delay = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                delay = self.poll_once() => delay,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        info!(account = %self.account.name, "watcher stopped");
    }

    /// Performs one poll and returns how long to wait before the next one.
    pub async fn poll_once(&mut self) -> Duration {
        match self.source.latest_incoming(&self.account.address).await {
            Ok(page) => {
                counter!("monitor_rpc_calls_total", "result" => "ok").increment(1);
                let events = ingest_page(&mut self.state, &self.account, &page);
                for event in events {
                    self.deliver(event).await;
                }
                self.state.set_backoff(self.timing.poll_interval);
            }
            Err(err) => {
                counter!("monitor_rpc_calls_total", "result" => err.label()).increment(1);
                self.report_failure(&err).await;
                self.state.set_backoff(self.timing.failure_interval);
            }
        }

        self.state.backoff()
    }

    async fn deliver(&self, event: TransactionEvent) {
        info!(
            account = %event.account_name,
            digest = %event.tx_digest,
            tx_time = %event.formatted_time(),
            "new incoming transaction"
        );
        counter!("monitor_transactions_total").increment(1);

        self.alerts.notify(event.alert_ref.as_deref());
        if self.events.send(PushMessage::from(event)).await.is_err() {
            debug!(account = %self.account.name, "event dispatcher stopped; event not broadcast");
        }
    }

    async fn report_failure(&self, err: &MonitorError) {
        warn!(
            account = %self.account.name,
            error = %err,
            retry_in = ?self.timing.failure_interval,
            "poll failed"
        );

        let error = err.to_string();
        self.alerts.notify_error(&self.account.name, &error);
        let message = PushMessage::from(WatcherErrorEvent {
            account_name: self.account.name.clone(),
            error,
        });
        if self.events.send(message).await.is_err() {
            debug!(account = %self.account.name, "event dispatcher stopped; error not broadcast");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rpc::{TransactionBlock, TransactionPage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Upstream stub replaying a script, then returning empty pages.
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        script: Mutex<VecDeque<Result<TransactionPage, MonitorError>>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedSource {
        pub(crate) fn new(
            script: impl IntoIterator<Item = Result<TransactionPage, MonitorError>>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
        }

        pub(crate) fn addresses(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(address, _)| address.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TransactionSource for ScriptedSource {
        async fn latest_incoming(&self, address: &str) -> Result<TransactionPage, MonitorError> {
            self.calls
                .lock()
                .unwrap()
                .push((address.to_string(), Instant::now()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TransactionPage::default()))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum AlertCall {
        Transaction(Option<String>),
        Error(String, String),
    }

    #[derive(Default)]
    pub(crate) struct RecordingAlerts {
        calls: Mutex<Vec<AlertCall>>,
    }

    impl RecordingAlerts {
        pub(crate) fn calls(&self) -> Vec<AlertCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AlertSink for RecordingAlerts {
        fn notify(&self, alert_ref: Option<&str>) {
            self.calls
                .lock()
                .unwrap()
                .push(AlertCall::Transaction(alert_ref.map(str::to_string)));
        }

        fn notify_error(&self, account_name: &str, error: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(AlertCall::Error(account_name.to_string(), error.to_string()));
        }
    }

    pub(crate) fn page(entries: &[(&str, &str)]) -> TransactionPage {
        TransactionPage {
            data: entries
                .iter()
                .map(|(digest, ts)| TransactionBlock {
                    digest: digest.to_string(),
                    timestamp_ms: Some(ts.to_string()),
                })
                .collect(),
        }
    }

    pub(crate) fn account(id: &str, address: &str) -> MonitoredAccount {
        MonitoredAccount {
            id: id.into(),
            name: format!("account-{id}"),
            address: address.into(),
            alert_ref: Some(format!("/audio/{id}.mp3")),
        }
    }

    fn watcher(
        source: Arc<ScriptedSource>,
        alerts: Arc<RecordingAlerts>,
    ) -> (Watcher, mpsc::Receiver<PushMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let watcher = Watcher::new(
            account("m1", "0xabc"),
            source,
            alerts,
            tx,
            WatcherTiming::default(),
        );
        (watcher, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<PushMessage>) -> Vec<PushMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn historical_transaction_is_suppressed_then_new_one_emitted() {
        let source = Arc::new(ScriptedSource::new([
            Ok(page(&[("d1", "1000")])),
            Ok(page(&[("d1", "1000"), ("d2", "2000")])),
        ]));
        let alerts = Arc::new(RecordingAlerts::default());
        let (mut watcher, mut rx) = watcher(source.clone(), alerts.clone());

        assert_eq!(watcher.poll_once().await, Duration::from_secs(3));
        assert!(drain(&mut rx).is_empty());
        assert!(alerts.calls().is_empty());
        assert!(watcher.state().seen_digests().contains("d1"));

        watcher.poll_once().await;
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            PushMessage::NewTransaction(event) => {
                assert_eq!(event.tx_digest, "d2");
                assert_eq!(event.account_id, "m1");
                assert_eq!(event.address, "0xabc");
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(
            alerts.calls(),
            vec![AlertCall::Transaction(Some("/audio/m1.mp3".into()))]
        );
        assert_eq!(source.addresses(), vec!["0xabc", "0xabc"]);
    }

    #[tokio::test]
    async fn same_digest_on_consecutive_polls_emits_once() {
        let source = Arc::new(ScriptedSource::new([
            Ok(page(&[])),
            Ok(page(&[("d7", "7000")])),
            Ok(page(&[("d7", "7000")])),
        ]));
        let alerts = Arc::new(RecordingAlerts::default());
        let (mut watcher, mut rx) = watcher(source, alerts.clone());

        for _ in 0..3 {
            watcher.poll_once().await;
        }

        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(alerts.calls().len(), 1);
    }

    #[tokio::test]
    async fn failure_alerts_broadcasts_error_and_backs_off() {
        let source = Arc::new(ScriptedSource::new([Err(MonitorError::UpstreamStatus(500))]));
        let alerts = Arc::new(RecordingAlerts::default());
        let (mut watcher, mut rx) = watcher(source, alerts.clone());

        let delay = watcher.poll_once().await;

        assert_eq!(delay, Duration::from_secs(10));
        assert!(watcher.state().is_first_poll());
        assert_eq!(
            alerts.calls(),
            vec![AlertCall::Error(
                "account-m1".into(),
                "upstream returned HTTP 500".into()
            )]
        );
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], PushMessage::Error(event) if event.account_name == "account-m1"));

        assert_eq!(watcher.poll_once().await, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_failure_waits_the_failure_interval() {
        let source = Arc::new(ScriptedSource::new([
            Err(MonitorError::UpstreamStatus(500)),
            Ok(page(&[("d1", "1000")])),
        ]));
        let alerts = Arc::new(RecordingAlerts::default());
        let (watcher, mut rx) = watcher(source.clone(), alerts.clone());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(cancel.clone()));

        sleep(Duration::from_secs(11)).await;

        let calls = source.call_times();
        assert_eq!(calls.len(), 2);
        let gap = calls[1] - calls[0];
        assert!(gap >= Duration::from_secs(10));
        assert!(gap > Duration::from_secs(3));
        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(alerts.calls().len(), 1);

        cancel.cancel();
        handle.await.expect("watcher exits cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn successful_polls_follow_the_poll_interval() {
        let source = Arc::new(ScriptedSource::new([]));
        let alerts = Arc::new(RecordingAlerts::default());
        let (watcher, _rx) = watcher(source.clone(), alerts);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(cancel.clone()));

        sleep(Duration::from_millis(7_500)).await;

        let calls = source.call_times();
        assert_eq!(calls.len(), 3);
        let gap = calls[1] - calls[0];
        assert!(gap >= Duration::from_secs(3) && gap < Duration::from_secs(4));

        cancel.cancel();
        handle.await.expect("watcher exits cleanly");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep() {
        let source = Arc::new(ScriptedSource::new([Err(MonitorError::Transport(
            "connection refused".into(),
        ))]));
        let alerts = Arc::new(RecordingAlerts::default());
        let (watcher, _rx) = watcher(source.clone(), alerts);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(watcher.run(cancel.clone()));

        sleep(Duration::from_secs(1)).await;
        let started = Instant::now();
        cancel.cancel();
        handle.await.expect("watcher exits cleanly");

        assert!(Instant::now() - started < Duration::from_secs(1));
        assert_eq!(source.call_times().len(), 1);
    }

    #[tokio::test]
    async fn closed_dispatcher_does_not_stop_polling() {
        let source = Arc::new(ScriptedSource::new([
            Ok(page(&[])),
            Ok(page(&[("d9", "9000")])),
        ]));
        let alerts = Arc::new(RecordingAlerts::default());
        let (mut watcher, rx) = watcher(source, alerts.clone());
        drop(rx);

        watcher.poll_once().await;
        assert_eq!(watcher.poll_once().await, Duration::from_secs(3));
        assert_eq!(alerts.calls().len(), 1);
    }
}
