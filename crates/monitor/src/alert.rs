//! Local notification side effects fired by watchers.
//!
//! Alerts are best effort: a missing audio file or a broken player is logged
//! and counted, never surfaced to the watcher.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use metrics::counter;
use strum_macros::IntoStaticStr;
use tokio::fs;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capability invoked by watchers. Calls must return promptly and may run
/// concurrently from many watchers.
pub trait AlertSink: Send + Sync {
    /// Signals a new transaction using the account's alert reference.
    fn notify(&self, alert_ref: Option<&str>);

    /// Signals that a watcher poll failed.
    fn notify_error(&self, account_name: &str, error: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
    Transaction,
    WatcherError,
}

impl AlertKind {
    pub fn label(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AlertOutcome {
    Spawned,
    NoReference,
    MissingFile,
    SpawnFailed,
}

impl AlertOutcome {
    pub fn label(self) -> &'static str {
        self.into()
    }
}

/// Sink used when no player is configured: alerts only reach the log.
#[derive(Debug, Default, Clone)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn notify(&self, alert_ref: Option<&str>) {
        info!(alert_ref = ?alert_ref, "transaction alert");
        counter!(
            "monitor_alerts_total",
            "kind" => AlertKind::Transaction.label(),
            "result" => "logged"
        )
        .increment(1);
    }

    fn notify_error(&self, account_name: &str, error: &str) {
        warn!(account = account_name, error, "watcher error alert");
        counter!(
            "monitor_alerts_total",
            "kind" => AlertKind::WatcherError.label(),
            "result" => "logged"
        )
        .increment(1);
    }
}

/// Plays audio cues by launching an external player per alert. Each alert is
/// an independent child process, so overlapping alerts play concurrently.
#[derive(Debug, Clone)]
pub struct CommandAlertSink {
    program: String,
    args: Vec<String>,
    warning_audio: Option<PathBuf>,
}

impl CommandAlertSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            warning_audio: None,
        }
    }

    /// Parses a whitespace separated command line such as `mpv --no-video`.
    /// The audio path is appended as the last argument.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn with_warning_audio(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.warning_audio = path.map(Into::into);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Hands the alert to a background task so the file check and the
    /// process launch never run on the calling watcher.
    pub(crate) fn dispatch(
        &self,
        audio: Option<&Path>,
        kind: AlertKind,
    ) -> Option<JoinHandle<AlertOutcome>> {
        let Some(audio) = audio else {
            debug!(kind = kind.label(), "no alert audio configured");
            record_outcome(kind, AlertOutcome::NoReference);
            return None;
        };

        let sink = self.clone();
        let audio = audio.to_path_buf();
        Some(tokio::spawn(async move { sink.play(&audio, kind).await }))
    }

    pub(crate) async fn play(&self, audio: &Path, kind: AlertKind) -> AlertOutcome {
        let outcome = self.spawn_player(audio, kind).await;
        record_outcome(kind, outcome);
        outcome
    }

    async fn spawn_player(&self, audio: &Path, kind: AlertKind) -> AlertOutcome {
        let is_file = fs::metadata(audio)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            warn!(path = %audio.display(), kind = kind.label(), "alert audio file not found");
            return AlertOutcome::MissingFile;
        }

        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(audio)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let path = audio.display().to_string();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            warn!(path = %path, %status, "alert player exited with failure");
                        }
                        Err(err) => warn!(path = %path, ?err, "failed to wait for alert player"),
                        Ok(_) => {}
                    }
                });
                AlertOutcome::Spawned
            }
            Err(err) => {
                warn!(program = %self.program, ?err, "failed to launch alert player");
                AlertOutcome::SpawnFailed
            }
        }
    }
}

fn record_outcome(kind: AlertKind, outcome: AlertOutcome) {
    counter!(
        "monitor_alerts_total",
        "kind" => kind.label(),
        "result" => outcome.label()
    )
    .increment(1);
}

impl AlertSink for CommandAlertSink {
    fn notify(&self, alert_ref: Option<&str>) {
        self.dispatch(alert_ref.map(Path::new), AlertKind::Transaction);
    }

    fn notify_error(&self, account_name: &str, error: &str) {
        warn!(account = account_name, error, "watcher error alert");
        self.dispatch(self.warning_audio.as_deref(), AlertKind::WatcherError);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_audio() -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "sui-watch-alert-{}-{}.mp3",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, b"ID3").unwrap();
        path
    }

    #[test]
    fn parses_command_line() {
        let sink = CommandAlertSink::from_command_line("  mpv --no-video --really-quiet ")
            .expect("program present");
        assert_eq!(sink.program(), "mpv");
        assert_eq!(sink.args(), ["--no-video", "--really-quiet"]);
        assert!(CommandAlertSink::from_command_line("   ").is_none());
    }

    #[test]
    fn missing_reference_is_swallowed() {
        let sink = CommandAlertSink::new("true", Vec::new());
        assert!(sink.dispatch(None, AlertKind::Transaction).is_none());
        sink.notify(None);
    }

    #[tokio::test]
    async fn missing_file_is_swallowed() {
        let sink = CommandAlertSink::new("true", Vec::new());
        let outcome = sink
            .play(Path::new("/definitely/not/here.mp3"), AlertKind::Transaction)
            .await;
        assert_eq!(outcome, AlertOutcome::MissingFile);
    }

    #[tokio::test]
    async fn file_check_runs_off_the_calling_task() {
        let sink = CommandAlertSink::new("true", Vec::new());
        let handle = sink
            .dispatch(
                Some(Path::new("/definitely/not/here.mp3")),
                AlertKind::Transaction,
            )
            .expect("alert with a reference is dispatched");

        // current-thread runtime: nothing has run until this task yields
        assert!(!handle.is_finished());
        assert_eq!(handle.await.unwrap(), AlertOutcome::MissingFile);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawns_player_for_existing_file() {
        let audio = temp_audio();
        let sink = CommandAlertSink::new("true", Vec::new());

        assert_eq!(
            sink.play(&audio, AlertKind::Transaction).await,
            AlertOutcome::Spawned
        );
        // overlapping alerts are independent processes
        assert_eq!(
            sink.play(&audio, AlertKind::Transaction).await,
            AlertOutcome::Spawned
        );

        std::fs::remove_file(&audio).unwrap();
    }

    #[tokio::test]
    async fn unknown_player_is_swallowed() {
        let audio = temp_audio();
        let sink = CommandAlertSink::new("sui-watch-no-such-player", Vec::new());

        assert_eq!(
            sink.play(&audio, AlertKind::Transaction).await,
            AlertOutcome::SpawnFailed
        );

        std::fs::remove_file(&audio).unwrap();
    }

    #[test]
    fn error_alert_without_warning_audio_is_noop() {
        let sink = CommandAlertSink::new("true", Vec::new()).with_warning_audio(None::<PathBuf>);
        sink.notify_error("treasury", "upstream returned HTTP 500");
    }
}
