//! Data structures shared across the API and monitor binaries.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Display format used for transaction timestamps in push messages. Times
/// are rendered in the server's local timezone.
pub const TX_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Immutable snapshot of a registry entry. A running watcher keeps the
/// snapshot it was started with; registry edits need a fresh supervisor start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredAccount {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub alert_ref: Option<String>,
}

/// A newly observed incoming transaction for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionEvent {
    pub account_id: String,
    pub account_name: String,
    pub address: String,
    pub alert_ref: Option<String>,
    #[serde(serialize_with = "serialize_tx_time")]
    pub tx_time: DateTime<Utc>,
    pub tx_digest: String,
}

impl TransactionEvent {
    pub fn new(account: &MonitoredAccount, tx_digest: String, tx_time: DateTime<Utc>) -> Self {
        Self {
            account_id: account.id.clone(),
            account_name: account.name.clone(),
            address: account.address.clone(),
            alert_ref: account.alert_ref.clone(),
            tx_time,
            tx_digest,
        }
    }

    pub fn formatted_time(&self) -> String {
        format_local(&self.tx_time)
    }
}

/// Failure notification for a single watcher poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatcherErrorEvent {
    pub account_name: String,
    pub error: String,
}

/// Envelope pushed to real-time subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    NewTransaction(TransactionEvent),
    Error(WatcherErrorEvent),
}

impl PushMessage {
    pub fn account_name(&self) -> &str {
        match self {
            PushMessage::NewTransaction(event) => &event.account_name,
            PushMessage::Error(event) => &event.account_name,
        }
    }
}

impl From<TransactionEvent> for PushMessage {
    fn from(value: TransactionEvent) -> Self {
        Self::NewTransaction(value)
    }
}

impl From<WatcherErrorEvent> for PushMessage {
    fn from(value: WatcherErrorEvent) -> Self {
        Self::Error(value)
    }
}

fn serialize_tx_time<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&format_local(value))
}

/// Formats a UTC instant as local wall-clock time.
pub fn format_local(value: &DateTime<Utc>) -> String {
    value.with_timezone(&Local).format(TX_TIME_FORMAT).to_string()
}
