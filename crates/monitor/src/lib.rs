//! Sui account monitoring engine: per-account watchers, the event fan-out
//! hub and the supervisor that ties them together. The API binary embeds
//! this crate; `main.rs` runs the same engine headless.

pub mod alert;
pub mod hub;
pub mod pipeline;
pub mod rpc;
pub mod supervisor;
pub mod worker;

pub use alert::{AlertSink, CommandAlertSink, LogAlertSink};
pub use hub::{
    event_channel, run_dispatch, BroadcastHub, Payload, Subscription, EVENT_CHANNEL_CAPACITY,
};
pub use rpc::{RpcTransactionSource, TransactionPage, TransactionSource};
pub use supervisor::{
    build_alert_sink, build_monitor_source, build_rpc_source, MonitorStatus, MonitoringSupervisor,
};
pub use worker::{MonitorError, Watcher, WatcherTiming};
