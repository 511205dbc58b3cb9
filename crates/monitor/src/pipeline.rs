use std::time::Duration;

use chrono::Utc;
use sui_watch_domain::model::{MonitoredAccount, TransactionEvent};
use sui_watch_domain::services::cache::{DigestPresence, DigestWindow};
use tracing::{debug, warn};

use crate::rpc::{TransactionPage, POLL_PAGE_SIZE};

/// Per-account poll state, owned exclusively by one watcher.
#[derive(Debug, Clone)]
pub struct WatcherState {
    seen_digests: DigestWindow,
    is_first_poll: bool,
    backoff: Duration,
}

impl WatcherState {
    pub fn new(dedup_capacity: usize, initial_backoff: Duration) -> Self {
        // The window must hold at least one full page of digests.
        let capacity = dedup_capacity.max(POLL_PAGE_SIZE as usize);
        Self {
            seen_digests: DigestWindow::new(capacity),
            is_first_poll: true,
            backoff: initial_backoff,
        }
    }

    pub fn seen_digests(&self) -> &DigestWindow {
        &self.seen_digests
    }

    pub fn is_first_poll(&self) -> bool {
        self.is_first_poll
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub(crate) fn set_backoff(&mut self, backoff: Duration) {
        self.backoff = backoff;
    }
}

/// Applies one successful poll result to the watcher state and returns the
/// events that must be alerted and broadcast, in upstream order.
///
/// The first successful page only seeds the dedup window: whatever the
/// upstream returns at that point is history, not news.
pub fn ingest_page(
    state: &mut WatcherState,
    account: &MonitoredAccount,
    page: &TransactionPage,
) -> Vec<TransactionEvent> {
    if state.is_first_poll {
        for block in &page.data {
            state.seen_digests.record(&block.digest);
        }
        state.is_first_poll = false;
        if let Some(latest) = page.data.first() {
            debug!(
                account = %account.name,
                digest = %latest.digest,
                "seeded dedup window with latest historical transaction"
            );
        }
        return Vec::new();
    }

    let mut events = Vec::new();
    for block in &page.data {
        if state.seen_digests.record(&block.digest) == DigestPresence::Seen {
            continue;
        }

        let tx_time = match block.timestamp() {
            Some(time) => time,
            None => {
                warn!(
                    account = %account.name,
                    digest = %block.digest,
                    timestamp = ?block.timestamp_ms,
                    "transaction without usable timestamp; using local clock"
                );
                Utc::now()
            }
        };
        events.push(TransactionEvent::new(account, block.digest.clone(), tx_time));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::TransactionBlock;
    use chrono::DateTime;

    fn account() -> MonitoredAccount {
        MonitoredAccount {
            id: "m1".into(),
            name: "treasury".into(),
            address: "0xabc".into(),
            alert_ref: None,
        }
    }

    fn page(entries: &[(&str, &str)]) -> TransactionPage {
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

    fn state() -> WatcherState {
        WatcherState::new(16, Duration::from_secs(3))
    }

    #[test]
    fn first_poll_seeds_without_events() {
        let mut state = state();
        let events = ingest_page(&mut state, &account(), &page(&[("d1", "1000")]));

        assert!(events.is_empty());
        assert!(!state.is_first_poll());
        assert!(state.seen_digests().contains("d1"));
        assert_eq!(state.seen_digests().len(), 1);
    }

    #[test]
    fn empty_first_poll_still_ends_history_phase() {
        let mut state = state();
        assert!(ingest_page(&mut state, &account(), &page(&[])).is_empty());
        assert!(!state.is_first_poll());

        let events = ingest_page(&mut state, &account(), &page(&[("d1", "1000")]));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn only_unseen_digests_become_events() {
        let mut state = state();
        ingest_page(&mut state, &account(), &page(&[("d1", "1000")]));

        let events = ingest_page(
            &mut state,
            &account(),
            &page(&[("d1", "1000"), ("d2", "2000")]),
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tx_digest, "d2");
        assert_eq!(events[0].account_id, "m1");
        assert_eq!(events[0].tx_time, DateTime::from_timestamp_millis(2_000).unwrap());
        assert!(state.seen_digests().contains("d2"));
    }

    #[test]
    fn repeated_digest_is_emitted_once() {
        let mut state = state();
        ingest_page(&mut state, &account(), &page(&[]));

        let first = ingest_page(&mut state, &account(), &page(&[("d3", "3000")]));
        let second = ingest_page(&mut state, &account(), &page(&[("d3", "3000")]));

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn events_follow_upstream_order() {
        let mut state = state();
        ingest_page(&mut state, &account(), &page(&[]));

        let events = ingest_page(
            &mut state,
            &account(),
            &page(&[("d5", "5000"), ("d4", "4000")]),
        );
        let digests: Vec<_> = events.iter().map(|e| e.tx_digest.as_str()).collect();
        assert_eq!(digests, vec!["d5", "d4"]);
    }

    #[test]
    fn missing_timestamp_does_not_drop_event() {
        let mut state = state();
        ingest_page(&mut state, &account(), &page(&[]));

        let mut with_gap = page(&[("d6", "6000")]);
        with_gap.data[0].timestamp_ms = None;
        let events = ingest_page(&mut state, &account(), &with_gap);
        assert_eq!(events.len(), 1);
    }
}
