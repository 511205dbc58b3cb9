//! Fan-out of watcher events to live real-time subscribers.
//!
//! Each subscriber is a bounded queue drained by its own connection task.
//! The membership lock only guards the map: broadcasts snapshot the senders
//! and enqueue with `try_send`, so a slow or dead subscriber is dropped
//! instead of stalling the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use metrics::{counter, gauge};
use sui_watch_domain::config::DEFAULT_SUBSCRIBER_BUFFER;
use sui_watch_domain::model::PushMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Serialized push message shared by every subscriber queue.
pub type Payload = Arc<str>;

pub type SubscriberId = u64;

/// Capacity of the channel between watchers and the dispatcher.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Creates the channel watchers publish into.
pub fn event_channel(
    capacity: usize,
) -> (mpsc::Sender<PushMessage>, mpsc::Receiver<PushMessage>) {
    mpsc::channel(capacity.max(1))
}

/// Receiving half handed to a connection task.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Payload>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued payload; `None` once the hub dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }
}

pub struct BroadcastHub {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Payload>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Adds an existing queue to the live set.
    pub fn register(&self, sender: mpsc::Sender<Payload>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut guard = self.subscribers.write().expect("subscriber lock poisoned");
            guard.insert(id, sender);
            guard.len()
        };
        gauge!("hub_subscribers").set(count as f64);
        debug!(subscriber = id, subscribers = count, "subscriber registered");
        id
    }

    /// Creates a queue with the hub's buffer size and registers it.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.register(sender);
        Subscription { id, receiver }
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut guard = self.subscribers.write().expect("subscriber lock poisoned");
            let removed = guard.remove(&id).is_some();
            (removed, guard.len())
        };
        if removed {
            gauge!("hub_subscribers").set(count as f64);
            debug!(subscriber = id, subscribers = count, "subscriber unregistered");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("subscriber lock poisoned")
            .len()
    }

    /// Serializes `message` once and queues it for every subscriber. Returns
    /// how many subscribers accepted it.
    pub fn broadcast(&self, message: &PushMessage) -> usize {
        match serde_json::to_string(message) {
            Ok(json) => self.broadcast_payload(Payload::from(json)),
            Err(err) => {
                error!(?err, account = message.account_name(), "failed to serialize push message");
                0
            }
        }
    }

    pub fn broadcast_payload(&self, payload: Payload) -> usize {
        let targets: Vec<(SubscriberId, mpsc::Sender<Payload>)> = self
            .subscribers
            .read()
            .expect("subscriber lock poisoned")
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        counter!("hub_broadcasts_total").increment(1);

        let mut delivered = 0;
        for (id, sender) in targets {
            match sender.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = id, "subscriber queue full; dropping subscriber");
                    counter!("hub_subscribers_dropped_total", "reason" => "lagging").increment(1);
                    self.unregister(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = id, "subscriber gone; dropping");
                    counter!("hub_subscribers_dropped_total", "reason" => "closed").increment(1);
                    self.unregister(id);
                }
            }
        }
        delivered
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Drains watcher events into the hub until cancelled or until every
/// publisher is gone.
pub async fn run_dispatch(
    hub: Arc<BroadcastHub>,
    mut events: mpsc::Receiver<PushMessage>,
    cancel: CancellationToken,
) {
    info!("event dispatcher started");
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = events.recv() => message,
        };
        let Some(message) = message else {
            break;
        };
        hub.broadcast(&message);
    }
    info!("event dispatcher stopped");
}
