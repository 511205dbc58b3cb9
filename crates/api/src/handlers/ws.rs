use std::{fmt::Debug, sync::Arc, time::Duration};

use actix_web::{rt, web, HttpRequest, HttpResponse};
use actix_ws::{CloseReason, Closed, Message, Session};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use metrics::counter;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use sui_watch_monitor::{BroadcastHub, Payload, Subscription};

use crate::state::AppState;

/// Why a connection task stopped.
#[derive(Debug)]
enum SessionEnd {
    /// The client closed or its stream ended.
    Client(Option<CloseReason>),
    /// The hub dropped the subscriber (lagging queue).
    Dropped,
    SendTimeout,
    WriteFailed,
}

/// Write half of a subscriber connection.
#[async_trait(?Send)]
trait SubscriberSocket {
    async fn send_text(&mut self, payload: Payload) -> Result<(), Closed>;
    async fn pong(&mut self, bytes: &[u8]) -> Result<(), Closed>;
    async fn close(self, reason: Option<CloseReason>);
}

#[async_trait(?Send)]
impl SubscriberSocket for Session {
    async fn send_text(&mut self, payload: Payload) -> Result<(), Closed> {
        self.text(payload.to_string()).await
    }

    async fn pong(&mut self, bytes: &[u8]) -> Result<(), Closed> {
        Session::pong(self, bytes).await
    }

    async fn close(self, reason: Option<CloseReason>) {
        // the peer may already be gone
        let _ = Session::close(self, reason).await;
    }
}

/// Upgrades to a WebSocket and registers the connection with the hub.
pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, stream) = actix_ws::handle(&req, body)?;
    let subscription = state.hub().subscribe();
    info!(subscriber = subscription.id(), "websocket subscriber connected");

    let hub = state.hub().clone();
    let send_timeout = state.send_timeout();
    rt::spawn(async move {
        serve_subscriber(hub, subscription, session, stream, send_timeout).await;
    });
    Ok(response)
}

/// Forwards queued payloads to one socket in order until the client leaves,
/// the hub drops the queue, or a write fails or stalls past `send_timeout`.
/// The subscriber is always unregistered on exit.
async fn serve_subscriber<W, S, E>(
    hub: Arc<BroadcastHub>,
    mut subscription: Subscription,
    mut socket: W,
    mut stream: S,
    send_timeout: Duration,
) -> SessionEnd
where
    W: SubscriberSocket,
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Debug,
{
    let id = subscription.id();
    let end = loop {
        tokio::select! {
            payload = subscription.recv() => {
                let Some(payload) = payload else {
                    break SessionEnd::Dropped;
                };
                match timeout(send_timeout, socket.send_text(payload)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => break SessionEnd::WriteFailed,
                    Err(_) => break SessionEnd::SendTimeout,
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Ping(bytes))) => {
                    if socket.pong(&bytes).await.is_err() {
                        break SessionEnd::WriteFailed;
                    }
                }
                Some(Ok(Message::Close(reason))) => break SessionEnd::Client(reason),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(subscriber = id, ?err, "websocket protocol error");
                    break SessionEnd::Client(None);
                }
                None => break SessionEnd::Client(None),
            },
        }
    };

    hub.unregister(id);
    let reason = match &end {
        SessionEnd::Client(reason) => reason.clone(),
        SessionEnd::Dropped => None,
        SessionEnd::SendTimeout => {
            warn!(subscriber = id, "websocket write timed out; closing");
            counter!("hub_subscribers_dropped_total", "reason" => "send_timeout").increment(1);
            None
        }
        SessionEnd::WriteFailed => {
            warn!(subscriber = id, "websocket write failed; closing");
            counter!("hub_subscribers_dropped_total", "reason" => "write_failed").increment(1);
            None
        }
    };
    socket.close(reason).await;
    info!(subscriber = id, "websocket subscriber disconnected");
    end
}
