//! A single subscriber connection
//!
//! Owns the WebSocket after the handshake. Payloads queued by the registry
//! are written as text frames; anything the client sends is ignored except
//! a close. The registry entry lives exactly as long as this task.
//!
//! Once the registry removes the subscriber the task stops at once, even in
//! the middle of a write to a client that has stopped reading. Frames still
//! queued at that point are discarded.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::registry::{SubscriberHandle, SubscriberId, SubscriberQueue, SubscriberRegistry};

/// How long the closing handshake may take before the socket is dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a subscriber connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Client sent a close frame or closed the socket
    ClientClosed,
    /// Reading from or writing to the socket failed
    Error,
    /// The registry dropped this subscriber after a failed delivery
    Dropped,
    /// Another live subscriber already holds this id
    Rejected,
}

impl std::fmt::Display for Disconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disconnect::ClientClosed => write!(f, "client closed"),
            Disconnect::Error => write!(f, "connection error"),
            Disconnect::Dropped => write!(f, "dropped by registry"),
            Disconnect::Rejected => write!(f, "duplicate subscriber id"),
        }
    }
}

/// Registered lifetime of one WebSocket client
pub struct SubscriberConnection<S> {
    id: SubscriberId,
    peer_addr: SocketAddr,
    ws: WebSocketStream<S>,
    queue_capacity: usize,
}

impl<S> SubscriberConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        id: SubscriberId,
        peer_addr: SocketAddr,
        ws: WebSocketStream<S>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            id,
            peer_addr,
            ws,
            queue_capacity,
        }
    }

    /// Register with the registry and relay until the connection ends
    ///
    /// The subscriber is unregistered on every exit path.
    pub async fn run(self, registry: &Arc<SubscriberRegistry>) -> Disconnect {
        let (handle, queue) = SubscriberHandle::new(self.id, self.peer_addr, self.queue_capacity);
        let id = self.id;

        let Some(_registration) = registry.register_guarded(handle) else {
            tracing::warn!(subscriber = %id, peer = %self.peer_addr, "Subscriber id already registered");
            return Disconnect::Rejected;
        };

        let reason = relay(self.ws, queue).await;

        tracing::info!(subscriber = %id, peer = %self.peer_addr, reason = %reason, "Subscriber disconnected");
        reason
    }
}

async fn relay<S>(ws: WebSocketStream<S>, mut queue: SubscriberQueue) -> Disconnect
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut source) = ws.split();
    let evicted = queue.eviction();

    let reason = loop {
        tokio::select! {
            biased;

            _ = evicted.notified() => break Disconnect::Dropped,
            queued = queue.recv() => match queued {
                Some(payload) => {
                    // A stalled client blocks here; eviction must still win
                    tokio::select! {
                        biased;

                        _ = evicted.notified() => break Disconnect::Dropped,
                        sent = sink.send(Message::Text(payload)) => {
                            if let Err(e) = sent {
                                tracing::debug!(error = %e, "Subscriber write failed");
                                break Disconnect::Error;
                            }
                        }
                    }
                }
                None => break Disconnect::Dropped,
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break Disconnect::ClientClosed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Subscriber read failed");
                    break Disconnect::Error;
                }
            },
        }
    };

    if reason != Disconnect::Error {
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
    }

    reason
}
