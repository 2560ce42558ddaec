//! Subscriber handle types
//!
//! A handle is the registry's view of one downstream connection: an id,
//! the peer address and the sending half of that connection's outbound
//! queue. The connection task owns the receiving half and the socket.
//!
//! Removing a handle from the registry also raises its eviction signal, so a
//! connection task blocked on a slow socket stops without draining its
//! backlog.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Utf8Bytes;

use super::error::SendError;

/// A relayed message
///
/// Reference counted, so fanning one payload out to many subscribers never
/// copies the text.
pub type Payload = Utf8Bytes;

/// Unique identifier for a subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Registry entry for a single subscriber
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    peer_addr: SocketAddr,
    tx: mpsc::Sender<Payload>,
    evicted: Arc<Notify>,
}

impl SubscriberHandle {
    /// Create a handle and the queue its connection task drains
    pub fn new(
        id: SubscriberId,
        peer_addr: SocketAddr,
        queue_capacity: usize,
    ) -> (Self, SubscriberQueue) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let evicted = Arc::new(Notify::new());

        let handle = Self {
            id,
            peer_addr,
            tx,
            evicted: Arc::clone(&evicted),
        };
        (handle, SubscriberQueue { rx, evicted })
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Hand a payload to the connection task without waiting
    pub fn try_deliver(&self, payload: &Payload) -> Result<(), SendError> {
        self.tx.try_send(payload.clone()).map_err(SendError::from)
    }

    /// Tell the connection task to stop now
    ///
    /// The signal is stored if the task is not waiting yet, so it is never
    /// lost.
    pub(crate) fn evict(&self) {
        self.evicted.notify_one();
    }
}

/// Receiving side of a subscriber's outbound queue
#[derive(Debug)]
pub struct SubscriberQueue {
    rx: mpsc::Receiver<Payload>,
    evicted: Arc<Notify>,
}

impl SubscriberQueue {
    /// Next queued payload, `None` once every handle is gone
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Payload, TryRecvError> {
        self.rx.try_recv()
    }

    /// Signal raised when the registry removes this subscriber
    pub fn eviction(&self) -> Arc<Notify> {
        Arc::clone(&self.evicted)
    }
}
