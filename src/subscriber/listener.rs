//! Subscriber endpoint listener
//!
//! Accepts any number of WebSocket clients and spawns one task per
//! connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;

use crate::error::{EndpointRole, Error, Result};
use crate::registry::{SubscriberId, SubscriberRegistry};
use crate::server::config::RelayConfig;
use crate::stats::RelayStats;

use super::connection::SubscriberConnection;

/// WebSocket listener for display clients
pub struct SubscriberListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: RelayConfig,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
    next_subscriber_id: AtomicU64,
}

impl SubscriberListener {
    /// Bind the subscriber endpoint
    pub async fn bind(
        config: RelayConfig,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<RelayStats>,
    ) -> Result<Self> {
        let addr = config.subscriber_addr();
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            role: EndpointRole::Subscriber,
            addr,
            source,
        })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            config,
            registry,
            stats,
            next_subscriber_id: AtomicU64::new(1),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept subscribers forever
    pub async fn run(&self) -> Result<()> {
        tracing::info!(addr = %self.local_addr, "Subscriber endpoint listening");

        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept subscriber connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(subscriber = %id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);
        let handshake_timeout = self.config.handshake_timeout;
        let queue_capacity = self.config.subscriber_queue_capacity;

        tokio::spawn(async move {
            let ws = match tokio::time::timeout(handshake_timeout, accept_async(socket)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => {
                    stats.record_handshake_failure();
                    tracing::warn!(peer = %peer_addr, error = %e, "WebSocket handshake failed");
                    return;
                }
                Err(_) => {
                    stats.record_handshake_failure();
                    tracing::warn!(peer = %peer_addr, "WebSocket handshake timed out");
                    return;
                }
            };

            stats.record_subscriber();
            tracing::info!(subscriber = %id, peer = %peer_addr, "Subscriber connected");

            SubscriberConnection::new(id, peer_addr, ws, queue_capacity)
                .run(&registry)
                .await;
        });
    }
}
