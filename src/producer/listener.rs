//! Producer endpoint listener
//!
//! Accepts one producer at a time and serves it to completion before
//! accepting the next.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::error::{EndpointRole, Error, Result};
use crate::registry::SubscriberRegistry;
use crate::server::config::RelayConfig;
use crate::stats::RelayStats;

use super::session::{ProducerSession, SessionEnd};

/// Raw TCP listener for the upstream device
pub struct ProducerListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: RelayConfig,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
}

impl ProducerListener {
    /// Bind the producer endpoint
    pub async fn bind(
        config: RelayConfig,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<RelayStats>,
    ) -> Result<Self> {
        let addr = config.producer_addr();
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            role: EndpointRole::Producer,
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
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept and serve producers forever
    pub async fn run(&self) -> Result<()> {
        tracing::info!(addr = %self.local_addr, "Producer endpoint listening");

        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.serve(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept producer connection");
                }
            }
        }
    }

    async fn serve(&self, mut socket: TcpStream, peer_addr: SocketAddr) {
        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        self.stats.record_producer_session();
        tracing::info!(peer = %peer_addr, framing = %self.config.framing, "Producer connected");

        let mut session = ProducerSession::new(
            peer_addr,
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
            self.config.framing,
            self.config.max_line_length,
            self.config.read_buffer_size,
        );

        match session.run(&mut socket).await {
            SessionEnd::PeerClosed | SessionEnd::Reset => {
                tracing::info!(peer = %peer_addr, "Producer disconnected");
            }
            end => {
                tracing::warn!(peer = %peer_addr, reason = %end, "Producer session ended");
            }
        }
    }
}
