//! A single producer connection
//!
//! Reads the producer's bytes, decodes them into messages and broadcasts
//! each one to the registry in the order it was read.

use std::io;
use std::net::SocketAddr;
use std::str::Utf8Error;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::registry::{Payload, SubscriberRegistry};
use crate::stats::RelayStats;

use super::decoder::{FramingMode, MessageDecoder};

/// Why a producer session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Zero-length read, the producer closed its side
    PeerClosed,
    /// The connection was reset or aborted
    Reset,
    /// The bytes were not valid UTF-8
    InvalidUtf8(Utf8Error),
    /// Any other read error
    Io(io::Error),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEnd::PeerClosed => write!(f, "peer closed"),
            SessionEnd::Reset => write!(f, "connection reset"),
            SessionEnd::InvalidUtf8(e) => write!(f, "invalid UTF-8: {}", e),
            SessionEnd::Io(e) => write!(f, "read error: {}", e),
        }
    }
}

/// Read loop for one producer connection
pub struct ProducerSession {
    peer_addr: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
    decoder: MessageDecoder,
    read_buffer_size: usize,
}

impl ProducerSession {
    pub fn new(
        peer_addr: SocketAddr,
        registry: Arc<SubscriberRegistry>,
        stats: Arc<RelayStats>,
        framing: FramingMode,
        max_line_length: usize,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            peer_addr,
            registry,
            stats,
            decoder: MessageDecoder::new(framing, max_line_length),
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Serve the connection until it ends, then shut it down
    pub async fn run<S>(&mut self, stream: &mut S) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let end = self.read_loop(stream).await;

        if let Err(e) = stream.shutdown().await {
            tracing::debug!(peer = %self.peer_addr, error = %e, "Producer shutdown failed");
        }

        end
    }

    async fn read_loop<S>(&mut self, stream: &mut S) -> SessionEnd
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) => {
                    return match self.decoder.finish() {
                        Ok(Some(tail)) => {
                            self.publish(tail);
                            SessionEnd::PeerClosed
                        }
                        Ok(None) => SessionEnd::PeerClosed,
                        Err(e) => SessionEnd::InvalidUtf8(e),
                    };
                }
                Ok(n) => n,
                Err(e) if is_reset(&e) => return SessionEnd::Reset,
                Err(e) => return SessionEnd::Io(e),
            };

            self.stats.record_bytes(n);

            match self.decoder.decode(&buf[..n]) {
                Ok(messages) => {
                    for msg in messages {
                        self.publish(msg);
                    }
                }
                Err(e) => {
                    // Lines completed before the bad bytes still go out
                    for msg in e.decoded {
                        self.publish(msg);
                    }
                    return SessionEnd::InvalidUtf8(e.source);
                }
            }
        }
    }

    fn publish(&self, msg: Payload) {
        let report = self.registry.broadcast(&msg);
        self.stats.record_broadcast(report.delivered, report.removed);

        tracing::debug!(
            peer = %self.peer_addr,
            len = msg.len(),
            delivered = report.delivered,
            removed = report.removed,
            "Broadcast message"
        );
    }
}

fn is_reset(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}
