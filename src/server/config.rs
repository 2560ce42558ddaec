//! Relay configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::producer::decoder::{FramingMode, DEFAULT_MAX_LINE_LENGTH};

/// Default producer (raw TCP) port
pub const DEFAULT_PRODUCER_PORT: u16 = 5050;

/// Default subscriber (WebSocket) port
pub const DEFAULT_SUBSCRIBER_PORT: u16 = 5005;

/// Default size of a single producer read
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default depth of each subscriber's outbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interface both endpoints bind to
    pub host: IpAddr,

    /// Port of the raw TCP producer endpoint
    pub producer_port: u16,

    /// Port of the WebSocket subscriber endpoint
    pub subscriber_port: u16,

    /// Upper bound on a single producer read
    pub read_buffer_size: usize,

    /// How producer bytes are cut into messages
    pub framing: FramingMode,

    /// Longest buffered line before it is flushed (line framing only)
    pub max_line_length: usize,

    /// Payloads a subscriber may have queued before it is dropped
    pub subscriber_queue_capacity: usize,

    /// WebSocket handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Enable TCP_NODELAY on accepted sockets
    pub tcp_nodelay: bool,

    /// Stats log interval (zero disables)
    pub stats_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            producer_port: DEFAULT_PRODUCER_PORT,
            subscriber_port: DEFAULT_SUBSCRIBER_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            framing: FramingMode::Chunk,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            subscriber_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
            stats_interval: Duration::ZERO,
        }
    }
}

impl RelayConfig {
    /// Address of the producer endpoint
    pub fn producer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.producer_port)
    }

    /// Address of the subscriber endpoint
    pub fn subscriber_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.subscriber_port)
    }

    /// Set the bind interface
    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Set the producer port
    pub fn producer_port(mut self, port: u16) -> Self {
        self.producer_port = port;
        self
    }

    /// Set the subscriber port
    pub fn subscriber_port(mut self, port: u16) -> Self {
        self.subscriber_port = port;
        self
    }

    /// Set the producer read size (at least one byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the framing mode
    pub fn framing(mut self, framing: FramingMode) -> Self {
        self.framing = framing;
        self
    }

    /// Set the maximum buffered line length
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len.max(1);
        self
    }

    /// Set the subscriber queue capacity (at least one payload)
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity.max(1);
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY on accepted sockets
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the stats log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}
