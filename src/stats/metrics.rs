//! Relay-wide counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the producer and subscriber loops
#[derive(Debug, Default)]
pub struct RelayStats {
    producer_sessions: AtomicU64,
    messages_received: AtomicU64,
    bytes_received: AtomicU64,
    deliveries: AtomicU64,
    subscribers_accepted: AtomicU64,
    subscribers_dropped: AtomicU64,
    handshake_failures: AtomicU64,
}

/// Plain copy of [`RelayStats`] at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Producer connections accepted
    pub producer_sessions: u64,
    /// Non-empty messages broadcast
    pub messages_received: u64,
    /// Raw bytes read from producers
    pub bytes_received: u64,
    /// Successful per-subscriber deliveries
    pub deliveries: u64,
    /// Subscribers that completed the handshake
    pub subscribers_accepted: u64,
    /// Subscribers removed by a failed delivery
    pub subscribers_dropped: u64,
    /// Connections that never completed the handshake
    pub handshake_failures: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_producer_session(&self) {
        self.producer_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record one broadcast and its fan-out result
    pub fn record_broadcast(&self, delivered: usize, removed: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.subscribers_dropped
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn record_subscriber(&self) {
        self.subscribers_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handshake_failure(&self) {
        self.handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            producer_sessions: self.producer_sessions.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            subscribers_accepted: self.subscribers_accepted.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            handshake_failures: self.handshake_failures.load(Ordering::Relaxed),
        }
    }
}
