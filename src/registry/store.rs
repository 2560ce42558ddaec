//! Subscriber registry implementation
//!
//! The single piece of shared mutable state in the relay. Every operation
//! takes the lock for one map mutation or one copy and then releases it;
//! no lock is ever held across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::subscriber::{Payload, SubscriberHandle, SubscriberId};

/// Outcome of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members the payload was handed to
    pub delivered: usize,
    /// Members removed because delivery failed
    pub removed: usize,
}

/// Concurrent set of live subscribers
pub struct SubscriberRegistry {
    members: RwLock<HashMap<SubscriberId, SubscriberHandle>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
        }
    }

    /// Add a subscriber
    ///
    /// Returns `false` if a subscriber with the same id is already present;
    /// the existing entry is kept.
    pub fn register(&self, handle: SubscriberHandle) -> bool {
        let mut members = self.members.write();

        if members.contains_key(&handle.id()) {
            return false;
        }

        let id = handle.id();
        let peer = handle.peer_addr();
        members.insert(id, handle);
        let count = members.len();
        drop(members);

        tracing::info!(subscriber = %id, peer = %peer, subscribers = count, "Subscriber registered");
        true
    }

    /// Add a subscriber for the lifetime of the returned guard
    ///
    /// Returns `None` if the id is already registered. The existing entry is
    /// left alone and no guard is handed out for it.
    pub fn register_guarded(self: &Arc<Self>, handle: SubscriberHandle) -> Option<Registration> {
        let id = handle.id();
        if !self.register(handle) {
            return None;
        }

        Some(Registration {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Remove a subscriber and signal its connection task to stop
    ///
    /// Removing an id that is not present is a no-op and returns `None`.
    pub fn unregister(&self, id: SubscriberId) -> Option<SubscriberHandle> {
        let mut members = self.members.write();
        let removed = members.remove(&id);
        let count = members.len();
        drop(members);

        if let Some(handle) = &removed {
            handle.evict();
            tracing::info!(subscriber = %id, subscribers = count, "Subscriber unregistered");
        }

        removed
    }

    /// Point-in-time copy of the current members
    pub fn snapshot(&self) -> Vec<SubscriberHandle> {
        self.members.read().values().cloned().collect()
    }

    /// Deliver a payload to every member of a snapshot
    ///
    /// Members whose delivery fails are unregistered; the remaining members
    /// still receive the payload. Subscribers registered after the snapshot
    /// is taken may or may not see this payload.
    pub fn broadcast(&self, payload: &Payload) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for member in self.snapshot() {
            match member.try_deliver(payload) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        subscriber = %member.id(),
                        peer = %member.peer_addr(),
                        error = %e,
                        "Delivery failed, removing subscriber"
                    );
                    if self.unregister(member.id()).is_some() {
                        report.removed += 1;
                    }
                }
            }
        }

        report
    }

    /// Check whether a subscriber is registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members.read().contains_key(&id)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope guard returned by [`SubscriberRegistry::register_guarded`]
///
/// Unregisters the subscriber when dropped. Safe to drop after the entry has
/// already been removed by a failed broadcast.
pub struct Registration {
    registry: Arc<SubscriberRegistry>,
    id: SubscriberId,
}

impl Registration {
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use super::*;
    use crate::registry::SubscriberQueue;

    fn handle(id: u64) -> (SubscriberHandle, SubscriberQueue) {
        let addr: SocketAddr = format!("127.0.0.1:{}", 40000 + id).parse().unwrap();
        SubscriberHandle::new(SubscriberId(id), addr, 8)
    }

    #[test]
    fn test_register_unregister() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());

        let (h, _rx) = handle(1);
        assert!(registry.register(h));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(SubscriberId(1)));

        assert!(registry.unregister(SubscriberId(1)).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_twice_keeps_one_entry() {
        let registry = SubscriberRegistry::new();
        let (h, _rx) = handle(1);

        assert!(registry.register(h.clone()));
        assert!(!registry.register(h));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_twice_is_noop() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = handle(1);
        let (b, _rx_b) = handle(2);
        registry.register(a);
        registry.register(b);

        assert!(registry.unregister(SubscriberId(1)).is_some());
        assert!(registry.unregister(SubscriberId(1)).is_none());

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(SubscriberId(1)));
        assert!(registry.contains(SubscriberId(2)));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_members() {
        let registry = SubscriberRegistry::new();
        let mut queues = Vec::new();
        for id in 1..=3 {
            let (h, rx) = handle(id);
            registry.register(h);
            queues.push(rx);
        }

        let report = registry.broadcast(&Payload::from("temp=21.5"));
        assert_eq!(report.delivered, 3);
        assert_eq!(report.removed, 0);

        for rx in &mut queues {
            assert_eq!(rx.recv().await.unwrap().as_str(), "temp=21.5");
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_broadcast_preserves_order() {
        let registry = SubscriberRegistry::new();
        let (h, mut rx) = handle(1);
        registry.register(h);

        registry.broadcast(&Payload::from("m1"));
        registry.broadcast(&Payload::from("m2"));

        assert_eq!(rx.recv().await.unwrap().as_str(), "m1");
        assert_eq!(rx.recv().await.unwrap().as_str(), "m2");
    }

    #[tokio::test]
    async fn test_broadcast_isolates_broken_member() {
        let registry = SubscriberRegistry::new();
        let (a, mut rx_a) = handle(1);
        let (b, rx_b) = handle(2);
        let (c, mut rx_c) = handle(3);
        registry.register(a);
        registry.register(b);
        registry.register(c);

        // Subscriber 2's connection task is gone
        drop(rx_b);

        let report = registry.broadcast(&Payload::from("hello"));
        assert_eq!(report.delivered, 2);
        assert_eq!(report.removed, 1);

        assert_eq!(rx_a.recv().await.unwrap().as_str(), "hello");
        assert_eq!(rx_c.recv().await.unwrap().as_str(), "hello");
        assert!(!registry.contains(SubscriberId(2)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_broadcast_drops_stalled_member() {
        let registry = SubscriberRegistry::new();
        let addr: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        let (slow, _rx_slow) = SubscriberHandle::new(SubscriberId(1), addr, 1);
        let (fast, mut rx_fast) = handle(2);
        registry.register(slow);
        registry.register(fast);

        registry.broadcast(&Payload::from("one"));
        let _ = rx_fast.try_recv();
        let report = registry.broadcast(&Payload::from("two"));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.removed, 1);
        assert!(!registry.contains(SubscriberId(1)));
        assert_eq!(rx_fast.try_recv().unwrap().as_str(), "two");
    }

    #[test]
    fn test_broadcast_empty_registry() {
        let registry = SubscriberRegistry::new();
        let report = registry.broadcast(&Payload::from("nobody"));
        assert_eq!(report, BroadcastReport::default());
    }

    #[test]
    fn test_registration_guard_unregisters_on_drop() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (h, _rx) = handle(1);

        let guard = registry.register_guarded(h).unwrap();
        assert_eq!(guard.id(), SubscriberId(1));
        assert_eq!(registry.len(), 1);

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_guard_after_broadcast_removal() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (a, rx_a) = handle(1);
        let (b, _rx_b) = handle(2);

        let guard = registry.register_guarded(a).unwrap();
        registry.register(b);

        drop(rx_a);
        let report = registry.broadcast(&Payload::from("x"));
        assert_eq!(report.removed, 1);

        // Second removal path races the first; count must not change again
        drop(guard);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(SubscriberId(2)));
    }

    #[test]
    fn test_registration_guard_refused_for_duplicate_id() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (first, _rx_first) = handle(1);
        let (second, _rx_second) = handle(1);

        let guard = registry.register_guarded(first).unwrap();
        assert!(registry.register_guarded(second).is_none());
        assert_eq!(registry.len(), 1);

        // The refused registration must not have taken the live entry with it
        assert!(registry.contains(SubscriberId(1)));
        drop(guard);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_member_is_signalled_on_removal() {
        let registry = SubscriberRegistry::new();
        let addr: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        let (slow, rx_slow) = SubscriberHandle::new(SubscriberId(1), addr, 1);
        registry.register(slow);

        registry.broadcast(&Payload::from("one"));
        let report = registry.broadcast(&Payload::from("two"));
        assert_eq!(report.removed, 1);

        let evicted = rx_slow.eviction();
        tokio::time::timeout(Duration::from_secs(1), evicted.notified())
            .await
            .expect("removed member was not signalled");
    }

    #[test]
    fn test_concurrent_register_and_broadcast() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut threads = Vec::new();

        for t in 0..4u64 {
            let registry = Arc::clone(&registry);
            threads.push(std::thread::spawn(move || {
                let mut queues = Vec::new();
                for i in 0..50u64 {
                    let id = SubscriberId(t * 1000 + i);
                    let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
                    // Room for every broadcast across all threads
                    let (h, rx) = SubscriberHandle::new(id, addr, 256);
                    registry.register(h);
                    queues.push(rx);
                    registry.broadcast(&Payload::from("tick"));
                }
                queues
            }));
        }

        let queues: Vec<_> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        assert_eq!(registry.len(), queues.len());
    }
}
