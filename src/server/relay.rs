//! Relay orchestrator
//!
//! Binds both endpoints, then drives the producer ingest loop and the
//! subscriber accept loop side by side.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::producer::ProducerListener;
use crate::registry::SubscriberRegistry;
use crate::server::config::RelayConfig;
use crate::stats::RelayStats;
use crate::subscriber::SubscriberListener;

/// TCP to WebSocket relay
pub struct Relay {
    producer: ProducerListener,
    subscribers: SubscriberListener,
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
    stats_interval: Duration,
}

impl Relay {
    /// Bind both endpoints
    ///
    /// Fails if either endpoint cannot be bound; nothing keeps running in
    /// that case.
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        let registry = Arc::new(SubscriberRegistry::new());
        let stats = Arc::new(RelayStats::new());

        let producer =
            ProducerListener::bind(config.clone(), Arc::clone(&registry), Arc::clone(&stats))
                .await?;
        let subscribers =
            SubscriberListener::bind(config.clone(), Arc::clone(&registry), Arc::clone(&stats))
                .await?;

        Ok(Self {
            producer,
            subscribers,
            registry,
            stats,
            stats_interval: config.stats_interval,
        })
    }

    /// Bound address of the producer endpoint
    pub fn producer_addr(&self) -> SocketAddr {
        self.producer.local_addr()
    }

    /// Bound address of the subscriber endpoint
    pub fn subscriber_addr(&self) -> SocketAddr {
        self.subscribers.local_addr()
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Get a reference to the relay counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Run the relay
    ///
    /// Both loops run until the process exits.
    pub async fn run(&self) -> Result<()> {
        let _stats_task = self.spawn_stats_task();

        tokio::try_join!(self.producer.run(), self.subscribers.run())?;
        Ok(())
    }

    /// Run the relay until `shutdown` resolves
    ///
    /// Open connections are dropped, not drained.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.run() => result,
        }
    }

    fn spawn_stats_task(&self) -> Option<AbortOnDrop> {
        if self.stats_interval.is_zero() {
            return None;
        }

        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);
        let interval = self.stats_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snap = stats.snapshot();
                tracing::info!(
                    subscribers = registry.len(),
                    producer_sessions = snap.producer_sessions,
                    messages = snap.messages_received,
                    bytes = snap.bytes_received,
                    deliveries = snap.deliveries,
                    dropped = snap.subscribers_dropped,
                    handshake_failures = snap.handshake_failures,
                    "Relay stats"
                );
            }
        });

        Some(AbortOnDrop(handle))
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
