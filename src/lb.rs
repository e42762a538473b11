//! Load Balancer Module
//!
//! Async facade over the ring. Requests share a read lock so they run in
//! parallel against different servers; topology changes take the write
//! lock so routing never observes a half-built or half-split ring.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::config::DocRingConfig;
use crate::error::Result;
use crate::ring::{DefaultRingHasher, ReplicaMode, Ring, RingHasher, TopologyChange};
use crate::server::{lock, Request, RequestOutcome, Response};

/// Load balancer distributing document requests across ring servers
pub struct LoadBalancer<H = DefaultRingHasher> {
    /// Ring of replica entries
    ring: RwLock<Ring<H>>,
    /// Requests successfully routed to a server
    requests_routed: AtomicUsize,
}

impl LoadBalancer<DefaultRingHasher> {
    /// Create a load balancer with an empty ring
    pub fn new(mode: ReplicaMode, queue_capacity: usize) -> Self {
        Self::with_ring(Ring::new(mode, queue_capacity))
    }

    pub fn from_config(config: &DocRingConfig) -> Self {
        Self::with_ring(Ring::from_config(config))
    }
}

impl<H: RingHasher> LoadBalancer<H> {
    /// Wrap an existing ring
    pub fn with_ring(ring: Ring<H>) -> Self {
        Self {
            ring: RwLock::new(ring),
            requests_routed: AtomicUsize::new(0),
        }
    }

    pub async fn mode(&self) -> ReplicaMode {
        self.ring.read().await.mode()
    }

    /// Add a server to the ring
    pub async fn add_server(
        &self,
        server_id: u32,
        cache_capacity: usize,
    ) -> Result<TopologyChange> {
        let mut ring = self.ring.write().await;
        ring.add_server(server_id, cache_capacity).map_err(|e| {
            tracing::warn!(server = server_id, error = %e, "Add server rejected");
            e
        })
    }

    /// Remove a server from the ring. The last server holding documents
    /// is refused with [`Error::LastServer`](crate::error::Error::LastServer).
    pub async fn remove_server(&self, server_id: u32) -> Result<TopologyChange> {
        let mut ring = self.ring.write().await;
        ring.remove_server(server_id).map_err(|e| {
            tracing::warn!(server = server_id, error = %e, "Remove server rejected");
            e
        })
    }

    /// Route a request to the server owning its document
    pub async fn forward(&self, request: Request) -> Result<RequestOutcome> {
        let ring = self.ring.read().await;
        let outcome = ring.forward(request)?;
        self.requests_routed.fetch_add(1, Ordering::Relaxed);
        Ok(outcome)
    }

    /// Queue an edit; only the acknowledgement is returned
    pub async fn edit(&self, name: &str, content: &str) -> Result<Response> {
        Ok(self.forward(Request::edit(name, content)).await?.response)
    }

    /// Read a document, draining its server's queue first
    pub async fn get(&self, name: &str) -> Result<RequestOutcome> {
        self.forward(Request::get(name)).await
    }

    /// Committed `(name, content)` pairs across all servers
    pub async fn document_snapshot(&self) -> Vec<(String, String)> {
        self.ring.read().await.document_snapshot()
    }

    /// Get stats about the load balancer state
    pub async fn stats(&self) -> LoadBalancerStats {
        let ring = self.ring.read().await;
        let servers = ring.distinct_servers();

        let (document_count, pending_edits) =
            servers.iter().fold((0, 0), |(docs, pending), (_, server)| {
                let server = lock(server);
                (docs + server.document_count(), pending + server.pending_edits())
            });

        LoadBalancerStats {
            mode: ring.mode(),
            server_count: servers.len(),
            replica_count: ring.len(),
            document_count,
            pending_edits,
            requests_routed: self.requests_routed.load(Ordering::Relaxed),
        }
    }

    /// Apply all pending edits without changing the topology
    pub async fn flush(&self) -> Vec<Response> {
        self.ring.read().await.drain_all()
    }

    /// Apply all pending edits and release every server
    pub async fn shutdown(&self) -> Vec<Response> {
        self.ring.write().await.shutdown()
    }
}

/// Statistics about load balancer state
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LoadBalancerStats {
    /// Virtual replicas per server
    pub mode: ReplicaMode,
    /// Distinct servers on the ring
    pub server_count: usize,
    /// Ring entries, virtual replicas included
    pub replica_count: usize,
    /// Committed documents across all servers
    pub document_count: usize,
    /// Edits accepted but not yet applied
    pub pending_edits: usize,
    /// Requests routed since startup
    pub requests_routed: usize,
}

impl std::fmt::Display for LoadBalancerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "servers={} replicas={} mode={} documents={} pending={} routed={}",
            self.server_count,
            self.replica_count,
            self.mode,
            self.document_count,
            self.pending_edits,
            self.requests_routed
        )
    }
}
