//! Consistent-Hashing Ring
//!
//! Routes document names to servers and reshapes ownership when servers
//! join or leave. Entries are kept sorted by `(ring_hash, replica_id)`;
//! a document belongs to the first entry whose hash is at or past the
//! document's hash, wrapping to the first entry.
//!
//! With three replicas per server, each virtual replica is first added
//! as an independent server so the single-replica migration computes
//! its interval, then the three are merged into one shared server.
//! Removal reverses this: the shared server is split per interval and
//! each part is removed on its own.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::hash::{DefaultRingHasher, RingHasher};
use super::interval::{owns, RingPosition};
use crate::config::DocRingConfig;
use crate::error::{Error, Result};
use crate::server::{lock, Request, RequestOutcome, Response, Server, SharedServer};

/// Offset between the virtual replica ids of one server
pub const REPLICA_ID_STRIDE: u32 = 100_000;

/// Number of ring positions per server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaMode {
    Single,
    Triple,
}

impl ReplicaMode {
    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            1 => Some(ReplicaMode::Single),
            3 => Some(ReplicaMode::Triple),
            _ => None,
        }
    }

    pub fn count(self) -> u32 {
        match self {
            ReplicaMode::Single => 1,
            ReplicaMode::Triple => 3,
        }
    }

    /// Replica ids of `server_id`, primary first
    pub fn replica_ids(self, server_id: u32) -> Vec<u32> {
        (0..self.count())
            .map(|i| i * REPLICA_ID_STRIDE + server_id)
            .collect()
    }
}

impl std::fmt::Display for ReplicaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaMode::Single => write!(f, "SINGLE"),
            ReplicaMode::Triple => write!(f, "TRIPLE"),
        }
    }
}

/// One position on the ring
#[derive(Debug, Clone)]
pub struct ReplicaEntry {
    replica_id: u32,
    ring_hash: u32,
    server: SharedServer,
}

impl ReplicaEntry {
    pub fn replica_id(&self) -> u32 {
        self.replica_id
    }

    pub fn ring_hash(&self) -> u32 {
        self.ring_hash
    }

    pub fn server(&self) -> &SharedServer {
        &self.server
    }

    /// Id of the server this replica belongs to
    pub fn logical_id(&self) -> u32 {
        self.replica_id % REPLICA_ID_STRIDE
    }

    pub fn position(&self) -> RingPosition {
        RingPosition::new(self.ring_hash, self.replica_id)
    }
}

/// Effects of a topology change
#[derive(Debug, Default)]
pub struct TopologyChange {
    /// Responses of edits drained before migration
    pub flushed: Vec<Response>,
    /// Documents moved between servers
    pub migrated: usize,
}

impl TopologyChange {
    fn merge(&mut self, other: TopologyChange) {
        self.flushed.extend(other.flushed);
        self.migrated += other.migrated;
    }
}

/// Consistent-hashing load balancer over shared servers
pub struct Ring<H = DefaultRingHasher> {
    /// Sorted by `(ring_hash, replica_id)`
    entries: Vec<ReplicaEntry>,
    mode: ReplicaMode,
    hasher: H,
    queue_capacity: usize,
}

impl Ring<DefaultRingHasher> {
    /// Create an empty ring with the default hash functions
    pub fn new(mode: ReplicaMode, queue_capacity: usize) -> Self {
        Self::with_hasher(mode, queue_capacity, DefaultRingHasher)
    }

    pub fn from_config(config: &DocRingConfig) -> Self {
        Self::new(config.replica_mode(), config.ring.queue_capacity)
    }
}

impl<H: RingHasher> Ring<H> {
    /// Create an empty ring with a custom hash strategy
    pub fn with_hasher(mode: ReplicaMode, queue_capacity: usize, hasher: H) -> Self {
        Self {
            entries: Vec::new(),
            mode,
            hasher,
            queue_capacity,
        }
    }

    pub fn mode(&self) -> ReplicaMode {
        self.mode
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn entries(&self) -> &[ReplicaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry owning `doc_name`
    pub fn route(&self, doc_name: &str) -> Option<&ReplicaEntry> {
        self.route_hash(self.hasher.hash_document(doc_name))
    }

    /// Entry owning the ring position `hash`
    pub fn route_hash(&self, hash: u32) -> Option<&ReplicaEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self.entries.partition_point(|entry| entry.ring_hash < hash);
        self.entries.get(idx).or_else(|| self.entries.first())
    }

    /// Route a request and let the owning server handle it
    pub fn forward(&self, request: Request) -> Result<RequestOutcome> {
        let entry = self.route(request.doc_name()).ok_or(Error::EmptyRing)?;

        tracing::debug!(
            doc = request.doc_name(),
            replica = entry.replica_id,
            "Forwarding request"
        );

        let outcome = lock(&entry.server).handle(request)?;
        Ok(outcome.served_by(entry.replica_id))
    }

    /// Check whether `server_id` currently has entries on the ring
    pub fn contains_server(&self, server_id: u32) -> bool {
        self.logical_id_of(server_id)
            .map(|logical| self.entries.iter().any(|entry| entry.logical_id() == logical))
            .unwrap_or(false)
    }

    /// Logical server named by `server_id`. Virtual ids only name a
    /// server when the ring places more than one replica per server.
    fn logical_id_of(&self, server_id: u32) -> Option<u32> {
        (server_id < self.mode.count() * REPLICA_ID_STRIDE).then(|| server_id % REPLICA_ID_STRIDE)
    }

    /// Add a server with `cache_capacity` cached documents
    pub fn add_server(
        &mut self,
        server_id: u32,
        cache_capacity: usize,
    ) -> Result<TopologyChange> {
        if server_id >= REPLICA_ID_STRIDE {
            return Err(Error::InvalidServerId {
                id: server_id,
                max: REPLICA_ID_STRIDE,
            });
        }
        if cache_capacity == 0 {
            return Err(Error::InvalidCacheCapacity(cache_capacity));
        }
        if self.contains_server(server_id) {
            return Err(Error::ServerExists(server_id));
        }

        let replica_ids = self.mode.replica_ids(server_id);
        let mut change = TopologyChange::default();
        let mut replicas = Vec::with_capacity(replica_ids.len());
        for &replica_id in &replica_ids {
            let (server, step) = self.add_replica(replica_id, cache_capacity)?;
            change.merge(step);
            replicas.push((replica_id, server));
        }

        // Alias the virtual replicas to the primary's server
        if let Some(((_, primary), rest)) = replicas.split_first() {
            for (replica_id, replica) in rest {
                let documents = lock(replica).take_documents();
                {
                    let mut target = lock(primary);
                    for doc in documents {
                        target.add_document(doc);
                    }
                }
                if let Some(pos) = self.position_of(*replica_id) {
                    self.entries[pos].server = Arc::clone(primary);
                }
            }
        }

        tracing::info!(
            server = server_id,
            replicas = replica_ids.len(),
            migrated = change.migrated,
            flushed = change.flushed.len(),
            "Server added"
        );

        Ok(change)
    }

    /// Remove a server and hand its documents to its ring successors.
    ///
    /// In triple mode any of the server's replica ids names it. The last
    /// server cannot leave while it still holds committed or queued
    /// documents, since nothing would be left to receive them; that case
    /// returns [`Error::LastServer`] and leaves the ring untouched.
    pub fn remove_server(&mut self, server_id: u32) -> Result<TopologyChange> {
        let logical = self
            .logical_id_of(server_id)
            .ok_or(Error::ServerNotFound(server_id))?;
        let replica_ids = self.mode.replica_ids(logical);
        if replica_ids.iter().any(|&id| self.position_of(id).is_none()) {
            return Err(Error::ServerNotFound(server_id));
        }

        if self.entries.iter().all(|entry| entry.logical_id() == logical) {
            let documents = self
                .entries
                .first()
                .map(|entry| lock(&entry.server).owned_document_count())
                .unwrap_or(0);
            if documents > 0 {
                tracing::warn!(server = logical, documents, "Refusing to remove last server");
                return Err(Error::LastServer {
                    server_id: logical,
                    documents,
                });
            }
        }

        let change = match self.mode {
            ReplicaMode::Single => self.remove_replica(logical)?,
            ReplicaMode::Triple => self.remove_replicated(logical, &replica_ids)?,
        };

        tracing::info!(
            server = logical,
            migrated = change.migrated,
            flushed = change.flushed.len(),
            "Server removed"
        );

        Ok(change)
    }

    /// Split a shared server into one server per interval, then remove
    /// each replica on its own
    fn remove_replicated(&mut self, logical: u32, replica_ids: &[u32]) -> Result<TopologyChange> {
        let mut change = TopologyChange::default();

        let shared = match self.position_of(logical) {
            Some(pos) => Arc::clone(&self.entries[pos].server),
            None => return Err(Error::ServerNotFound(logical)),
        };
        let (documents, cache_capacity) = {
            let mut server = lock(&shared);
            change.flushed = stamp(server.drain_queue(), logical);
            (server.take_documents(), server.cache_capacity())
        };

        let mut parts: HashMap<u32, SharedServer> = HashMap::with_capacity(replica_ids.len());
        for &replica_id in replica_ids {
            let pos = self
                .position_of(replica_id)
                .ok_or(Error::ServerNotFound(replica_id))?;
            let entry = &mut self.entries[pos];
            let part = Server::new(replica_id, cache_capacity, self.queue_capacity)?
                .into_shared();
            entry.server = Arc::clone(&part);
            parts.insert(replica_id, part);
        }

        for doc in documents {
            let owner = self
                .route(doc.name())
                .map(|entry| entry.replica_id)
                .filter(|id| parts.contains_key(id))
                .unwrap_or(logical);
            if let Some(part) = parts.get(&owner) {
                lock(part).add_document(doc);
            }
        }

        for &replica_id in replica_ids {
            change.merge(self.remove_replica(replica_id)?);
        }

        Ok(change)
    }

    /// Insert one independent replica and pull the documents of its new
    /// interval from its successor
    fn add_replica(
        &mut self,
        replica_id: u32,
        cache_capacity: usize,
    ) -> Result<(SharedServer, TopologyChange)> {
        let ring_hash = self.hasher.hash_server(replica_id);
        let server = Server::new(replica_id, cache_capacity, self.queue_capacity)?
            .into_shared();
        let pos = self.insert_entry(ReplicaEntry {
            replica_id,
            ring_hash,
            server: Arc::clone(&server),
        });

        let mut change = TopologyChange::default();
        let len = self.entries.len();
        if len == 1 {
            return Ok((server, change));
        }

        let successor = self.entries[(pos + 1) % len].clone();
        let predecessor = self.entries[(pos + len - 1) % len].position();
        let position = self.entries[pos].position();

        let mut source = lock(&successor.server);
        change.flushed = stamp(source.drain_queue(), successor.replica_id);

        let moving: Vec<String> = source
            .documents()
            .filter(|doc| owns(self.hasher.hash_document(doc.name()), predecessor, position))
            .map(|doc| doc.name().to_string())
            .collect();

        let mut target = lock(&server);
        for name in &moving {
            if let Some(doc) = source.remove_document(name) {
                target.add_document(doc);
                change.migrated += 1;
            }
        }
        drop(target);
        drop(source);

        tracing::debug!(
            replica = replica_id,
            hash = ring_hash,
            from = successor.replica_id,
            migrated = change.migrated,
            "Replica inserted"
        );

        Ok((server, change))
    }

    /// Remove one entry, moving its whole table to the next entry
    fn remove_replica(&mut self, replica_id: u32) -> Result<TopologyChange> {
        let pos = self
            .position_of(replica_id)
            .ok_or(Error::ServerNotFound(replica_id))?;
        let source = self.entries[pos].clone();
        let len = self.entries.len();

        if len == 1 {
            let documents = lock(&source.server).owned_document_count();
            if documents > 0 {
                return Err(Error::LastServer {
                    server_id: source.logical_id(),
                    documents,
                });
            }
            self.entries.remove(pos);
            return Ok(TopologyChange::default());
        }

        let mut change = TopologyChange::default();
        let destination = self.entries[(pos + 1) % len].clone();

        let documents = {
            let mut server = lock(&source.server);
            change.flushed = stamp(server.drain_queue(), replica_id);
            if Arc::ptr_eq(&source.server, &destination.server) {
                Vec::new()
            } else {
                server.take_documents()
            }
        };

        if !documents.is_empty() {
            let mut target = lock(&destination.server);
            for doc in documents {
                target.add_document(doc);
                change.migrated += 1;
            }
        }

        self.entries.remove(pos);

        tracing::debug!(
            replica = replica_id,
            to = destination.replica_id,
            migrated = change.migrated,
            "Replica removed"
        );

        Ok(change)
    }

    fn position_of(&self, replica_id: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.replica_id == replica_id)
    }

    fn insert_entry(&mut self, entry: ReplicaEntry) -> usize {
        let key = entry.position();
        let pos = self.entries.partition_point(|existing| existing.position() < key);
        self.entries.insert(pos, entry);
        pos
    }

    /// Each server once, in ring order of its first entry
    pub fn distinct_servers(&self) -> Vec<(u32, SharedServer)> {
        let mut visited = HashSet::with_capacity(self.entries.len());
        self.entries
            .iter()
            .filter(|entry| visited.insert(entry.logical_id()))
            .map(|entry| (entry.logical_id(), Arc::clone(&entry.server)))
            .collect()
    }

    /// Apply every pending edit on every server
    pub fn drain_all(&self) -> Vec<Response> {
        let mut flushed = Vec::new();
        for (id, server) in self.distinct_servers() {
            flushed.extend(stamp(lock(&server).drain_queue(), id));
        }
        flushed
    }

    /// Drain every server and empty the ring
    pub fn shutdown(&mut self) -> Vec<Response> {
        let flushed = self.drain_all();
        self.entries.clear();
        tracing::info!(flushed = flushed.len(), "Ring shut down");
        flushed
    }

    /// Committed `(name, content)` pairs across all servers, sorted
    pub fn document_snapshot(&self) -> Vec<(String, String)> {
        let mut snapshot: Vec<(String, String)> = self
            .distinct_servers()
            .iter()
            .flat_map(|(_, server)| {
                lock(server)
                    .documents()
                    .map(|doc| (doc.name().to_string(), doc.content().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect();
        snapshot.sort();
        snapshot
    }

    pub fn document_count(&self) -> usize {
        self.distinct_servers()
            .iter()
            .map(|(_, server)| lock(server).document_count())
            .sum()
    }

    pub fn pending_edits(&self) -> usize {
        self.distinct_servers()
            .iter()
            .map(|(_, server)| lock(server).pending_edits())
            .sum()
    }
}

fn stamp(responses: Vec<Response>, serving_id: u32) -> Vec<Response> {
    responses
        .into_iter()
        .map(|response| response.served_by(serving_id))
        .collect()
}
