//! DocRing - Consistent-Hashing Document Load Balancer
//!
//! Routes document EDIT and GET requests across a dynamic set of
//! in-process servers placed on a 32-bit hash ring.
//!
//! # Architecture
//!
//! Each server keeps an authoritative document table, an LRU cache over
//! it and a bounded write-behind queue. Edits are acknowledged at once and
//! applied on the server's next GET or topology change. Adding or removing
//! a server drains the affected queue and migrates only the documents
//! whose ring interval changed hands.
//!
//! # Features
//!
//! - Pluggable hash strategy with deterministic defaults
//! - Optional three virtual replicas per server sharing one store
//! - Cache HIT / MISS / EVICT / FAULT logging on every response
//! - Async facade safe for concurrent requests and topology changes
//! - Script-driven command front end with text or JSON output

pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod lb;
pub mod ring;
pub mod server;

pub use config::DocRingConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::DocRingConfig;
    pub use crate::error::{Error, Result};
    pub use crate::lb::{LoadBalancer, LoadBalancerStats};
    pub use crate::ring::{ReplicaMode, Ring, RingHasher, TopologyChange};
    pub use crate::server::{LogKind, Request, RequestOutcome, Response};
}
