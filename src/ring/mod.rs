//! Consistent-hashing ring and its hash strategies

mod hash;
mod hash_ring;
mod interval;

pub use hash::{hash_document_name, hash_server_id, DefaultRingHasher, RingHasher};
pub use hash_ring::{ReplicaEntry, ReplicaMode, Ring, TopologyChange, REPLICA_ID_STRIDE};
pub use interval::{owns, RingPosition};
