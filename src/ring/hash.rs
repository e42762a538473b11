//! Ring hash strategies
//!
//! Server ids and document names are hashed by independent functions
//! onto the same 32-bit circle.

/// Hash strategy injected into a [`Ring`](super::Ring)
pub trait RingHasher: Send + Sync {
    /// Ring position of a (possibly virtual) server id
    fn hash_server(&self, server_id: u32) -> u32;

    /// Ring position of a document name
    fn hash_document(&self, name: &str) -> u32;
}

/// Integer mixer for server ids and djb2 for document names
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRingHasher;

impl RingHasher for DefaultRingHasher {
    fn hash_server(&self, server_id: u32) -> u32 {
        hash_server_id(server_id)
    }

    fn hash_document(&self, name: &str) -> u32 {
        hash_document_name(name)
    }
}

/// Avalanche mix of a 32-bit id
pub fn hash_server_id(id: u32) -> u32 {
    let mut x = id;
    x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
    (x >> 16) ^ x
}

/// djb2 over the bytes of `name`
pub fn hash_document_name(name: &str) -> u32 {
    name.bytes()
        .fold(5381u32, |hash, byte| {
            (hash << 5).wrapping_add(hash).wrapping_add(byte as u32)
        })
}
