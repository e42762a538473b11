//! Ownership intervals on the hash circle

/// Sort key of a ring entry. Equal hashes are ordered by replica id,
/// so the lower id comes first clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RingPosition {
    pub hash: u32,
    pub replica_id: u32,
}

impl RingPosition {
    pub fn new(hash: u32, replica_id: u32) -> Self {
        Self { hash, replica_id }
    }
}

/// Whether hash `x` falls in the half-open arc `(predecessor, position]`.
///
/// A predecessor sorting after `position` means the arc wraps past zero.
/// Equal positions mean a single entry, which owns the whole circle.
/// An entry that shares its hash with an earlier entry owns nothing.
pub fn owns(x: u32, predecessor: RingPosition, position: RingPosition) -> bool {
    use std::cmp::Ordering;

    match predecessor.cmp(&position) {
        Ordering::Equal => true,
        Ordering::Less => predecessor.hash < x && x <= position.hash,
        Ordering::Greater => x > predecessor.hash || x <= position.hash,
    }
}
