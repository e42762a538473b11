//! Cache Module
//!
//! Bounded recency tracking used by every server to accelerate reads.

mod lru;

pub use lru::RecencyIndex;
