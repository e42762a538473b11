//! Server Module
//!
//! Backend document servers: authoritative tables, LRU caches and
//! write-behind edit queues, plus the request/response records they
//! exchange with the load balancer.

mod document;
mod node;
pub mod protocol;
mod queue;

pub use document::{Document, PendingEdit};
pub use node::{lock, Server, SharedServer};
pub use protocol::{LogKind, Request, RequestOutcome, Response, ServerLog};
pub use queue::EditQueue;
