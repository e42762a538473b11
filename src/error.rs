//! DocRing Error Types

use thiserror::Error;

/// Result type alias for DocRing operations
pub type Result<T> = std::result::Result<T, Error>;

/// DocRing error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Topology errors
    #[error("Server not found: {0}")]
    ServerNotFound(u32),

    #[error("Server already on the ring: {0}")]
    ServerExists(u32),

    #[error("Invalid server id {id}: must be below {max}")]
    InvalidServerId { id: u32, max: u32 },

    #[error("Invalid cache capacity: {0}")]
    InvalidCacheCapacity(usize),

    #[error("Refusing to remove last server {server_id}: it holds {documents} documents")]
    LastServer { server_id: u32, documents: usize },

    // Request errors
    #[error("No servers on the ring")]
    EmptyRing,

    #[error("Edit queue full on server {server_id} (capacity {capacity})")]
    QueueFull { server_id: u32, capacity: usize },

    // Front-end errors
    #[error("Invalid command at line {line}: {reason}")]
    Command { line: usize, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if the same request can succeed when issued again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::QueueFull { .. } | Error::EmptyRing)
    }

    /// Check if this error was caused by a topology command
    pub fn is_topology_error(&self) -> bool {
        matches!(
            self,
            Error::ServerNotFound(_)
                | Error::ServerExists(_)
                | Error::InvalidServerId { .. }
                | Error::InvalidCacheCapacity(_)
                | Error::LastServer { .. }
        )
    }
}
