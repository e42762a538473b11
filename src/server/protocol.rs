//! Request/Response Protocol
//!
//! Records exchanged between the load balancer and its servers.

use serde::{Deserialize, Serialize};

/// Client request routed by document name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Replace a document's content (applied lazily)
    Edit { name: String, content: String },

    /// Read a document's content
    Get { name: String },
}

impl Request {
    pub fn edit(name: impl Into<String>, content: impl Into<String>) -> Self {
        Request::Edit {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn get(name: impl Into<String>) -> Self {
        Request::Get { name: name.into() }
    }

    /// Name of the document the request is routed by
    pub fn doc_name(&self) -> &str {
        match self {
            Request::Edit { name, .. } | Request::Get { name } => name,
        }
    }
}

/// Kind of a server log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogKind {
    Hit,
    Miss,
    Evict,
    Fault,
    LazyExec,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::Hit => write!(f, "HIT"),
            LogKind::Miss => write!(f, "MISS"),
            LogKind::Evict => write!(f, "EVICT"),
            LogKind::Fault => write!(f, "FAULT"),
            LogKind::LazyExec => write!(f, "LAZY_EXEC"),
        }
    }
}

/// Server log line attached to every response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerLog {
    /// Document was served from the cache
    Hit { doc: String },
    /// Document was loaded into the cache
    Miss { doc: String },
    /// Miss that also pushed `evicted` out of the cache
    Evict { doc: String, evicted: String },
    /// Document is unknown to the server
    Fault { doc: String },
    /// Edit was queued; `queue_len` counts pending edits after enqueueing
    LazyExec { queue_len: usize },
}

impl ServerLog {
    pub fn kind(&self) -> LogKind {
        match self {
            ServerLog::Hit { .. } => LogKind::Hit,
            ServerLog::Miss { .. } => LogKind::Miss,
            ServerLog::Evict { .. } => LogKind::Evict,
            ServerLog::Fault { .. } => LogKind::Fault,
            ServerLog::LazyExec { .. } => LogKind::LazyExec,
        }
    }
}

impl std::fmt::Display for ServerLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerLog::Hit { doc } => write!(f, "Cache HIT for {}", doc),
            ServerLog::Miss { doc } => write!(f, "Cache MISS for {}", doc),
            ServerLog::Evict { doc, evicted } => write!(
                f,
                "Cache MISS for {} - cache entry for {} has been evicted",
                doc, evicted
            ),
            ServerLog::Fault { doc } => write!(f, "Document {} doesn't exist", doc),
            ServerLog::LazyExec { queue_len } => {
                write!(f, "Task queued for lazy execution, queue size: {}", queue_len)
            }
        }
    }
}

/// Response produced by a server for one request or one drained edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub log: ServerLog,
    /// Content for GET, acknowledgement for EDIT, `None` on FAULT
    pub payload: Option<String>,
    /// Replica id of the ring entry that served the request
    pub serving_id: u32,
}

impl Response {
    pub fn new(serving_id: u32, log: ServerLog, payload: Option<String>) -> Self {
        Self {
            log,
            payload,
            serving_id,
        }
    }

    pub fn log_kind(&self) -> LogKind {
        self.log.kind()
    }

    pub fn log_detail(&self) -> String {
        self.log.to_string()
    }

    /// Re-stamp the response with the replica that served it
    pub fn served_by(mut self, serving_id: u32) -> Self {
        self.serving_id = serving_id;
        self
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "[Server {}]-Response: {}",
            self.serving_id,
            self.payload.as_deref().unwrap_or("(null)")
        )?;
        write!(f, "[Server {}]-Log: {}", self.serving_id, self.log)
    }
}

/// Everything a single request produced: responses of edits drained
/// before it (FIFO order) followed by its own response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub flushed: Vec<Response>,
    pub response: Response,
}

impl RequestOutcome {
    pub fn new(flushed: Vec<Response>, response: Response) -> Self {
        Self { flushed, response }
    }

    pub fn served_by(self, serving_id: u32) -> Self {
        Self {
            flushed: self
                .flushed
                .into_iter()
                .map(|r| r.served_by(serving_id))
                .collect(),
            response: self.response.served_by(serving_id),
        }
    }

    /// All responses in the order they were produced
    pub fn into_responses(self) -> Vec<Response> {
        let mut responses = self.flushed;
        responses.push(self.response);
        responses
    }
}

pub(crate) fn queued_message(name: &str) -> String {
    format!("Request- EDIT {} - has been added to queue", name)
}

pub(crate) fn created_message(name: &str) -> String {
    format!("Document {} has been created", name)
}

pub(crate) fn overridden_message(name: &str) -> String {
    format!("Document {} has been overridden", name)
}
