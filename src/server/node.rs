//! Document Server
//!
//! Owns one authoritative document table, an LRU cache over it and a
//! write-behind queue. Edits are acknowledged immediately and applied
//! on the next drain; every GET drains first so reads observe all
//! previously accepted edits.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::document::{Document, PendingEdit};
use super::protocol::{
    created_message, overridden_message, queued_message, Request, RequestOutcome, Response,
    ServerLog,
};
use super::queue::EditQueue;
use crate::cache::RecencyIndex;
use crate::error::{Error, Result};

/// Server handle shared by every ring entry that aliases it
pub type SharedServer = Arc<Mutex<Server>>;

/// Lock a shared server, recovering the guard if a holder panicked
pub fn lock(server: &SharedServer) -> MutexGuard<'_, Server> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend document server
#[derive(Debug)]
pub struct Server {
    /// Logical server id
    id: u32,
    /// Authoritative document table
    documents: HashMap<String, Arc<Document>>,
    /// Read-through cache aliasing documents in the table
    cache: RecencyIndex<String, Arc<Document>>,
    /// Accepted edits not yet applied
    pending_edits: EditQueue,
}

impl Server {
    /// Create an empty server
    pub fn new(id: u32, cache_capacity: usize, queue_capacity: usize) -> Result<Self> {
        if cache_capacity == 0 {
            return Err(Error::InvalidCacheCapacity(cache_capacity));
        }

        Ok(Self {
            id,
            documents: HashMap::new(),
            cache: RecencyIndex::new(cache_capacity),
            pending_edits: EditQueue::new(queue_capacity),
        })
    }

    /// Wrap the server for sharing between ring entries
    pub fn into_shared(self) -> SharedServer {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Dispatch a request to the matching handler
    pub fn handle(&mut self, request: Request) -> Result<RequestOutcome> {
        match request {
            Request::Edit { name, content } => {
                let response = self.handle_edit(&name, &content)?;
                Ok(RequestOutcome::new(Vec::new(), response))
            }
            Request::Get { name } => Ok(self.handle_get(&name)),
        }
    }

    /// Queue an edit for lazy execution
    pub fn handle_edit(&mut self, name: &str, content: &str) -> Result<Response> {
        let capacity = self.pending_edits.capacity();
        let queue_len = self
            .pending_edits
            .try_enqueue(PendingEdit::new(name, content))
            .map_err(|_| Error::QueueFull {
                server_id: self.id,
                capacity,
            })?;

        tracing::debug!(server = self.id, doc = name, queue_len, "Edit queued");

        Ok(Response::new(
            self.id,
            ServerLog::LazyExec { queue_len },
            Some(queued_message(name)),
        ))
    }

    /// Drain pending edits, then serve `name` from cache or table
    pub fn handle_get(&mut self, name: &str) -> RequestOutcome {
        let flushed = self.drain_queue();

        let response = if let Some(doc) = self.cache.get(name).cloned() {
            let content = doc.content().to_string();
            self.cache.put(name.to_string(), doc);
            Response::new(self.id, ServerLog::Hit { doc: name.to_string() }, Some(content))
        } else if let Some(doc) = self.documents.get(name).cloned() {
            let content = doc.content().to_string();
            let log = match self.cache.put(name.to_string(), doc) {
                Some(evicted) => ServerLog::Evict {
                    doc: name.to_string(),
                    evicted,
                },
                None => ServerLog::Miss { doc: name.to_string() },
            };
            Response::new(self.id, log, Some(content))
        } else {
            Response::new(self.id, ServerLog::Fault { doc: name.to_string() }, None)
        };

        tracing::debug!(server = self.id, doc = name, log = %response.log_kind(), "Get served");

        RequestOutcome::new(flushed, response)
    }

    /// Apply every pending edit in FIFO order
    pub fn drain_queue(&mut self) -> Vec<Response> {
        let mut responses = Vec::with_capacity(self.pending_edits.len());
        while let Some(edit) = self.pending_edits.dequeue() {
            responses.push(self.apply_edit(edit));
        }

        if !responses.is_empty() {
            tracing::debug!(server = self.id, applied = responses.len(), "Edit queue drained");
        }
        responses
    }

    /// Write one edit through to the table and the cache
    fn apply_edit(&mut self, edit: PendingEdit) -> Response {
        let name = edit.name.clone();
        let was_cached = self.cache.has(name.as_str());
        let existed = self.documents.contains_key(&name);

        let doc = Arc::new(Document::from(edit));
        self.documents.insert(name.clone(), Arc::clone(&doc));

        let log = match self.cache.put(name.clone(), doc) {
            Some(evicted) => ServerLog::Evict {
                doc: name.clone(),
                evicted,
            },
            None if was_cached => ServerLog::Hit { doc: name.clone() },
            None => ServerLog::Miss { doc: name.clone() },
        };

        let payload = if existed {
            overridden_message(&name)
        } else {
            created_message(&name)
        };

        Response::new(self.id, log, Some(payload))
    }

    /// Insert an already committed document, bypassing the queue.
    ///
    /// Returns the document it replaced, if any.
    pub fn add_document(&mut self, doc: Arc<Document>) -> Option<Arc<Document>> {
        self.cache.remove(doc.name());
        self.documents.insert(doc.name().to_string(), doc)
    }

    /// Remove a document from the table and the cache
    pub fn remove_document(&mut self, name: &str) -> Option<Arc<Document>> {
        self.cache.remove(name);
        self.documents.remove(name)
    }

    /// Move every document out of the server, leaving it empty
    pub fn take_documents(&mut self) -> Vec<Arc<Document>> {
        self.cache.clear();
        self.documents.drain().map(|(_, doc)| doc).collect()
    }

    pub fn document(&self, name: &str) -> Option<&Arc<Document>> {
        self.documents.get(name)
    }

    pub fn contains_document(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Distinct names held in the table or waiting in the queue
    pub fn owned_document_count(&self) -> usize {
        let queued = self
            .pending_edits
            .iter()
            .filter(|edit| !self.documents.contains_key(&edit.name))
            .map(|edit| edit.name.as_str())
            .collect::<HashSet<_>>();
        self.documents.len() + queued.len()
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.has(name)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn pending_edits(&self) -> usize {
        self.pending_edits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::LogKind;

    fn server(cache_capacity: usize) -> Server {
        Server::new(5, cache_capacity, 16).unwrap()
    }

    #[test]
    fn test_edit_then_get() {
        let mut srv = server(2);

        let ack = srv.handle_edit("a.txt", "v1").unwrap();
        assert_eq!(ack.log, ServerLog::LazyExec { queue_len: 1 });
        assert_eq!(ack.payload.as_deref(), Some("Request- EDIT a.txt - has been added to queue"));
        assert_eq!(ack.serving_id, 5);
        assert!(!srv.contains_document("a.txt"));

        let outcome = srv.handle_get("a.txt");
        assert_eq!(outcome.flushed.len(), 1);
        assert_eq!(outcome.flushed[0].payload.as_deref(), Some("Document a.txt has been created"));
        assert_eq!(outcome.flushed[0].log, ServerLog::Miss { doc: "a.txt".into() });

        // Applying the edit cached the document, so the read is a hit
        assert_eq!(outcome.response.log_kind(), LogKind::Hit);
        assert_eq!(outcome.response.payload.as_deref(), Some("v1"));
        assert_eq!(srv.pending_edits(), 0);
    }

    #[test]
    fn test_get_miss_then_hit() {
        let mut srv = server(2);
        srv.add_document(Arc::new(Document::new("a.txt", "v1")));

        let first = srv.handle_get("a.txt").response;
        assert_eq!(first.log, ServerLog::Miss { doc: "a.txt".into() });
        assert_eq!(first.payload.as_deref(), Some("v1"));

        let second = srv.handle_get("a.txt").response;
        assert_eq!(second.log_kind(), LogKind::Hit);
    }

    #[test]
    fn test_get_evicts_with_capacity_one() {
        let mut srv = server(1);
        srv.add_document(Arc::new(Document::new("a.txt", "1")));
        srv.add_document(Arc::new(Document::new("b.txt", "2")));

        assert_eq!(srv.handle_get("a.txt").response.log_kind(), LogKind::Miss);
        let second = srv.handle_get("b.txt").response;
        assert_eq!(
            second.log,
            ServerLog::Evict {
                doc: "b.txt".into(),
                evicted: "a.txt".into()
            }
        );
        // Eviction never drops the authoritative copy
        assert!(srv.contains_document("a.txt"));
    }

    #[test]
    fn test_get_unknown_is_fault() {
        let mut srv = server(2);
        let response = srv.handle_get("missing").response;
        assert_eq!(response.log_kind(), LogKind::Fault);
        assert!(response.payload.is_none());
    }

    #[test]
    fn test_drain_replays_in_order() {
        let mut srv = server(4);
        srv.handle_edit("a", "1").unwrap();
        srv.handle_edit("a", "2").unwrap();
        let ack = srv.handle_edit("b", "3").unwrap();
        assert_eq!(ack.log, ServerLog::LazyExec { queue_len: 3 });

        let flushed = srv.drain_queue();
        let payloads: Vec<_> = flushed.iter().map(|r| r.payload.clone().unwrap()).collect();
        assert_eq!(
            payloads,
            vec![
                "Document a has been created",
                "Document a has been overridden",
                "Document b has been created",
            ]
        );
        assert_eq!(flushed[1].log_kind(), LogKind::Hit);
        assert_eq!(srv.document("a").unwrap().content(), "2");
        assert!(srv.drain_queue().is_empty());
    }

    #[test]
    fn test_drain_reports_eviction() {
        let mut srv = server(1);
        srv.handle_edit("a", "1").unwrap();
        srv.handle_edit("b", "2").unwrap();

        let flushed = srv.drain_queue();
        assert_eq!(
            flushed[1].log,
            ServerLog::Evict {
                doc: "b".into(),
                evicted: "a".into()
            }
        );
        assert_eq!(srv.cached_count(), 1);
    }

    #[test]
    fn test_queue_full() {
        let mut srv = Server::new(9, 1, 2).unwrap();
        srv.handle_edit("a", "1").unwrap();
        srv.handle_edit("a", "2").unwrap();

        let err = srv.handle_edit("a", "3").unwrap_err();
        assert!(matches!(err, Error::QueueFull { server_id: 9, capacity: 2 }));
        assert_eq!(srv.pending_edits(), 2);
    }

    #[test]
    fn test_zero_cache_rejected() {
        assert!(matches!(
            Server::new(1, 0, 4),
            Err(Error::InvalidCacheCapacity(0))
        ));
    }

    #[test]
    fn test_table_mutators_drop_cache_entries() {
        let mut srv = server(2);
        srv.add_document(Arc::new(Document::new("a", "1")));
        srv.handle_get("a");
        assert!(srv.is_cached("a"));

        let removed = srv.remove_document("a").unwrap();
        assert_eq!(removed.content(), "1");
        assert!(!srv.is_cached("a"));

        srv.add_document(Arc::new(Document::new("b", "1")));
        srv.handle_get("b");
        srv.add_document(Arc::new(Document::new("b", "2")));
        assert!(!srv.is_cached("b"));
        assert_eq!(srv.handle_get("b").response.payload.as_deref(), Some("2"));
    }

    #[test]
    fn test_take_documents_empties_server() {
        let mut srv = server(2);
        srv.handle_edit("a", "1").unwrap();
        srv.handle_edit("b", "2").unwrap();
        srv.drain_queue();

        let mut names: Vec<_> = srv.take_documents().iter().map(|d| d.name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(srv.document_count(), 0);
        assert_eq!(srv.cached_count(), 0);
    }

    #[test]
    fn test_owned_document_count() {
        let mut srv = server(2);
        srv.add_document(Arc::new(Document::new("a", "1")));
        srv.handle_edit("a", "2").unwrap();
        srv.handle_edit("b", "1").unwrap();
        srv.handle_edit("b", "2").unwrap();

        assert_eq!(srv.document_count(), 1);
        assert_eq!(srv.owned_document_count(), 2);
    }

    #[test]
    fn test_handle_dispatch() {
        let shared = server(2).into_shared();
        let ack = lock(&shared).handle(Request::edit("a", "x")).unwrap();
        assert!(ack.flushed.is_empty());

        let outcome = lock(&shared).handle(Request::get("a")).unwrap();
        assert_eq!(outcome.flushed.len(), 1);
        assert_eq!(outcome.response.payload.as_deref(), Some("x"));
    }
}
