//! Recency Index
//!
//! Least-recently-used bookkeeping for a server's document cache.
//! Entries live in a slot arena threaded into a doubly linked list
//! (head = least recently used, tail = most recently used); a hash
//! index maps every key to its slot so lookups, removals and
//! evictions are O(1).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// One linked entry of the recency list
#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded LRU index over `(key, value)` pairs
#[derive(Debug)]
pub struct RecencyIndex<K, V> {
    /// Slot arena; `None` marks a free slot
    slots: Vec<Option<Slot<K, V>>>,
    /// Free slot indices available for reuse
    free: Vec<usize>,
    /// Key to slot position
    index: HashMap<K, usize>,
    /// Least recently used entry
    head: Option<usize>,
    /// Most recently used entry
    tail: Option<usize>,
    capacity: usize,
}

impl<K, V> RecencyIndex<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty index holding at most `capacity` entries
    ///
    /// # Panics
    /// Panics if `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RecencyIndex capacity must be positive");

        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
        }
    }

    /// Insert or refresh `key` as the most recently used entry.
    ///
    /// Returns the key evicted to make room, if the index was full and
    /// `key` was not already present.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        let refreshed = self.remove(&key);

        let evicted = if !refreshed && self.is_full() {
            self.pop_lru().map(|(evicted_key, _)| evicted_key)
        } else {
            None
        };

        let idx = self.allocate(Slot {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.link_back(idx);
        self.index.insert(key, idx);

        evicted
    }

    /// Look up a value without touching recency
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    /// Check whether `key` is cached
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Remove `key`, returning whether it was present
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.remove(key) {
            Some(idx) => {
                self.unlink(idx);
                self.release(idx);
                true
            }
            None => false,
        }
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let idx = self.head?;
        self.unlink(idx);
        let slot = self.release(idx)?;
        self.index.remove(&slot.key);
        Some((slot.key, slot.value))
    }

    /// Key that the next eviction would remove
    pub fn peek_lru(&self) -> Option<&K> {
        self.head
            .and_then(|idx| self.slots[idx].as_ref())
            .map(|slot| &slot.key)
    }

    /// Keys ordered from least to most recently used
    pub fn keys(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.slots[idx].as_ref() {
                Some(slot) => {
                    keys.push(&slot.key);
                    cursor = slot.next;
                }
                None => break,
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.index.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry, keeping the capacity
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn allocate(&mut self, slot: Slot<K, V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<Slot<K, V>> {
        let slot = self.slots[idx].take();
        if slot.is_some() {
            self.free.push(idx);
        }
        slot
    }

    /// Append an unlinked slot at the most recently used end
    fn link_back(&mut self, idx: usize) {
        let old_tail = self.tail;
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.prev = old_tail;
            slot.next = None;
        }
        match old_tail {
            Some(tail) => {
                if let Some(slot) = self.slots[tail].as_mut() {
                    slot.next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    /// Detach a slot from its neighbours
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(slot) => (slot.prev, slot.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(slot) = self.slots[p].as_mut() {
                    slot.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(slot) = self.slots[n].as_mut() {
                    slot.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}
