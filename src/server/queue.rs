//! Bounded FIFO of pending edits

use std::collections::VecDeque;

use super::document::PendingEdit;

/// Write-behind queue with a fixed capacity
#[derive(Debug)]
pub struct EditQueue {
    edits: VecDeque<PendingEdit>,
    capacity: usize,
}

impl EditQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            edits: VecDeque::new(),
            capacity,
        }
    }

    /// Append an edit, returning the queue length after enqueueing.
    ///
    /// A full queue hands the edit back untouched.
    pub fn try_enqueue(&mut self, edit: PendingEdit) -> Result<usize, PendingEdit> {
        if self.is_full() {
            return Err(edit);
        }
        self.edits.push_back(edit);
        Ok(self.edits.len())
    }

    /// Pop the oldest edit
    pub fn dequeue(&mut self) -> Option<PendingEdit> {
        self.edits.pop_front()
    }

    /// Pending edits, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PendingEdit> {
        self.edits.iter()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.edits.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = EditQueue::new(3);
        assert_eq!(queue.try_enqueue(PendingEdit::new("a", "1")), Ok(1));
        assert_eq!(queue.try_enqueue(PendingEdit::new("b", "2")), Ok(2));

        assert_eq!(queue.iter().next().map(|e| e.name.as_str()), Some("a"));
        assert_eq!(queue.dequeue(), Some(PendingEdit::new("a", "1")));
        assert_eq!(queue.dequeue(), Some(PendingEdit::new("b", "2")));
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rejects_when_full() {
        let mut queue = EditQueue::new(1);
        queue.try_enqueue(PendingEdit::new("a", "1")).unwrap();

        let rejected = queue.try_enqueue(PendingEdit::new("b", "2")).unwrap_err();
        assert_eq!(rejected.name, "b");
        assert_eq!(queue.len(), 1);
        assert!(queue.is_full());
    }
}
