//! Priority queue of pack requests.
//!
//! Requests are ordered by priority (higher values first), then by the order
//! in which they were queued (FIFO within the same priority). Priorities are
//! `f32`; they are compared with [`f32::total_cmp`] so every value, NaN
//! included, has a place in the order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A request waiting in the scheduling queue.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    /// Root pack of the request.
    pub pack: String,

    /// Scheduling priority (higher = sooner).
    pub priority: f32,

    /// Insertion order, kept across priority changes.
    sequence: u64,
}

impl QueuedRequest {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence (older) first.
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Priority-ordered set of request names.
///
/// Each pack appears at most once. Not thread-safe; the pack manager keeps it
/// behind its state lock.
#[derive(Debug, Default)]
pub struct RequestQueue {
    heap: BinaryHeap<QueuedRequest>,
    next_sequence: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `pack`. A pack that is already queued only gets its priority updated.
    pub fn push(&mut self, pack: impl Into<String>, priority: f32) {
        let pack = pack.into();
        if self.set_priority(&pack, priority) {
            return;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedRequest {
            pack,
            priority,
            sequence,
        });
    }

    /// Change the priority of a queued pack, keeping its place among equals.
    ///
    /// Returns `false` if the pack is not queued.
    pub fn set_priority(&mut self, pack: &str, priority: f32) -> bool {
        let Some(sequence) = self
            .heap
            .iter()
            .find(|entry| entry.pack == pack)
            .map(QueuedRequest::sequence)
        else {
            return false;
        };
        self.heap.retain(|entry| entry.pack != pack);
        self.heap.push(QueuedRequest {
            pack: pack.to_string(),
            priority,
            sequence,
        });
        true
    }

    /// Remove `pack`. Returns whether it was queued.
    pub fn remove(&mut self, pack: &str) -> bool {
        let before = self.heap.len();
        self.heap.retain(|entry| entry.pack != pack);
        self.heap.len() != before
    }

    /// Highest-priority entry.
    pub fn peek(&self) -> Option<&QueuedRequest> {
        self.heap.peek()
    }

    pub fn contains(&self, pack: &str) -> bool {
        self.heap.iter().any(|entry| entry.pack == pack)
    }

    /// Pack names from highest to lowest priority.
    pub fn ordered(&self) -> Vec<String> {
        let mut entries = self.heap.clone().into_sorted_vec();
        entries.reverse();
        entries.into_iter().map(|entry| entry.pack).collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        let mut queue = RequestQueue::new();

        queue.push("low", 0.1);
        queue.push("high", 10.0);
        queue.push("mid", 1.0);

        assert_eq!(queue.ordered(), vec!["high", "mid", "low"]);
        assert_eq!(queue.peek().unwrap().pack, "high");
    }

    #[test]
    fn test_fifo_within_same_priority() {
        let mut queue = RequestQueue::new();

        queue.push("first", 1.0);
        queue.push("second", 1.0);
        queue.push("third", 1.0);

        assert_eq!(queue.ordered(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_set_priority_reorders() {
        let mut queue = RequestQueue::new();
        queue.push("a", 1.0);
        queue.push("b", 2.0);

        assert!(queue.set_priority("a", 3.0));
        assert_eq!(queue.ordered(), vec!["a", "b"]);
        assert!(!queue.set_priority("missing", 1.0));
    }

    #[test]
    fn test_set_priority_keeps_insertion_order() {
        let mut queue = RequestQueue::new();
        queue.push("a", 1.0);
        queue.push("b", 5.0);

        queue.set_priority("b", 1.0);

        assert_eq!(queue.ordered(), vec!["a", "b"]);
    }

    #[test]
    fn test_push_existing_updates_priority() {
        let mut queue = RequestQueue::new();
        queue.push("a", 1.0);
        queue.push("b", 2.0);
        queue.push("a", 4.0);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.ordered(), vec!["a", "b"]);
    }

    #[test]
    fn test_remove() {
        let mut queue = RequestQueue::new();
        queue.push("a", 1.0);
        queue.push("b", 1.0);

        assert!(queue.remove("a"));
        assert!(!queue.remove("a"));
        assert!(!queue.contains("a"));
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_negative_and_nan_priorities_are_ordered() {
        let mut queue = RequestQueue::new();
        queue.push("negative", -1.0);
        queue.push("nan", f32::NAN);
        queue.push("zero", 0.0);

        let order = queue.ordered();
        assert_eq!(order.len(), 3);
        let zero = order.iter().position(|p| p == "zero").unwrap();
        let negative = order.iter().position(|p| p == "negative").unwrap();
        assert!(zero < negative);
    }
}
