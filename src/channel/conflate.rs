//! Bounded drop-oldest message buffer.

use crossbeam_queue::ArrayQueue;

/// Bounded lock-free queue that conflates on overflow: pushing into a full
/// queue evicts the oldest element instead of rejecting the new one.
///
/// Single-producer/single-consumer use requires no external locking; the
/// underlying queue is safe for concurrent access either way.
pub struct ConflatingQueue<T> {
    queue: ArrayQueue<T>,
}

impl<T> ConflatingQueue<T> {
    /// Create a queue holding at most `capacity` elements.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
        }
    }

    /// Push an element, evicting the oldest if full.
    ///
    /// Returns the evicted element, if any.
    pub fn push(&self, value: T) -> Option<T> {
        self.queue.force_push(value)
    }

    /// Pop the oldest buffered element
    pub fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Drain the queue and return only the newest element
    pub fn latest(&self) -> Option<T> {
        let mut newest = None;
        while let Some(value) = self.queue.pop() {
            newest = Some(value);
        }
        newest
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_one_keeps_most_recent() {
        let queue = ConflatingQueue::new(1);
        for i in 0..10 {
            queue.push(i);
        }
        assert_eq!(queue.pop(), Some(9));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let queue = ConflatingQueue::new(3);
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(4));
        assert!(queue.is_empty());
    }

    #[test]
    fn latest_drains_everything() {
        let queue = ConflatingQueue::new(4);
        queue.push("a");
        queue.push("b");
        queue.push("c");
        assert_eq!(queue.latest(), Some("c"));
        assert!(queue.is_empty());
    }
}
