//! Bounded priority queue for outbound messages.
//!
//! Ordering invariant: a higher-urgency message is dequeued no later than
//! any lower-urgency one, regardless of enqueue order; ties break by
//! insertion order (FIFO within a priority level). A message re-inserted
//! after a retry joins the back of its priority lane.
//!
//! The queue is shared between many producers and exactly one consumer;
//! the mutex is only ever held for a push or a pop, never across I/O.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use crate::message::{Message, Priority};

struct Entry {
    priority: Priority,
    seq: u64,
    message: Message,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

struct Inner {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

pub struct PriorityQueue {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a new message, rejecting it if the queue is at capacity.
    ///
    /// On rejection the message is handed back to the caller untouched.
    pub fn try_push(&self, message: Message) -> Result<(), Message> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        if inner.heap.len() >= self.capacity {
            return Err(message);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(Entry {
            priority: message.priority,
            seq,
            message,
        }));
        Ok(())
    }

    /// Re-insert a message that already passed admission (retry or
    /// rate-limit deferral). Capacity is not re-checked: the message was
    /// accounted for when first accepted and must not be lost here.
    pub fn requeue(&self, message: Message) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(Entry {
            priority: message.priority,
            seq,
            message,
        }));
    }

    /// Remove the highest-urgency, oldest ready message.
    pub fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.heap.pop().map(|Reverse(entry)| entry.message)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the queue, returning the leftovers in dequeue order.
    /// Used at shutdown to surface undelivered messages.
    pub fn drain(&self) -> Vec<Message> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let mut drained = Vec::with_capacity(inner.heap.len());
        while let Some(Reverse(entry)) = inner.heap.pop() {
            drained.push(entry.message);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Category, MessageDraft};

    fn message(priority: Priority, title: &str) -> Message {
        Message::from_draft(
            MessageDraft::new(Category::Test, title).priority(priority),
            "bot",
        )
    }

    #[test]
    fn test_priority_order_wins_over_arrival_order() {
        let queue = PriorityQueue::new(10);
        queue.try_push(message(Priority::Critical, "first")).unwrap();
        queue.try_push(message(Priority::Low, "second")).unwrap();
        queue.try_push(message(Priority::Normal, "third")).unwrap();

        assert_eq!(queue.pop().unwrap().priority, Priority::Critical);
        assert_eq!(queue.pop().unwrap().priority, Priority::Normal);
        assert_eq!(queue.pop().unwrap().priority, Priority::Low);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = PriorityQueue::new(10);
        queue.try_push(message(Priority::Normal, "a")).unwrap();
        queue.try_push(message(Priority::Normal, "b")).unwrap();
        queue.try_push(message(Priority::Normal, "c")).unwrap();

        assert_eq!(queue.pop().unwrap().title, "a");
        assert_eq!(queue.pop().unwrap().title, "b");
        assert_eq!(queue.pop().unwrap().title, "c");
    }

    #[test]
    fn test_reject_when_full() {
        let queue = PriorityQueue::new(2);
        queue.try_push(message(Priority::Normal, "a")).unwrap();
        queue.try_push(message(Priority::Normal, "b")).unwrap();

        let rejected = queue.try_push(message(Priority::Critical, "c")).unwrap_err();
        assert_eq!(rejected.title, "c");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_requeue_bypasses_capacity() {
        let queue = PriorityQueue::new(1);
        queue.try_push(message(Priority::Normal, "a")).unwrap();

        // A retried message must never be dropped by the capacity check
        queue.requeue(message(Priority::Normal, "retry"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_requeue_joins_back_of_lane() {
        let queue = PriorityQueue::new(10);
        queue.try_push(message(Priority::Normal, "a")).unwrap();
        queue.requeue(message(Priority::Normal, "retry"));
        queue.try_push(message(Priority::Critical, "urgent")).unwrap();

        assert_eq!(queue.pop().unwrap().title, "urgent");
        assert_eq!(queue.pop().unwrap().title, "a");
        assert_eq!(queue.pop().unwrap().title, "retry");
    }

    #[test]
    fn test_drain_returns_all_in_dequeue_order() {
        let queue = PriorityQueue::new(10);
        queue.try_push(message(Priority::Low, "low")).unwrap();
        queue.try_push(message(Priority::Critical, "crit")).unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].title, "crit");
        assert_eq!(drained[1].title, "low");
        assert!(queue.is_empty());
    }
}
