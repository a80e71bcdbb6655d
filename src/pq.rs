//! Timer queue with lazy cancellation
//!
//! A min-heap of `(deadline, seq)` keys plus a map of live entries. The map is
//! the source of truth: cancelling only removes the map entry, and stale heap
//! keys are discarded when they reach the top.

use crate::cell::Time;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Identifier of a queued timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Clone, Debug)]
struct Key {
    deadline: Time,
    seq: u64,
    id: TimerId,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed: BinaryHeap is a max-heap. total_cmp keeps float ordering total.
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .total_cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
            .reverse()
    }
}

/// Timers ordered by deadline, then by insertion order.
pub struct TimerQueue<M> {
    heap: BinaryHeap<Key>,
    live: HashMap<TimerId, (Time, M)>,
    next_seq: u64,
}

impl<M> Default for TimerQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TimerQueue<M> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Queue `payload` at `deadline`. Equal deadlines pop in push order.
    pub fn push(&mut self, deadline: Time, payload: M) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TimerId(seq);
        self.live.insert(id, (deadline, payload));
        self.heap.push(Key { deadline, seq, id });
        id
    }

    /// Remove a timer. Returns its payload if it was still queued.
    pub fn cancel(&mut self, id: TimerId) -> Option<M> {
        self.live.remove(&id).map(|(_, payload)| payload)
    }

    /// The earliest live deadline.
    pub fn peek_deadline(&mut self) -> Option<Time> {
        self.clean_top();
        self.heap.peek().map(|k| k.deadline)
    }

    /// Pop every live timer whose deadline is exactly `deadline`, in push order.
    pub fn pop_at(&mut self, deadline: Time) -> Vec<(TimerId, M)> {
        let mut batch = Vec::new();
        while self.peek_deadline().is_some_and(|d| d.to_bits() == deadline.to_bits()) {
            let Some(key) = self.heap.pop() else {
                break;
            };
            if let Some((_, payload)) = self.live.remove(&key.id) {
                batch.push((key.id, payload));
            }
        }
        batch
    }

    fn clean_top(&mut self) {
        while let Some(key) = self.heap.peek() {
            if self.live.contains_key(&key.id) {
                break;
            }
            self.heap.pop();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_earliest_first() {
        let mut q = TimerQueue::new();
        q.push(0.5, "first");
        q.push(0.2, "second");
        q.push(0.8, "third");

        assert_eq!(q.peek_deadline(), Some(0.2));
        let batch = q.pop_at(0.2);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].1, "second");
        assert_eq!(q.peek_deadline(), Some(0.5));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_equal_deadlines_keep_push_order() {
        let mut q = TimerQueue::new();
        q.push(1.0, 'c');
        q.push(0.5, 'x');
        q.push(1.0, 'a');
        q.push(1.0, 'b');

        q.pop_at(0.5);
        let order: Vec<char> = q.pop_at(1.0).into_iter().map(|(_, c)| c).collect();
        assert_eq!(order, vec!['c', 'a', 'b']);
        assert!(q.is_empty());
    }

    #[test]
    fn test_cancel_is_lazy() {
        let mut q = TimerQueue::new();
        let a = q.push(0.2, 1);
        q.push(0.4, 2);

        assert_eq!(q.cancel(a), Some(1));
        assert_eq!(q.cancel(a), None);
        assert_eq!(q.peek_deadline(), Some(0.4));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_pop_at_other_deadline_is_empty() {
        let mut q = TimerQueue::new();
        q.push(2.0, ());
        assert!(q.pop_at(1.0).is_empty());
        assert_eq!(q.len(), 1);
    }
}
