//! Deferred event scheduler
//!
//! Actions are queued with a delay and handed back by `pop_due` once their
//! fire time has passed. The server's tic loop polls `pop_due` at a fixed
//! interval, so:
//!
//! - an action never fires before its fire time;
//! - it fires at the first poll at or after its fire time, i.e. at most one
//!   poll interval late;
//! - actions due in the same poll come back ordered by fire time, and equal
//!   fire times keep insertion order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

struct Entry<T> {
    fire_at: Instant,
    seq: u64,
    action: T,
}

// Ordered by (fire_at, seq) only; the payload takes no part in ordering.
impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of pending actions keyed by fire time plus a tie-break counter
pub struct Scheduler<T> {
    pending: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Queue `action` to fire `delay` after `now`; returns the fire time
    pub fn schedule(&mut self, now: Instant, delay: Duration, action: T) -> Instant {
        let fire_at = now + delay;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Reverse(Entry { fire_at, seq, action }));
        fire_at
    }

    /// Remove and return every action whose fire time is at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.pending.peek() {
            if entry.fire_at > now {
                break;
            }
            if let Some(Reverse(entry)) = self.pending.pop() {
                due.push(entry.action);
            }
        }
        due
    }

    /// Fire time of the earliest pending action
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.peek().map(|Reverse(entry)| entry.fire_at)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
