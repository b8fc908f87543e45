//! Virtual-time event queue.
//!
//! A priority queue keyed on `(fire_time, insertion_sequence)`. Time only
//! moves when a job is popped; jobs scheduled with zero delay fire after
//! everything already queued for the current instant.

use std::collections::BinaryHeap;

use gossipnet::{Duration, Timestamp};

use crate::event::{Job, ScheduledJob, SequenceNumber};

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledJob>,
    now: Timestamp,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            now: Timestamp::ZERO,
            next_seq: 0,
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Enqueue `job` to fire `delay` from now.
    pub fn schedule(&mut self, delay: Duration, job: Job) {
        let seq = SequenceNumber::new(self.next_seq);
        self.next_seq += 1;
        self.heap.push(ScheduledJob::new(self.now + delay, seq, job));
    }

    /// Whether any job is pending.
    pub fn more(&self) -> bool {
        !self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Fire time of the next job, if any.
    pub fn peek_time(&self) -> Option<Timestamp> {
        self.heap.peek().map(|s| s.time)
    }

    /// Dequeue the earliest job and advance time to its fire time.
    pub fn pop(&mut self) -> Option<Job> {
        let scheduled = self.heap.pop()?;
        debug_assert!(scheduled.time >= self.now);
        self.now = scheduled.time;
        Some(scheduled.job)
    }

    /// Advance time without firing anything (end of a bounded wait).
    pub fn advance_to(&mut self, time: Timestamp) {
        if time > self.now {
            self.now = time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossipnet::NodeId;

    fn heartbeat(node: u64) -> Job {
        Job::Heartbeat {
            node: NodeId::new(node),
        }
    }

    fn node_of(job: Job) -> u64 {
        match job {
            Job::Heartbeat { node } => node.raw(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_pop_advances_time_in_order() {
        let mut queue = EventQueue::new();
        queue.schedule(Duration::from_micros(300), heartbeat(3));
        queue.schedule(Duration::from_micros(100), heartbeat(1));
        queue.schedule(Duration::from_micros(200), heartbeat(2));

        assert_eq!(queue.peek_time(), Some(Timestamp::from_micros(100)));
        assert_eq!(node_of(queue.pop().unwrap()), 1);
        assert_eq!(queue.now(), Timestamp::from_micros(100));
        assert_eq!(node_of(queue.pop().unwrap()), 2);
        assert_eq!(node_of(queue.pop().unwrap()), 3);
        assert_eq!(queue.now(), Timestamp::from_micros(300));
        assert!(!queue.more());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_ties_fire_in_insertion_order() {
        let mut queue = EventQueue::new();
        for node in 0..5 {
            queue.schedule(Duration::from_micros(50), heartbeat(node));
        }
        let order: Vec<u64> = std::iter::from_fn(|| queue.pop().map(node_of)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_delay_fires_after_current_instant_backlog() {
        let mut queue = EventQueue::new();
        queue.schedule(Duration::from_micros(10), heartbeat(1));
        queue.schedule(Duration::from_micros(10), heartbeat(2));

        assert_eq!(node_of(queue.pop().unwrap()), 1);
        // Re-entrant zero-delay job lands behind the other job already due
        // at this instant.
        queue.schedule(Duration::ZERO, heartbeat(3));
        assert_eq!(node_of(queue.pop().unwrap()), 2);
        assert_eq!(node_of(queue.pop().unwrap()), 3);
        assert_eq!(queue.now(), Timestamp::from_micros(10));
    }

    #[test]
    fn test_advance_to_never_rewinds() {
        let mut queue = EventQueue::new();
        queue.advance_to(Timestamp::from_micros(500));
        assert_eq!(queue.now(), Timestamp::from_micros(500));
        queue.advance_to(Timestamp::from_micros(100));
        assert_eq!(queue.now(), Timestamp::from_micros(500));

        // New jobs are scheduled relative to the advanced clock.
        queue.schedule(Duration::from_micros(1), heartbeat(1));
        assert_eq!(queue.peek_time(), Some(Timestamp::from_micros(501)));
    }
}
