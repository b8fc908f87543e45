//! Job types and their priority-queue ordering.
//!
//! Every piece of simulated work is a [`Job`] value carrying nothing but
//! identifiers, timestamps, and small payloads; live state is looked up when
//! the job fires. Handshake legs reference both endpoints so a leg that
//! finds its counterpart gone can schedule the compensating disconnect.

use std::cmp::Ordering;

use gossipnet::{ConnId, KnowledgeMap, NodeId, Timestamp};

/// Unique sequence number for deterministic event ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Work items of the discrete event simulation.
#[derive(Debug, Clone)]
pub enum Job {
    /// Open an outgoing pending connection and start the handshake.
    Connect { origin: NodeId, peer: NodeId },
    /// Handshake leg 2: the peer mirrors the connection.
    ConnectAccept {
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
    },
    /// Handshake leg 3: the origin learns of the accept and establishes.
    ConnectNotifyNode {
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
        time_accept: Timestamp,
    },
    /// Handshake leg 4: the peer establishes its side.
    ConnectNotifyPeer {
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_accept: Timestamp,
    },
    /// Tear down a connection locally, then notify the peer.
    Disconnect { node: NodeId, conn: ConnId },
    /// Tear down the mirror connection on the peer.
    DisconnectPeer {
        node: NodeId,
        peer: NodeId,
        conn: ConnId,
    },
    /// Periodic: ping every connection.
    Heartbeat { node: NodeId },
    /// Heartbeat request arriving at the peer.
    HeartbeatForth {
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
    },
    /// Heartbeat response arriving back at the origin.
    HeartbeatBack {
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
    },
    /// Periodic: publish a fresh self record and send knowledge to every
    /// connection.
    Gossip { node: NodeId },
    /// A knowledge snapshot arriving at a peer.
    GossipSend {
        origin: NodeId,
        peer: NodeId,
        knowledge: KnowledgeMap,
    },
    /// Periodic: run the topology search.
    Topology { node: NodeId },
}

/// A scheduled job with fire time and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// When the job should fire.
    pub time: Timestamp,
    /// Sequence number for deterministic ordering of same-time jobs.
    pub seq: SequenceNumber,
    /// The job to run.
    pub job: Job,
}

impl ScheduledJob {
    pub fn new(time: Timestamp, seq: SequenceNumber, job: Job) -> Self {
        Self { time, seq, job }
    }
}

// Implement ordering for min-heap (BinaryHeap is max-heap, so we reverse).
impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier time first, then earlier insertion.
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::Heartbeat {
            node: NodeId::new(0),
        }
    }

    #[test]
    fn test_earlier_time_wins() {
        let e1 = ScheduledJob::new(Timestamp::from_micros(10), SequenceNumber::new(1), job());
        let e2 = ScheduledJob::new(Timestamp::from_micros(5), SequenceNumber::new(2), job());

        // e2 has earlier time, so it is "greater" in min-heap terms.
        assert!(e2 > e1);
    }

    #[test]
    fn test_same_time_insertion_order_wins() {
        let e1 = ScheduledJob::new(Timestamp::from_micros(10), SequenceNumber::new(1), job());
        let e2 = ScheduledJob::new(Timestamp::from_micros(10), SequenceNumber::new(2), job());

        assert!(e1 > e2);
    }
}
