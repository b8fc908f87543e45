//! Topology self-optimization.
//!
//! Each node periodically scores the overlay as it knows it from gossip and
//! evaluates every single-edge add or drop against that score. The winning
//! move, if any beats the status quo, is turned into connect or disconnect
//! work by the simulator.
//!
//! Scoring runs entirely on the gossip knowledge map, so a node can only
//! reason about what has been published to it; the real cluster may already
//! look different.

use std::collections::BTreeSet;

use crate::config::{
    fallback_latency, CONN_COEF, CROSS_DC_LATENCY, CROSS_RACK_LATENCY, INITIAL_CONNECT_COUNT,
    MINIMAL_LATENCY,
};
use crate::id::NodeId;
use crate::knowledge::KnowledgeMap;
use crate::scan::scan_graph;

/// The edge change a search run settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyMove {
    /// Open a connection to a node that is not currently a peer.
    Connect(NodeId),
    /// Tear down every connection to an existing peer.
    Drop(NodeId),
}

/// Target fan-out for a cluster believed to have `known_count` members:
/// `CONN_COEF * sqrt(N + INITIAL_CONNECT_COUNT)`, clamped into
/// `[INITIAL_CONNECT_COUNT, N - 1]` with the lower bound winning.
pub fn optimal_conn_count(known_count: usize) -> usize {
    let base = (known_count + INITIAL_CONNECT_COUNT) as f64;
    let scaled = (CONN_COEF * base.sqrt() + 0.5).floor() as usize;
    INITIAL_CONNECT_COUNT.max(scaled.min(known_count.saturating_sub(1)))
}

/// A scored snapshot of the overlay as one node knows it.
///
/// `extra_jump` / `extra_drop` overlay a hypothetical edge change on the
/// knowledge map without mutating it; [`recalc`](Self::recalc) then rescans
/// under that hypothesis.
pub struct TopologyView<'a> {
    origin: NodeId,
    known: &'a KnowledgeMap,
    known_count: usize,
    conn_count: usize,

    max_hops: usize,
    avg_hops: f64,
    max_latency: f64,
    avg_latency: f64,
    inaccessible_count: usize,

    extra_jump: Option<NodeId>,
    extra_drop: Option<NodeId>,
}

impl<'a> TopologyView<'a> {
    /// Snapshot the current overlay. `known` must already carry a fresh
    /// self record (see `Node::prepare_knowledge`); `conn_count` is the
    /// node's live connection count, pending included.
    pub fn new(origin: NodeId, known: &'a KnowledgeMap, conn_count: usize) -> Self {
        let mut view = Self {
            origin,
            known,
            known_count: known.len(),
            conn_count,
            max_hops: 0,
            avg_hops: 0.0,
            max_latency: 0.0,
            avg_latency: 0.0,
            inaccessible_count: 0,
            extra_jump: None,
            extra_drop: None,
        };
        view.recalc();
        view
    }

    /// Published edges of `id`, with the hypothetical overlay applied to
    /// the origin's own record. A simulated extra edge that the record does
    /// not already list is billed at the pessimistic fallback latency.
    fn jumps(&self, id: NodeId) -> Vec<(NodeId, f64)> {
        let Some(info) = self.known.get(&id) else {
            return Vec::new();
        };
        let at_origin = id == self.origin;
        let mut pending_jump = if at_origin { self.extra_jump } else { None };
        let mut out = Vec::with_capacity(info.peers.len() + 1);
        for (&peer_id, link) in &info.peers {
            if at_origin && Some(peer_id) == self.extra_drop {
                continue;
            }
            if pending_jump == Some(peer_id) {
                pending_jump = None;
            }
            out.push((peer_id, link.latency));
        }
        if let Some(extra) = pending_jump {
            out.push((extra, fallback_latency()));
        }
        out
    }

    /// Rescan the knowledge graph under the current hypothesis.
    fn recalc(&mut self) {
        let scan = scan_graph(self.origin, self.known.keys().copied(), |id| self.jumps(id));
        self.max_hops = scan.max_hops;
        self.avg_hops = scan.avg_hops;
        self.max_latency = scan.max_latency;
        self.avg_latency = scan.avg_latency;
        self.inaccessible_count = scan.inaccessible.len();
    }

    pub fn optimal_conn_count(&self) -> usize {
        optimal_conn_count(self.known_count)
    }

    /// Quality of the overlay from this node's point of view; higher is
    /// better. Latency terms compare against a nominal two-hop round trip,
    /// hop terms penalize quadratically beyond two hops, the connection
    /// term penalizes fan-out beyond the optimum, and the whole score
    /// collapses with every unreachable node.
    pub fn prosperity(&self) -> f64 {
        let expected_latency =
            2.0 * (CROSS_DC_LATENCY + CROSS_RACK_LATENCY + MINIMAL_LATENCY).as_micros() as f64;

        let k_max_lat = expected_latency / self.max_latency;
        let k_avg_lat = expected_latency / self.avg_latency;

        let k_max_hops = if self.max_hops > 2 {
            1.0 / ((self.max_hops - 1) * (self.max_hops - 1)) as f64
        } else {
            1.0
        };
        let k_avg_hops = if self.avg_hops > 2.0 {
            1.0 / ((self.avg_hops - 1.0) * (self.avg_hops - 1.0))
        } else {
            1.0
        };

        let optimal = self.optimal_conn_count();
        let k_conn_count = if self.conn_count > optimal {
            optimal as f64 / self.conn_count as f64
        } else {
            1.0
        };

        let score = 0.2 * k_max_lat + 0.3 * k_avg_lat + k_max_hops + k_avg_hops + k_conn_count;
        score / (self.inaccessible_count + 1) as f64
    }

    /// Probability that a think round acts at all. Struggling nodes think
    /// at least occasionally, content nodes every time.
    pub fn urgency(&self) -> f64 {
        self.prosperity().clamp(0.05, 1.0)
    }

    /// Evaluate all single-edge moves and return the best strict
    /// improvement, if any. Additions are considered only below twice the
    /// optimal fan-out and skip candidates that already advertise more
    /// connections than the optimum; drops are considered only at or above
    /// the optimal fan-out.
    pub fn search(&mut self) -> Option<TopologyMove> {
        let self_peers: BTreeSet<NodeId> = self
            .known
            .get(&self.origin)
            .map(|info| info.peers.keys().copied().collect())
            .unwrap_or_default();
        let optimal = self.optimal_conn_count();

        let mut best: Option<NodeId> = None;
        let mut best_prosperity = self.prosperity();

        if self.conn_count < 2 * optimal {
            self.conn_count += 1;
            let candidates: Vec<NodeId> = self
                .known
                .iter()
                .filter(|&(&id, info)| {
                    id != self.origin
                        && !self_peers.contains(&id)
                        && info.peers.len() <= optimal
                })
                .map(|(&id, _)| id)
                .collect();
            for candidate in candidates {
                self.extra_jump = Some(candidate);
                self.recalc();
                let prosperity = self.prosperity();
                if prosperity > best_prosperity {
                    best = Some(candidate);
                    best_prosperity = prosperity;
                }
            }
            self.extra_jump = None;
            self.conn_count -= 1;
        }

        if self.conn_count >= optimal {
            self.conn_count -= 1;
            let candidates: Vec<NodeId> = self
                .known
                .keys()
                .copied()
                .filter(|id| self_peers.contains(id))
                .collect();
            for candidate in candidates {
                self.extra_drop = Some(candidate);
                self.recalc();
                let prosperity = self.prosperity();
                if prosperity > best_prosperity {
                    best = Some(candidate);
                    best_prosperity = prosperity;
                }
            }
            self.extra_drop = None;
            self.conn_count += 1;
        }

        let best = best?;
        Some(if self_peers.contains(&best) {
            TopologyMove::Drop(best)
        } else {
            TopologyMove::Connect(best)
        })
    }
}
