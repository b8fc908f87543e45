//! Graph reachability scan.
//!
//! Unweighted wave expansion (BFS) over a caller-supplied adjacency
//! function. Latency totals are accumulated along the shortest-hop paths,
//! not the globally cheapest paths; within one wave the cheapest entry
//! point into each newly discovered node wins.

use hashbrown::{HashMap, HashSet};

use crate::id::NodeId;

/// Result of a [`scan_graph`] run.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Number of waves needed to exhaust the reachable component.
    pub max_hops: usize,
    /// Mean hop count over all reached nodes (origin excluded); 0 when
    /// nothing is reached.
    pub avg_hops: f64,
    /// Largest cumulative latency observed among reached nodes.
    pub max_latency: f64,
    /// Mean cumulative latency over all reached nodes; 0 when nothing is
    /// reached.
    pub avg_latency: f64,
    /// Nodes of `all` never reached from the origin.
    pub inaccessible: Vec<NodeId>,
}

/// Expand waves from `origin` until no new node is discovered.
///
/// `jump` yields the outgoing edges of a node as `(peer, edge_latency)`
/// pairs; `all` enumerates the full node population so the unreached ones
/// can be reported.
pub fn scan_graph<I, F>(origin: NodeId, all: I, mut jump: F) -> ScanResult
where
    I: IntoIterator<Item = NodeId>,
    F: FnMut(NodeId) -> Vec<(NodeId, f64)>,
{
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut wave: HashMap<NodeId, f64> = HashMap::new();
    let mut next_wave: HashMap<NodeId, f64> = HashMap::new();
    visited.insert(origin);
    wave.insert(origin, 0.0);

    let mut res = ScanResult::default();
    let mut reached = 0usize;
    let mut hops_total = 0.0;
    let mut latency_total = 0.0;

    loop {
        for (&node_id, &cur_latency) in &wave {
            for (peer_id, edge_latency) in jump(node_id) {
                if visited.contains(&peer_id) {
                    continue;
                }
                let latency = cur_latency + edge_latency;
                next_wave
                    .entry(peer_id)
                    .and_modify(|best| {
                        if *best > latency {
                            *best = latency;
                        }
                    })
                    .or_insert(latency);
            }
        }
        if next_wave.is_empty() {
            break;
        }
        res.max_hops += 1;
        for (&node_id, &latency) in &next_wave {
            if res.max_latency < latency {
                res.max_latency = latency;
            }
            visited.insert(node_id);
            reached += 1;
            hops_total += res.max_hops as f64;
            latency_total += latency;
        }
        core::mem::swap(&mut wave, &mut next_wave);
        next_wave.clear();
    }

    if reached > 0 {
        res.avg_hops = hops_total / reached as f64;
        res.avg_latency = latency_total / reached as f64;
    }
    for node_id in all {
        if !visited.contains(&node_id) {
            res.inaccessible.push(node_id);
        }
    }
    res
}
