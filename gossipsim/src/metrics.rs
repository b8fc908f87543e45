//! Cluster health reporting.

use std::fmt;

use gossipnet::{scan_graph, Cluster};

/// Cluster-wide health summary: per-node maxima over a graph scan from
/// every node, using the measured (moving-average) connection latencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterStatus {
    /// Worst scan depth observed from any node.
    pub max_hops: usize,
    /// Largest connection table, pending connections included.
    pub max_conns: usize,
    /// Worst cumulative latency observed in any scan.
    pub max_latency: f64,
    /// Unreachable nodes summed over all scans.
    pub unknown_node_count: usize,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{max_hops = {}, max_conns = {}, max_latency = {:.2}, unknown_node_count = {}}}",
            self.max_hops, self.max_conns, self.max_latency, self.unknown_node_count
        )
    }
}

/// Scan the real overlay from every node. Edges are established peers; the
/// edge weight is the latency average of the first established connection.
/// A scan stepping onto a node that left the cluster finds no edges there.
pub fn cluster_status(cluster: &Cluster) -> ClusterStatus {
    let mut res = ClusterStatus::default();
    let jump = |id| {
        let Some(node) = cluster.find_node(id) else {
            return Vec::new();
        };
        node.established_peers()
            .into_iter()
            .filter_map(|peer_id| {
                let conn_id = node.established_peer_conn(peer_id)?;
                let latency = node.conn(conn_id)?.latency.get();
                Some((peer_id, latency))
            })
            .collect()
    };
    for node in cluster.nodes() {
        res.max_conns = res.max_conns.max(node.conn_count());

        let scan = scan_graph(node.id(), cluster.node_ids(), jump);
        res.max_hops = res.max_hops.max(scan.max_hops);
        if res.max_latency < scan.max_latency {
            res.max_latency = scan.max_latency;
        }
        res.unknown_node_count += scan.inaccessible.len();
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let status = ClusterStatus {
            max_hops: 2,
            max_conns: 5,
            max_latency: 10234.5678,
            unknown_node_count: 1,
        };
        assert_eq!(
            status.to_string(),
            "{max_hops = 2, max_conns = 5, max_latency = 10234.57, unknown_node_count = 1}"
        );
    }

    #[test]
    fn test_empty_cluster_status() {
        let status = cluster_status(&Cluster::new());
        assert_eq!(status, ClusterStatus::default());
    }
}
