//! Graphviz rendering of the established overlay.

use std::io::{self, Write};

use gossipnet::config::NUM_DC;
use gossipnet::Cluster;

const DC_COLORS: [&str; NUM_DC] = ["red", "green", "blue"];

/// Emit an undirected DOT graph: one subgraph cluster per data center,
/// nodes colored by DC, and one edge per established connection. Each edge
/// is written once, from its higher-id endpoint, so the mirror connection
/// on the other side does not duplicate it.
pub fn render_dot(cluster: &Cluster, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "graph G {{")?;
    for dc in 0..NUM_DC {
        writeln!(out, "  subgraph cluster{} {{", dc)?;
        writeln!(out, "    label=DC{}", dc)?;
        writeln!(out, "    color={};", DC_COLORS[dc])?;
        writeln!(out, "    node [style=filled];")?;
        for node in cluster.nodes() {
            if node.cell().dc != dc {
                continue;
            }
            writeln!(out, "    n{};", node.id())?;
        }
        writeln!(out, "  }}")?;
    }
    for node in cluster.nodes() {
        for conn in node.conns().values() {
            if !conn.is_established() {
                continue;
            }
            if node.id() < conn.peer_id() {
                continue;
            }
            writeln!(out, "  n{} -- n{};", node.id(), conn.peer_id())?;
        }
    }
    writeln!(out, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_established_edges_only_from_higher_id() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let mut cluster = Cluster::new();
        let a = cluster.add_node(&mut rng);
        let b = cluster.add_node(&mut rng);
        let c = cluster.add_node(&mut rng);

        // a-b established on both sides, a-c still pending.
        let ab = cluster.open_connection(a, b).unwrap();
        cluster.find_node_mut(b).unwrap().accept(ab, a);
        cluster.find_node_mut(a).unwrap().establish(ab);
        cluster.find_node_mut(b).unwrap().establish(ab);
        cluster.open_connection(a, c).unwrap();

        let mut out = Vec::new();
        render_dot(&cluster, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("graph G {"));
        assert!(text.contains("subgraph cluster0"));
        assert_eq!(text.matches(" -- ").count(), 1);
        assert!(text.contains(&format!("  n{} -- n{};", b, a)));
        // Every node is declared in exactly one DC block.
        for id in [a, b, c] {
            assert_eq!(text.matches(&format!("    n{};", id)).count(), 1);
        }
    }
}
