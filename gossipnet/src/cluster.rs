//! Cluster registry.
//!
//! Owns every node, the id lookup table, the id allocators, and the
//! physical occupancy table. Events reference nodes by id and must treat a
//! failed lookup as "the node has left; drop the work".

use hashbrown::HashMap;
use rand::Rng;
use tracing::debug;

use crate::id::{ConnId, NodeId};
use crate::node::Node;
use crate::physical::{PhysicalCell, PhysicalTopology};
use crate::time::Duration;

#[derive(Debug, Default)]
pub struct Cluster {
    nodes: Vec<Node>,
    id_to_idx: HashMap<NodeId, usize>,
    next_node_id: u64,
    /// Shared connection id allocator. A single counter keeps ids unique
    /// across the cluster, so a connection id echoed to the accepting side
    /// can never collide with one that side allocates itself.
    next_conn_id: u64,
    physical: PhysicalTopology,
}

impl Cluster {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            id_to_idx: HashMap::new(),
            next_node_id: 0,
            next_conn_id: 0,
            physical: PhysicalTopology::new(),
        }
    }

    /// Place and register a fresh node, returning its id.
    pub fn add_node(&mut self, rng: &mut impl Rng) -> NodeId {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;
        let idx = self.nodes.len();
        let cell = self.physical.place(rng);
        debug!(node = %id, dc = cell.dc, rack = cell.rack, "node added");
        self.nodes.push(Node::new(id, idx, cell));
        self.id_to_idx.insert(id, idx);
        id
    }

    /// Remove a uniformly random node with the swap-with-last idiom.
    /// Returns the removed id, or `None` on an empty cluster.
    pub fn del_random_node(&mut self, rng: &mut impl Rng) -> Option<NodeId> {
        if self.nodes.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.nodes.len());
        let node = self.nodes.swap_remove(idx);
        self.id_to_idx.remove(&node.id());
        if idx < self.nodes.len() {
            self.nodes[idx].set_idx(idx);
            self.id_to_idx.insert(self.nodes[idx].id(), idx);
        }
        self.physical.unregister(node.cell());
        debug!(node = %node.id(), "node removed");
        Some(node.id())
    }

    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        self.id_to_idx.get(&id).map(|&idx| &self.nodes[idx])
    }

    pub fn find_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let idx = *self.id_to_idx.get(&id)?;
        Some(&mut self.nodes[idx])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node ids in node-vector order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(Node::id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a connection id and open the outgoing pending connection on
    /// `origin`. `None` when the originating node has left.
    pub fn open_connection(&mut self, origin: NodeId, peer: NodeId) -> Option<ConnId> {
        let idx = *self.id_to_idx.get(&origin)?;
        let conn_id = ConnId::new(self.next_conn_id);
        self.next_conn_id += 1;
        self.nodes[idx].connect(conn_id, peer);
        Some(conn_id)
    }

    /// One simulated ping from `from` toward `to`, jitter included. The
    /// sender must exist; an unresolvable receiver is billed at the
    /// bad-peer rate.
    pub fn ping_latency(&self, from: NodeId, to: NodeId, rng: &mut impl Rng) -> Duration {
        let origin = self.find_node(from).expect("ping origin must be alive");
        let peer_cell = self.find_node(to).map(Node::cell);
        origin.cell().latency_to(peer_cell, rng)
    }

    pub fn physical(&self) -> &PhysicalTopology {
        &self.physical
    }

    /// Cells of all live nodes; used by occupancy checks.
    pub fn cells(&self) -> impl Iterator<Item = PhysicalCell> + '_ {
        self.nodes.iter().map(Node::cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn assert_registry_consistent(cluster: &Cluster) {
        assert_eq!(cluster.len(), cluster.nodes().len());
        for (idx, node) in cluster.nodes().iter().enumerate() {
            assert_eq!(node.idx(), idx);
            assert_eq!(cluster.find_node(node.id()).map(Node::id), Some(node.id()));
        }
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut cluster = Cluster::new();

        let first: Vec<NodeId> = (0..5).map(|_| cluster.add_node(&mut rng)).collect();
        for _ in 0..5 {
            cluster.del_random_node(&mut rng);
        }
        let second: Vec<NodeId> = (0..5).map(|_| cluster.add_node(&mut rng)).collect();

        for id in second {
            assert!(!first.contains(&id));
        }
    }

    #[test]
    fn test_swap_remove_keeps_registry_consistent() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let mut cluster = Cluster::new();
        for _ in 0..20 {
            cluster.add_node(&mut rng);
        }
        assert_registry_consistent(&cluster);

        for _ in 0..15 {
            let removed = cluster.del_random_node(&mut rng).unwrap();
            assert!(cluster.find_node(removed).is_none());
            assert_registry_consistent(&cluster);
        }
        assert_eq!(cluster.len(), 5);
    }

    #[test]
    fn test_del_on_empty_cluster() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let mut cluster = Cluster::new();
        assert_eq!(cluster.del_random_node(&mut rng), None);
    }

    #[test]
    fn test_occupancy_follows_membership() {
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let mut cluster = Cluster::new();
        for _ in 0..30 {
            cluster.add_node(&mut rng);
        }
        assert_eq!(cluster.physical().total(), 30);
        for cell in cluster.cells() {
            assert!(cluster.physical().occupancy(cell) > 0);
        }

        for _ in 0..30 {
            cluster.del_random_node(&mut rng);
        }
        assert_eq!(cluster.physical().total(), 0);
    }

    #[test]
    fn test_open_connection_allocates_fresh_ids() {
        let mut rng = ChaCha8Rng::seed_from_u64(25);
        let mut cluster = Cluster::new();
        let a = cluster.add_node(&mut rng);
        let b = cluster.add_node(&mut rng);

        let c1 = cluster.open_connection(a, b).unwrap();
        let c2 = cluster.open_connection(b, a).unwrap();
        assert_ne!(c1, c2);
        assert!(cluster.find_node(a).unwrap().has_conn(c1));
        assert!(cluster.find_node(b).unwrap().has_conn(c2));

        assert_eq!(cluster.open_connection(NodeId::new(999), a), None);
    }

    #[test]
    fn test_ping_latency_uses_bad_peer_rate_for_ghosts() {
        use crate::config::BAD_PEER_LATENCY;

        let mut rng = ChaCha8Rng::seed_from_u64(26);
        let mut cluster = Cluster::new();
        let a = cluster.add_node(&mut rng);

        let lat = cluster.ping_latency(a, NodeId::new(404), &mut rng);
        assert!(lat >= BAD_PEER_LATENCY);
    }
}
