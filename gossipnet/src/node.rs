//! Per-node state: connections, the peer index, and gossip knowledge.
//!
//! Connection setup is asymmetric. The initiating side creates an outgoing
//! pending connection under a freshly allocated [`ConnId`]; the remote side
//! mirrors it with an incoming pending connection under the same id. Each
//! side flips its own copy to established when the handshake round trip
//! completes, so establishment is per connection, never per peer.
//!
//! All maps are ordered so that iteration during event handling is
//! deterministic for a given seed.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::fallback_latency;
use crate::id::{ConnId, NodeId};
use crate::knowledge::{merge_records, KnowledgeMap, KnownLink, KnownNode};
use crate::physical::PhysicalCell;
use crate::stats::ExpAvg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Pending,
    Established,
}

/// One side of a logical link. The mirror object on the peer carries the
/// same [`ConnId`] with the opposite direction.
#[derive(Debug, Clone)]
pub struct Connection {
    conn_id: ConnId,
    peer_id: NodeId,
    direction: ConnDirection,
    status: ConnStatus,
    /// Moving average of round trips observed on this connection.
    pub latency: ExpAvg,
}

impl Connection {
    fn new(conn_id: ConnId, peer_id: NodeId, direction: ConnDirection) -> Self {
        Self {
            conn_id,
            peer_id,
            direction,
            status: ConnStatus::Pending,
            latency: ExpAvg::new(),
        }
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    pub fn peer_id(&self) -> NodeId {
        self.peer_id
    }

    pub fn is_established(&self) -> bool {
        self.status == ConnStatus::Established
    }

    pub fn is_incoming(&self) -> bool {
        self.direction == ConnDirection::Incoming
    }

    pub fn is_outgoing(&self) -> bool {
        self.direction == ConnDirection::Outgoing
    }
}

/// A cluster member.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    idx: usize,
    cell: PhysicalCell,

    conn_by_id: BTreeMap<ConnId, Connection>,
    conn_by_peer: BTreeMap<NodeId, BTreeSet<ConnId>>,

    self_info_version: u64,
    known_nodes: KnowledgeMap,
    known_direct_latency: BTreeMap<NodeId, ExpAvg>,
}

impl Node {
    pub(crate) fn new(id: NodeId, idx: usize, cell: PhysicalCell) -> Self {
        Self {
            id,
            idx,
            cell,
            conn_by_id: BTreeMap::new(),
            conn_by_peer: BTreeMap::new(),
            self_info_version: 0,
            known_nodes: KnowledgeMap::new(),
            known_direct_latency: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Position in the cluster's node vector.
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub(crate) fn set_idx(&mut self, idx: usize) {
        self.idx = idx;
    }

    pub fn cell(&self) -> PhysicalCell {
        self.cell
    }

    // Connection lifecycle

    /// Open an outgoing pending connection toward `peer_id` under the
    /// pre-allocated `conn_id`.
    pub fn connect(&mut self, conn_id: ConnId, peer_id: NodeId) {
        debug_assert!(!self.has_conn(conn_id));
        self.conn_by_id
            .insert(conn_id, Connection::new(conn_id, peer_id, ConnDirection::Outgoing));
        self.conn_by_peer.entry(peer_id).or_default().insert(conn_id);
    }

    /// Mirror a connection initiated by `peer_id` under the id it chose.
    pub fn accept(&mut self, conn_id: ConnId, peer_id: NodeId) {
        assert!(!self.has_conn(conn_id), "conn {} already present", conn_id);
        self.conn_by_id
            .insert(conn_id, Connection::new(conn_id, peer_id, ConnDirection::Incoming));
        self.conn_by_peer.entry(peer_id).or_default().insert(conn_id);
    }

    /// Flip a pending connection to established; `None` if it is gone.
    pub fn establish(&mut self, conn_id: ConnId) -> Option<&mut Connection> {
        let conn = self.conn_by_id.get_mut(&conn_id)?;
        conn.status = ConnStatus::Established;
        Some(conn)
    }

    /// Drop a connection and its peer-index entry. Unknown ids are ignored:
    /// the peer may have disconnected first.
    pub fn disconnect(&mut self, conn_id: ConnId) {
        let Some(conn) = self.conn_by_id.remove(&conn_id) else {
            return;
        };
        if let Some(conns) = self.conn_by_peer.get_mut(&conn.peer_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                self.conn_by_peer.remove(&conn.peer_id);
            }
        }
    }

    // Connection queries

    pub fn conn_count(&self) -> usize {
        self.conn_by_id.len()
    }

    pub fn conns(&self) -> &BTreeMap<ConnId, Connection> {
        &self.conn_by_id
    }

    pub fn has_conn(&self, conn_id: ConnId) -> bool {
        self.conn_by_id.contains_key(&conn_id)
    }

    pub fn conn(&self, conn_id: ConnId) -> Option<&Connection> {
        self.conn_by_id.get(&conn_id)
    }

    pub fn conn_mut(&mut self, conn_id: ConnId) -> Option<&mut Connection> {
        self.conn_by_id.get_mut(&conn_id)
    }

    // Peer queries

    pub fn peer_count(&self) -> usize {
        self.conn_by_peer.len()
    }

    pub fn peers_raw(&self) -> &BTreeMap<NodeId, BTreeSet<ConnId>> {
        &self.conn_by_peer
    }

    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.conn_by_peer.keys().copied()
    }

    pub fn has_peer(&self, peer_id: NodeId) -> bool {
        self.conn_by_peer.contains_key(&peer_id)
    }

    pub fn peer_conns(&self, peer_id: NodeId) -> Option<&BTreeSet<ConnId>> {
        self.conn_by_peer.get(&peer_id)
    }

    /// A peer counts as established when at least one connection to it is.
    pub fn has_established_peer(&self, peer_id: NodeId) -> bool {
        self.conn_by_peer
            .get(&peer_id)
            .is_some_and(|conns| self.any_established(conns))
    }

    pub fn established_peers(&self) -> Vec<NodeId> {
        self.conn_by_peer
            .iter()
            .filter(|(_, conns)| self.any_established(conns))
            .map(|(&peer_id, _)| peer_id)
            .collect()
    }

    /// First established connection to the peer, in [`ConnId`] order.
    pub fn established_peer_conn(&self, peer_id: NodeId) -> Option<ConnId> {
        self.conn_by_peer.get(&peer_id)?.iter().copied().find(|&c| {
            self.conn_by_id
                .get(&c)
                .is_some_and(Connection::is_established)
        })
    }

    fn any_established(&self, conns: &BTreeSet<ConnId>) -> bool {
        conns.iter().any(|c| {
            self.conn_by_id
                .get(c)
                .is_some_and(Connection::is_established)
        })
    }

    // Knowledge exchange

    /// Rebuild and version-bump the published self record, then hand out the
    /// whole knowledge map for gossiping. A peer is listed once it also has
    /// a gossip record, with the measured direct latency or the pessimistic
    /// fallback.
    pub fn prepare_knowledge(&mut self) -> &KnowledgeMap {
        self.self_info_version += 1;
        let mut me = KnownNode {
            info_version: self.self_info_version,
            peers: BTreeMap::new(),
        };
        for peer_id in self.conn_by_peer.keys().copied() {
            if !self.known_nodes.contains_key(&peer_id) {
                continue;
            }
            me.peers.insert(
                peer_id,
                KnownLink {
                    latency: self.get_known_latency(peer_id),
                },
            );
        }
        self.known_nodes.insert(self.id, me);
        &self.known_nodes
    }

    /// Merge gossiped records, newest version per subject winning.
    pub fn apply_knowledge(&mut self, incoming: &KnowledgeMap) {
        merge_records(&mut self.known_nodes, incoming);
    }

    /// Smoothed direct round-trip latency toward a peer, or the pessimistic
    /// fallback when none has been measured.
    pub fn get_known_latency(&self, peer_id: NodeId) -> f64 {
        self.known_direct_latency
            .get(&peer_id)
            .map(ExpAvg::get)
            .unwrap_or_else(fallback_latency)
    }

    /// Feed a measured round trip into the per-peer moving average.
    pub fn update_direct_latency(&mut self, peer_id: NodeId, rtt: f64) {
        self.known_direct_latency
            .entry(peer_id)
            .or_default()
            .update(rtt);
    }

    pub fn known_nodes(&self) -> &KnowledgeMap {
        &self.known_nodes
    }

    pub fn self_info_version(&self) -> u64 {
        self.self_info_version
    }
}
