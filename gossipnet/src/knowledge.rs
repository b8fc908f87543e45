//! Gossip-published cluster knowledge.
//!
//! Every node periodically publishes a [`KnownNode`] record describing
//! itself: the peers it is connected to, the latency it believes it has to
//! each, and a version counter it alone increments. Records spread through
//! gossip and are merged with a newest-version-wins rule; versions of
//! different nodes are never compared with each other.

use std::collections::BTreeMap;

use crate::id::NodeId;

/// Published latency toward one peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownLink {
    pub latency: f64,
}

/// A node's published view of itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownNode {
    pub peers: BTreeMap<NodeId, KnownLink>,
    pub info_version: u64,
}

/// Everything a node has heard about the cluster, keyed by subject.
pub type KnowledgeMap = BTreeMap<NodeId, KnownNode>;

/// Merge incoming records: a record replaces the local copy only when none
/// exists yet or its version is strictly newer.
pub fn merge_records(into: &mut KnowledgeMap, incoming: &KnowledgeMap) {
    for (&node_id, info) in incoming {
        match into.get(&node_id) {
            Some(existing) if existing.info_version >= info.info_version => {}
            _ => {
                into.insert(node_id, info.clone());
            }
        }
    }
}
