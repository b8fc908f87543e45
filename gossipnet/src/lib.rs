//! gossipnet - model of a self-organizing gossip overlay.
//!
//! A cluster of nodes spread over data centers and racks discovers itself
//! through gossip, measures peer latency with heartbeats, and continuously
//! rewires its connection set toward a near-optimal topology. This crate
//! holds the pure model: registry, per-node connection state, knowledge
//! exchange, and the topology search. Driving it over virtual time is the
//! simulator crate's job.
//!
//! # Example
//!
//! ```
//! use gossipnet::Cluster;
//! use rand::SeedableRng;
//!
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
//! let mut cluster = Cluster::new();
//! let a = cluster.add_node(&mut rng);
//! let b = cluster.add_node(&mut rng);
//!
//! // Open a connection from a to b and mirror it on the b side.
//! let conn = cluster.open_connection(a, b).unwrap();
//! cluster.find_node_mut(b).unwrap().accept(conn, a);
//! ```
//!
//! # Module Structure
//!
//! - [`id`] - node and connection identifiers
//! - [`time`] - virtual-time types (microseconds)
//! - [`config`] - protocol constants
//! - [`random`] - distribution helpers over a caller-owned RNG
//! - [`stats`] - latency smoothing
//! - [`physical`] - DC/rack placement and ping latency
//! - [`scan`] - graph reachability scan
//! - [`knowledge`] - gossip-published records and the merge rule
//! - [`node`] - connection table, peer index, knowledge operations
//! - [`cluster`] - the registry owning all nodes
//! - [`optimizer`] - prosperity scoring and the add/drop search

pub mod cluster;
pub mod config;
pub mod id;
pub mod knowledge;
pub mod node;
pub mod optimizer;
pub mod physical;
pub mod random;
pub mod scan;
pub mod stats;
pub mod time;

// Re-export main types at crate root
pub use cluster::Cluster;
pub use id::{ConnId, NodeId};
pub use knowledge::{KnowledgeMap, KnownLink, KnownNode};
pub use node::{ConnDirection, ConnStatus, Connection, Node};
pub use optimizer::{optimal_conn_count, TopologyMove, TopologyView};
pub use physical::{PhysicalCell, PhysicalTopology};
pub use scan::{scan_graph, ScanResult};
pub use stats::ExpAvg;
pub use time::{Duration, Timestamp};
