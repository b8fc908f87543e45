//! gossipsim - discrete event simulator for gossipnet overlays.
//!
//! Runs a whole cluster in one process over virtual time: no wall-clock
//! sleeps, no threads, one seeded RNG. The main loop pops jobs off a
//! priority queue ordered by (fire_time, insertion sequence), so a run is
//! fully determined by the seed and the command script.
//!
//! # Example
//!
//! ```
//! use gossipsim::Simulator;
//! use gossipnet::Duration;
//!
//! let mut sim = Simulator::new(42);
//! sim.add_nodes(3);
//!
//! let mut transcript = Vec::new();
//! sim.wait(Duration::from_micros(200_000), &mut transcript).unwrap();
//! assert_eq!(sim.cluster_status().unknown_node_count, 0);
//! ```
//!
//! # Architecture
//!
//! 1. Pop the earliest job from the queue
//! 2. Advance virtual time to its fire time
//! 3. Resolve the node/connection ids it carries against the cluster
//! 4. Mutate state and schedule follow-up jobs
//!
//! Jobs whose target left the cluster drop silently; mid-handshake jobs
//! schedule a compensating disconnect on the surviving endpoint instead.

pub mod dot;
pub mod event;
pub mod metrics;
pub mod repl;
pub mod scheduler;
pub mod sim;

// Re-export main types
pub use dot::render_dot;
pub use event::{Job, ScheduledJob, SequenceNumber};
pub use metrics::{cluster_status, ClusterStatus};
pub use repl::{run, Command, CommandError};
pub use scheduler::EventQueue;
pub use sim::Simulator;
