//! Protocol constants.
//!
//! All time constants are in microseconds.

use crate::time::Duration;

// Physical layout
pub const NUM_DC: usize = 3;
pub const NUM_RACKS: usize = 100;

/// One-way base latency to a peer that cannot be resolved (e.g. it has left
/// the cluster while a message was in flight).
pub const BAD_PEER_LATENCY: Duration = Duration::from_micros(10_000);
/// One-way base latency between nodes in different data centers.
pub const CROSS_DC_LATENCY: Duration = Duration::from_micros(4_000);
/// One-way base latency between racks of the same data center.
pub const CROSS_RACK_LATENCY: Duration = Duration::from_micros(2_000);
/// One-way base latency within a rack.
pub const MINIMAL_LATENCY: Duration = Duration::from_micros(500);

/// Relative deviation of the lognormal jitter applied to every ping.
/// Must be >= 1. Examples:
/// 1.0 - no random, ping time is fixed.
/// 1.1 - randomly plus around 10%.
/// 2.0 - randomly plus around 100%.
pub const LATENCY_RANDOM_COEF: f64 = 1.1;

// Cluster settings
/// Seed peers a freshly added node connects to.
pub const INITIAL_CONNECT_COUNT: usize = 3;
/// Scale factor of the optimal connection count, applied to sqrt of the
/// known cluster size.
pub const CONN_COEF: f64 = 1.5;

pub const THINK_INTERVAL: Duration = Duration::from_micros(10_000);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_micros(1_000);
pub const GOSSIP_INTERVAL: Duration = Duration::from_micros(5_000);
/// Relative deviation of the lognormal jitter applied to periodic intervals.
pub const INTERVAL_RANDOM_COEF: f64 = 1.1;

/// Smoothing factor of latency moving averages.
pub const EXP_AVG_ALPHA: f64 = 0.05;

/// Latency assumed for a peer no round trip has been measured against yet.
/// Pessimistic: a cross-DC round trip.
pub fn fallback_latency() -> f64 {
    2.0 * CROSS_DC_LATENCY.as_micros() as f64
}
