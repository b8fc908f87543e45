//! Physical placement of nodes and the latency between them.
//!
//! The world is a fixed grid of [`NUM_DC`] data centers with [`NUM_RACKS`]
//! racks each. Fresh nodes are placed with an anti-clustering bias so the
//! population spreads out, and the one-way latency between two nodes is a
//! function of how far apart their cells are, inflated by lognormal jitter.

use rand::Rng;

use crate::config::{
    BAD_PEER_LATENCY, CROSS_DC_LATENCY, CROSS_RACK_LATENCY, LATENCY_RANDOM_COEF, MINIMAL_LATENCY,
    NUM_DC, NUM_RACKS,
};
use crate::random::{choose_weighted, pessimistic_log_normal};
use crate::time::Duration;

/// Grid coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalCell {
    pub dc: usize,
    pub rack: usize,
}

impl PhysicalCell {
    /// Distance-based latency before jitter. An unresolvable peer is billed
    /// at the worst rate.
    pub fn base_latency_to(self, peer: Option<PhysicalCell>) -> Duration {
        match peer {
            None => BAD_PEER_LATENCY,
            Some(p) if p.dc != self.dc => CROSS_DC_LATENCY,
            Some(p) if p.rack != self.rack => CROSS_RACK_LATENCY,
            Some(_) => MINIMAL_LATENCY,
        }
    }

    /// One simulated ping: base latency times a pessimistic lognormal
    /// multiplier, so jitter only ever adds.
    pub fn latency_to(self, peer: Option<PhysicalCell>, rng: &mut impl Rng) -> Duration {
        self.base_latency_to(peer)
            .mul_f64(pessimistic_log_normal(rng, LATENCY_RANDOM_COEF))
    }
}

/// Cell occupancy bookkeeping. Placement and removal must keep the table in
/// sync with the live node population.
#[derive(Debug, Clone)]
pub struct PhysicalTopology {
    counts: Vec<usize>,
}

impl Default for PhysicalTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalTopology {
    pub fn new() -> Self {
        Self {
            counts: vec![0; NUM_DC * NUM_RACKS],
        }
    }

    /// Pick a cell for a fresh node, weighted by `1 / (count + 0.5)` so
    /// crowded cells are avoided, and record the occupant.
    pub fn place(&mut self, rng: &mut impl Rng) -> PhysicalCell {
        let i = choose_weighted(rng, self.counts.iter().map(|&c| 1.0 / (c as f64 + 0.5)));
        self.counts[i] += 1;
        PhysicalCell {
            dc: i / NUM_RACKS,
            rack: i % NUM_RACKS,
        }
    }

    /// Release the cell of a removed node.
    pub fn unregister(&mut self, cell: PhysicalCell) {
        let i = cell.dc * NUM_RACKS + cell.rack;
        debug_assert!(self.counts[i] > 0, "cell {:?} not occupied", cell);
        self.counts[i] -= 1;
    }

    pub fn occupancy(&self, cell: PhysicalCell) -> usize {
        self.counts[cell.dc * NUM_RACKS + cell.rack]
    }

    /// Total number of placed nodes.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_base_latency_by_distance() {
        let a = PhysicalCell { dc: 0, rack: 0 };
        let same_rack = PhysicalCell { dc: 0, rack: 0 };
        let same_dc = PhysicalCell { dc: 0, rack: 5 };
        let other_dc = PhysicalCell { dc: 2, rack: 0 };

        assert_eq!(a.base_latency_to(Some(same_rack)), MINIMAL_LATENCY);
        assert_eq!(a.base_latency_to(Some(same_dc)), CROSS_RACK_LATENCY);
        assert_eq!(a.base_latency_to(Some(other_dc)), CROSS_DC_LATENCY);
        assert_eq!(a.base_latency_to(None), BAD_PEER_LATENCY);
    }

    #[test]
    fn test_jitter_only_inflates() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let a = PhysicalCell { dc: 0, rack: 0 };
        let b = PhysicalCell { dc: 1, rack: 3 };
        for _ in 0..500 {
            assert!(a.latency_to(Some(b), &mut rng) >= CROSS_DC_LATENCY);
        }
    }

    #[test]
    fn test_occupancy_tracks_population() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut topo = PhysicalTopology::new();

        let cells: Vec<_> = (0..50).map(|_| topo.place(&mut rng)).collect();
        assert_eq!(topo.total(), 50);
        for &cell in &cells {
            assert!(cell.dc < NUM_DC);
            assert!(cell.rack < NUM_RACKS);
            assert!(topo.occupancy(cell) > 0);
        }

        for &cell in &cells {
            topo.unregister(cell);
        }
        assert_eq!(topo.total(), 0);
    }

    #[test]
    fn test_placement_spreads_out() {
        // With 300 cells and the anti-clustering weight, 100 placements
        // should never pile into one cell.
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut topo = PhysicalTopology::new();
        let mut max_seen = 0;
        for _ in 0..100 {
            let cell = topo.place(&mut rng);
            max_seen = max_seen.max(topo.occupancy(cell));
        }
        assert!(max_seen <= 4, "cell occupancy {} too clustered", max_seen);
    }
}
