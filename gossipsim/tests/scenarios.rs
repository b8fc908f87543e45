//! End-to-end cluster scenarios.
//!
//! Each test drives a full simulator through grow/settle/churn phases and
//! checks the health the overlay is supposed to reach.

use gossipnet::{optimal_conn_count, Duration};
use gossipsim::Simulator;

/// Advance the simulator, discarding the status transcript.
fn settle(sim: &mut Simulator, micros: u64) {
    let mut sink = Vec::new();
    sim.wait(Duration::from_micros(micros), &mut sink).unwrap();
}

#[test]
fn test_minimal_mesh() {
    let mut sim = Simulator::new(42);
    sim.add_nodes(3);
    settle(&mut sim, 200_000);

    // Three nodes seeded against each other form a full mesh.
    let ids: Vec<_> = sim.cluster().node_ids().collect();
    assert_eq!(ids.len(), 3);
    for &a in &ids {
        for &b in &ids {
            if a != b {
                assert!(
                    sim.cluster().find_node(a).unwrap().has_established_peer(b),
                    "{} not established with {}",
                    a,
                    b
                );
            }
        }
    }

    let status = sim.cluster_status();
    assert_eq!(status.max_hops, 1);
    assert_eq!(status.max_conns, 2);
    assert_eq!(status.unknown_node_count, 0);
    assert!(status.max_latency > 0.0);
}

#[test]
fn test_seeded_growth() {
    let mut sim = Simulator::new(42);
    sim.add_nodes(3);
    settle(&mut sim, 50_000);
    sim.add_nodes(7);
    settle(&mut sim, 1_000_000);

    let status = sim.cluster_status();
    assert_eq!(sim.cluster().len(), 10);
    assert_eq!(status.unknown_node_count, 0, "overlay did not converge");
    assert!(
        status.max_conns <= 2 * optimal_conn_count(10),
        "max_conns {} above twice the optimum",
        status.max_conns
    );
}

#[test]
fn test_churn_resilience() {
    let mut sim = Simulator::new(42);
    sim.add_nodes(20);
    settle(&mut sim, 500_000);
    sim.del_nodes(5);
    settle(&mut sim, 500_000);

    assert_eq!(sim.cluster().len(), 15);
    let status = sim.cluster_status();
    assert_eq!(
        status.unknown_node_count, 0,
        "survivors did not re-knit the overlay"
    );
    // Knowledge maps still hold records of the departed, so the bound uses
    // the largest population any node ever learned about.
    assert!(
        status.max_conns <= 2 * optimal_conn_count(20),
        "max_conns {} above twice the optimum",
        status.max_conns
    );
}

#[test]
fn test_disconnect_symmetry_after_churn() {
    let mut sim = Simulator::new(42);
    sim.add_nodes(10);
    settle(&mut sim, 300_000);
    sim.del_nodes(3);
    settle(&mut sim, 300_000);

    // Departed nodes keep being advertised by stale gossip records, so
    // pending connection attempts toward them are legal; an *established*
    // connection to one is not, once heartbeats have had time to sweep.
    for node in sim.cluster().nodes() {
        for conn in node.conns().values() {
            if conn.is_established() {
                assert!(
                    sim.cluster().find_node(conn.peer_id()).is_some(),
                    "node {} still established with departed {}",
                    node.id(),
                    conn.peer_id()
                );
            }
        }
    }
}

#[test]
fn test_peer_index_integrity_through_churn() {
    let mut sim = Simulator::new(1234);
    sim.add_nodes(12);
    settle(&mut sim, 250_000);
    sim.del_nodes(4);
    settle(&mut sim, 150_000);
    sim.add_nodes(5);
    settle(&mut sim, 250_000);

    for node in sim.cluster().nodes() {
        let indexed: usize = node.peers_raw().values().map(|conns| conns.len()).sum();
        assert_eq!(indexed, node.conn_count());
        for (peer_id, conns) in node.peers_raw() {
            for &conn_id in conns {
                let conn = node.conn(conn_id).expect("peer index points at live conn");
                assert_eq!(conn.peer_id(), *peer_id);
            }
        }
    }
}

#[test]
fn test_empty_wait_reports_idle() {
    let mut sim = Simulator::new(42);
    let mut out = Vec::new();
    sim.wait(Duration::from_micros(1_000), &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "No more to do\n");
}

#[test]
fn test_status_lines_appear_during_long_wait() {
    let mut sim = Simulator::new(42);
    sim.add_nodes(5);
    let mut out = Vec::new();
    sim.wait(Duration::from_micros(100_000), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    // Roughly one report per 10ms of virtual time, plus the final one.
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines.len() >= 5, "only {} status lines", lines.len());
    for line in lines {
        assert!(line.starts_with("{max_hops = "), "unexpected line {line:?}");
        assert!(line.ends_with('}'));
    }
}
