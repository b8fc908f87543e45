//! The discrete-event simulator.
//!
//! [`Simulator`] owns the cluster, the event queue, and the one seeded RNG;
//! everything that happens is a [`Job`] firing. Handlers re-resolve node and
//! connection ids against the cluster and silently drop work whose target
//! has left; a handshake or heartbeat leg that finds its counterpart gone
//! schedules the compensating disconnect on the surviving side instead, so
//! no half-open connection outlives one round of traffic.

use std::io::{self, Write};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use gossipnet::config::{
    GOSSIP_INTERVAL, HEARTBEAT_INTERVAL, INITIAL_CONNECT_COUNT, INTERVAL_RANDOM_COEF,
    THINK_INTERVAL,
};
use gossipnet::random::pessimistic_log_normal;
use gossipnet::{
    Cluster, ConnId, Duration, KnowledgeMap, NodeId, Timestamp, TopologyMove, TopologyView,
};

use crate::event::Job;
use crate::metrics::{cluster_status, ClusterStatus};
use crate::scheduler::EventQueue;

/// Virtual time between cluster status reports during a wait.
const REPORT_INTERVAL: Duration = Duration::from_micros(10_000);

pub struct Simulator {
    cluster: Cluster,
    queue: EventQueue,
    rng: ChaCha8Rng,
}

impl Simulator {
    /// Create a simulator; the seed fixes the entire run.
    pub fn new(seed: u64) -> Self {
        Self {
            cluster: Cluster::new(),
            queue: EventQueue::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// Current virtual time.
    pub fn now(&self) -> Timestamp {
        self.queue.now()
    }

    /// Whether any work is pending.
    pub fn more(&self) -> bool {
        self.queue.more()
    }

    pub fn cluster_status(&self) -> ClusterStatus {
        cluster_status(&self.cluster)
    }

    /// Create `count` nodes. Each one connects to a seed set drawn from the
    /// nodes that already exist; while fewer than the target seed count
    /// exist, the batch's own fresh nodes join the seed list.
    pub fn add_nodes(&mut self, count: usize) {
        debug!(count, "adding nodes");
        let mut seeds: Vec<NodeId> = Vec::with_capacity(INITIAL_CONNECT_COUNT);
        if self.cluster.len() <= INITIAL_CONNECT_COUNT {
            seeds.extend(self.cluster.node_ids());
        } else {
            while seeds.len() < INITIAL_CONNECT_COUNT {
                let idx = self.rng.gen_range(0..self.cluster.len());
                let id = self.cluster.nodes()[idx].id();
                if !seeds.contains(&id) {
                    seeds.push(id);
                }
            }
        }

        for _ in 0..count {
            let id = self.cluster.add_node(&mut self.rng);
            for &peer in &seeds {
                self.schedule(Job::Connect { origin: id, peer });
            }
            self.schedule(Job::Heartbeat { node: id });
            self.schedule(Job::Gossip { node: id });
            self.schedule(Job::Topology { node: id });
            if seeds.len() < INITIAL_CONNECT_COUNT {
                seeds.push(id);
            }
        }
    }

    /// Remove `count` uniformly random nodes. Jobs referencing them are
    /// left in the queue and die when they fire.
    pub fn del_nodes(&mut self, count: usize) {
        debug!(count, "removing nodes");
        for _ in 0..count {
            self.cluster.del_random_node(&mut self.rng);
        }
    }

    /// Fire events for up to `span` of virtual time, reporting the cluster
    /// status every [`REPORT_INTERVAL`] and once at the end. Events due
    /// beyond the deadline stay queued; time still advances to the
    /// deadline. An idle simulator reports `No more to do` instead.
    pub fn wait(&mut self, span: Duration, out: &mut impl Write) -> io::Result<()> {
        if !self.queue.more() {
            writeln!(out, "No more to do")?;
            return Ok(());
        }
        let deadline = self.queue.now() + span;
        let mut last_report = self.queue.now();
        while self.queue.peek_time().is_some_and(|t| t <= deadline) {
            let Some(job) = self.queue.pop() else { break };
            self.fire(job);
            if self.queue.now() > last_report + REPORT_INTERVAL {
                writeln!(out, "{}", self.cluster_status())?;
                last_report = self.queue.now();
            }
        }
        self.queue.advance_to(deadline);
        writeln!(out, "{}", self.cluster_status())?;
        Ok(())
    }

    /// Enqueue a job after its kind-specific delay: nothing for local
    /// bookkeeping, one ping for a message leg, a jittered interval for the
    /// periodic jobs.
    pub fn schedule(&mut self, job: Job) {
        let delay = match &job {
            Job::Connect { .. } | Job::Disconnect { .. } => Duration::ZERO,
            Job::ConnectAccept { origin, peer, .. }
            | Job::ConnectNotifyPeer { origin, peer, .. }
            | Job::HeartbeatForth { origin, peer, .. }
            | Job::GossipSend { origin, peer, .. } => self.ping(*origin, *peer),
            Job::ConnectNotifyNode { origin, peer, .. }
            | Job::HeartbeatBack { origin, peer, .. } => self.ping(*peer, *origin),
            Job::DisconnectPeer { node, peer, .. } => self.ping(*node, *peer),
            Job::Heartbeat { .. } => self.jittered(HEARTBEAT_INTERVAL),
            Job::Gossip { .. } => self.jittered(GOSSIP_INTERVAL),
            Job::Topology { .. } => self.jittered(THINK_INTERVAL),
        };
        self.queue.schedule(delay, job);
    }

    /// One simulated ping; the sender must still exist.
    fn ping(&mut self, from: NodeId, to: NodeId) -> Duration {
        self.cluster.ping_latency(from, to, &mut self.rng)
    }

    fn jittered(&mut self, interval: Duration) -> Duration {
        interval.mul_f64(pessimistic_log_normal(&mut self.rng, INTERVAL_RANDOM_COEF))
    }

    fn fire(&mut self, job: Job) {
        trace!(now = self.queue.now().as_micros(), job = ?job, "firing");
        match job {
            Job::Connect { origin, peer } => self.fire_connect(origin, peer),
            Job::ConnectAccept {
                origin,
                peer,
                conn,
                time_start,
            } => self.fire_connect_accept(origin, peer, conn, time_start),
            Job::ConnectNotifyNode {
                origin,
                peer,
                conn,
                time_start,
                time_accept,
            } => self.fire_connect_notify_node(origin, peer, conn, time_start, time_accept),
            Job::ConnectNotifyPeer {
                origin,
                peer,
                conn,
                time_accept,
            } => self.fire_connect_notify_peer(origin, peer, conn, time_accept),
            Job::Disconnect { node, conn } => self.fire_disconnect(node, conn),
            Job::DisconnectPeer { node: _, peer, conn } => self.fire_disconnect_peer(peer, conn),
            Job::Heartbeat { node } => self.fire_heartbeat(node),
            Job::HeartbeatForth {
                origin,
                peer,
                conn,
                time_start,
            } => self.fire_heartbeat_forth(origin, peer, conn, time_start),
            Job::HeartbeatBack {
                origin,
                peer,
                conn,
                time_start,
            } => self.fire_heartbeat_back(origin, peer, conn, time_start),
            Job::Gossip { node } => self.fire_gossip(node),
            Job::GossipSend {
                origin: _,
                peer,
                knowledge,
            } => self.fire_gossip_send(peer, &knowledge),
            Job::Topology { node } => self.fire_topology(node),
        }
    }

    // Connection handshake

    fn fire_connect(&mut self, origin: NodeId, peer: NodeId) {
        let Some(conn) = self.cluster.open_connection(origin, peer) else {
            return;
        };
        let time_start = self.queue.now();
        self.schedule(Job::ConnectAccept {
            origin,
            peer,
            conn,
            time_start,
        });
    }

    fn fire_connect_accept(
        &mut self,
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
    ) {
        let Some(peer_node) = self.cluster.find_node_mut(peer) else {
            self.schedule(Job::Disconnect { node: origin, conn });
            return;
        };
        peer_node.accept(conn, origin);
        let time_accept = self.queue.now();
        self.schedule(Job::ConnectNotifyNode {
            origin,
            peer,
            conn,
            time_start,
            time_accept,
        });
    }

    fn fire_connect_notify_node(
        &mut self,
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
        time_accept: Timestamp,
    ) {
        let rtt = (self.queue.now() - time_start).as_micros() as f64;
        let mut established = false;
        if let Some(node) = self.cluster.find_node_mut(origin) {
            if let Some(c) = node.establish(conn) {
                c.latency.update(rtt);
                node.update_direct_latency(peer, rtt);
                established = true;
            }
        }
        if established {
            self.schedule(Job::ConnectNotifyPeer {
                origin,
                peer,
                conn,
                time_accept,
            });
        } else {
            self.schedule(Job::Disconnect { node: peer, conn });
        }
    }

    fn fire_connect_notify_peer(
        &mut self,
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_accept: Timestamp,
    ) {
        let rtt = (self.queue.now() - time_accept).as_micros() as f64;
        let mut established = false;
        if let Some(peer_node) = self.cluster.find_node_mut(peer) {
            if let Some(c) = peer_node.establish(conn) {
                c.latency.update(rtt);
                peer_node.update_direct_latency(origin, rtt);
                established = true;
            }
        }
        if !established {
            self.schedule(Job::Disconnect { node: origin, conn });
        }
    }

    // Disconnect propagation

    fn fire_disconnect(&mut self, node_id: NodeId, conn: ConnId) {
        let Some(node) = self.cluster.find_node_mut(node_id) else {
            return;
        };
        let Some(peer_id) = node.conn(conn).map(|c| c.peer_id()) else {
            return;
        };
        node.disconnect(conn);
        self.schedule(Job::DisconnectPeer {
            node: node_id,
            peer: peer_id,
            conn,
        });
    }

    fn fire_disconnect_peer(&mut self, peer: NodeId, conn: ConnId) {
        if let Some(peer_node) = self.cluster.find_node_mut(peer) {
            peer_node.disconnect(conn);
        }
    }

    // Heartbeats

    fn fire_heartbeat(&mut self, node_id: NodeId) {
        let Some(node) = self.cluster.find_node(node_id) else {
            return;
        };
        let conns: Vec<(ConnId, NodeId)> = node
            .conns()
            .iter()
            .map(|(&conn, c)| (conn, c.peer_id()))
            .collect();
        self.schedule(Job::Heartbeat { node: node_id });
        let time_start = self.queue.now();
        for (conn, peer) in conns {
            self.schedule(Job::HeartbeatForth {
                origin: node_id,
                peer,
                conn,
                time_start,
            });
        }
    }

    fn fire_heartbeat_forth(
        &mut self,
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
    ) {
        if self.cluster.find_node(peer).is_none() {
            self.schedule(Job::Disconnect { node: origin, conn });
            return;
        }
        self.schedule(Job::HeartbeatBack {
            origin,
            peer,
            conn,
            time_start,
        });
    }

    fn fire_heartbeat_back(
        &mut self,
        origin: NodeId,
        peer: NodeId,
        conn: ConnId,
        time_start: Timestamp,
    ) {
        let rtt = (self.queue.now() - time_start).as_micros() as f64;
        let Some(node) = self.cluster.find_node_mut(origin) else {
            self.schedule(Job::Disconnect { node: peer, conn });
            return;
        };
        // The connection may be gone already; the peer latency estimate is
        // still worth the sample.
        if let Some(c) = node.conn_mut(conn) {
            c.latency.update(rtt);
        }
        node.update_direct_latency(peer, rtt);
    }

    // Gossip

    fn fire_gossip(&mut self, node_id: NodeId) {
        let Some(node) = self.cluster.find_node_mut(node_id) else {
            return;
        };
        let knowledge = node.prepare_knowledge().clone();
        let peers: Vec<NodeId> = node.conns().values().map(|c| c.peer_id()).collect();
        self.schedule(Job::Gossip { node: node_id });
        for peer in peers {
            self.schedule(Job::GossipSend {
                origin: node_id,
                peer,
                knowledge: knowledge.clone(),
            });
        }
    }

    fn fire_gossip_send(&mut self, peer: NodeId, knowledge: &KnowledgeMap) {
        if let Some(peer_node) = self.cluster.find_node_mut(peer) {
            peer_node.apply_knowledge(knowledge);
        }
    }

    // Topology optimization

    fn fire_topology(&mut self, node_id: NodeId) {
        {
            let Some(node) = self.cluster.find_node_mut(node_id) else {
                return;
            };
            node.prepare_knowledge();
        }
        self.schedule(Job::Topology { node: node_id });
        let urgency_draw: f64 = self.rng.gen();

        let Some(node) = self.cluster.find_node(node_id) else {
            return;
        };
        let mut view = TopologyView::new(node_id, node.known_nodes(), node.conn_count());
        if urgency_draw > view.urgency() {
            return;
        }
        let Some(decision) = view.search() else {
            return;
        };

        let mut to_connect = None;
        let mut to_drop: Vec<ConnId> = Vec::new();
        match decision {
            TopologyMove::Connect(peer) => to_connect = Some(peer),
            TopologyMove::Drop(peer) => {
                to_drop = node
                    .peer_conns(peer)
                    .map(|conns| conns.iter().copied().collect())
                    .unwrap_or_default();
            }
        }

        // Once any connection to a peer is established, this node never has
        // an outgoing-pending sibling to the same peer.
        for conns in node.peers_raw().values() {
            let any_established = conns
                .iter()
                .any(|&c| node.conn(c).is_some_and(|x| x.is_established()));
            if !any_established {
                continue;
            }
            for &c in conns {
                debug_assert!(
                    node.conn(c)
                        .is_some_and(|x| x.is_established() || x.is_incoming()),
                    "pending outgoing conn {} next to an established sibling",
                    c
                );
            }
        }

        if let Some(peer) = to_connect {
            debug!(node = %node_id, peer = %peer, "topology: connecting");
            self.schedule(Job::Connect {
                origin: node_id,
                peer,
            });
        }
        for conn in to_drop {
            debug!(node = %node_id, conn = %conn, "topology: dropping");
            self.schedule(Job::Disconnect {
                node: node_id,
                conn,
            });
        }
    }
}
