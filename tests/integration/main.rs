//! Corridor integration test harness.
//!
//! Every test builds a small world in-process: a virtual clock, an event
//! heap of timer expiries and packet deliveries, and a broadcast medium that
//! only reaches nodes within radio range. Controllers additionally share a
//! wired backbone that always delivers.
//!
//!   cargo test --test integration
//!
//! Runs are deterministic: every node gets a fixed RNG seed.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::time::Duration;

use anyhow::{bail, Result};
use bytes::Bytes;

use corridor_core::config::{ChainStrategy, CorridorConfig, Role, SegmentAssignment};
use corridor_core::message::{Message, PacketReader};
use corridor_core::{Address, Vector3};
use corridor_services::{
    Action, GlobalController, LinearMobility, LocalController, ProtocolNode, RouteLookup,
    TimerId, VehicleState,
};

mod discovery;
mod infra;
mod planning;
mod tracking;
mod wire;

// ── Addressing ────────────────────────────────────────────────────────────────

/// Control-channel address of car `n`.
pub fn car_cch(n: u8) -> Address {
    Address::new(10, 1, 0, n)
}

/// Service-channel address of car `n`.
pub fn car_sch(n: u8) -> Address {
    Address::new(10, 0, 0, n)
}

pub fn lc_addr(n: u8) -> Address {
    Address::new(10, 2, 0, n)
}

pub const GC_ADDR: Address = Address::new(10, 9, 0, 1);

/// One-way delay of every delivery.
pub const LATENCY: Duration = Duration::from_millis(1);

pub fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

pub fn base_config(role: Role, cch: Address, sch: Address, seed: u64) -> CorridorConfig {
    let mut config = CorridorConfig::default();
    config.node.role = role;
    config.node.cch_address = cch;
    config.node.sch_address = sch;
    config.node.seed = Some(seed);
    config
}

// ── Harness ───────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Timer { node: usize, timer: TimerId },
    Deliver { node: usize, bytes: Bytes },
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Event {
    at: Duration,
    seq: u64,
    kind: EventKind,
}

pub struct SimNode {
    pub node: ProtocolNode,
    mobility: LinearMobility,
    backbone: bool,
    deadlines: BTreeMap<TimerId, Duration>,
}

/// A message some node put on the air.
#[derive(Debug, Clone)]
pub struct Sent {
    pub at: Duration,
    pub from: usize,
    pub message: Message,
}

pub struct Sim {
    pub now: Duration,
    pub range: f64,
    nodes: Vec<SimNode>,
    events: BinaryHeap<Reverse<Event>>,
    seq: u64,
    pub sent: Vec<Sent>,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            range: CorridorConfig::default().radio.signal_range,
            nodes: Vec::new(),
            events: BinaryHeap::new(),
            seq: 0,
            sent: Vec::new(),
        }
    }

    pub fn add(&mut self, config: &CorridorConfig, mobility: LinearMobility, backbone: bool) -> usize {
        let node = ProtocolNode::new(config, Box::new(mobility));
        self.nodes.push(SimNode {
            node,
            mobility,
            backbone,
            deadlines: BTreeMap::new(),
        });
        self.nodes.len() - 1
    }

    pub fn add_car(&mut self, n: u8, position: Vector3, velocity: Vector3) -> usize {
        let config = base_config(Role::Car, car_cch(n), car_sch(n), u64::from(n));
        self.add(&config, LinearMobility::new(position, velocity), false)
    }

    pub fn add_controller(&mut self, n: u8, position: Vector3, strategy: ChainStrategy) -> usize {
        let mut config = base_config(Role::LocalController, lc_addr(n), lc_addr(n), 1000 + u64::from(n));
        config.planner.strategy = strategy;
        self.add(&config, LinearMobility::new(position, Vector3::ZERO), true)
    }

    /// Global controller with controller `n` assigned to segment `n`.
    pub fn add_global(&mut self, controllers: &[u8]) -> usize {
        let mut config = base_config(Role::GlobalController, GC_ADDR, GC_ADDR, 9999);
        config.global.segments = controllers
            .iter()
            .map(|n| SegmentAssignment {
                controller: lc_addr(*n),
                segment: *n,
            })
            .collect();
        let position = Vector3::new(1500.0, 1500.0, 0.0);
        self.add(&config, LinearMobility::new(position, Vector3::ZERO), true)
    }

    pub fn node(&self, i: usize) -> &ProtocolNode {
        &self.nodes[i].node
    }

    pub fn car(&self, i: usize) -> &VehicleState {
        self.nodes[i].node.vehicle().expect("node is not a car")
    }

    pub fn controller(&self, i: usize) -> &LocalController {
        self.nodes[i].node.controller().expect("node is not a local controller")
    }

    pub fn global(&self, i: usize) -> &GlobalController {
        self.nodes[i].node.global().expect("node is not the global controller")
    }

    pub fn position(&self, i: usize) -> Vector3 {
        use corridor_services::Mobility;
        self.nodes[i].mobility.position(self.now)
    }

    /// Can a broadcast from `from` reach `to` right now?
    pub fn reachable(&self, from: usize, to: usize) -> bool {
        if from == to {
            return false;
        }
        if self.nodes[from].backbone && self.nodes[to].backbone {
            return true;
        }
        self.position(from).distance(&self.position(to)) <= self.range
    }

    pub fn start_all(&mut self) {
        for i in 0..self.nodes.len() {
            let actions = self.nodes[i].node.start(self.now);
            self.apply(i, actions);
        }
    }

    /// Start a single node, e.g. one added after `start_all`.
    pub fn start(&mut self, i: usize) -> Vec<Action> {
        let actions = self.nodes[i].node.start(self.now);
        self.apply(i, actions.clone());
        actions
    }

    pub fn stop(&mut self, i: usize) {
        let actions = self.nodes[i].node.shutdown();
        self.apply(i, actions);
    }

    /// Hand raw bytes to a node as if they had just arrived.
    pub fn inject(&mut self, i: usize, bytes: &[u8]) -> Vec<Action> {
        let actions = self.nodes[i].node.on_packet_received(bytes, self.now);
        self.apply(i, actions.clone());
        actions
    }

    /// Data-plane lookup on car `i`.
    pub fn route_output(&mut self, i: usize, destination: Address) -> Result<RouteLookup> {
        let now = self.now;
        let Some((lookup, actions)) = self.nodes[i].node.route_output(destination, now) else {
            bail!("node {i} is not a car");
        };
        self.apply(i, actions);
        Ok(lookup)
    }

    /// Process every event up to and including `until`.
    pub fn run_until(&mut self, until: Duration) {
        while let Some(Reverse(event)) = self.events.peek() {
            if event.at > until {
                break;
            }
            let Some(Reverse(event)) = self.events.pop() else {
                break;
            };
            self.now = event.at;
            match event.kind {
                EventKind::Timer { node, timer } => {
                    if self.nodes[node].deadlines.get(&timer) != Some(&event.at) {
                        continue;
                    }
                    self.nodes[node].deadlines.remove(&timer);
                    let actions = self.nodes[node].node.on_timer_fired(timer, self.now);
                    self.apply(node, actions);
                }
                EventKind::Deliver { node, bytes } => {
                    let actions = self.nodes[node].node.on_packet_received(&bytes, self.now);
                    self.apply(node, actions);
                }
            }
        }
        self.now = until;
    }

    pub fn run_for(&mut self, d: Duration) {
        let until = self.now + d;
        self.run_until(until);
    }

    fn push(&mut self, at: Duration, kind: EventKind) {
        self.seq += 1;
        self.events.push(Reverse(Event {
            at,
            seq: self.seq,
            kind,
        }));
    }

    fn apply(&mut self, from: usize, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broadcast(bytes) => {
                    if let Ok(reader) = PacketReader::new(&bytes) {
                        for message in reader.flatten() {
                            self.sent.push(Sent {
                                at: self.now,
                                from,
                                message,
                            });
                        }
                    }
                    for to in 0..self.nodes.len() {
                        if self.reachable(from, to) {
                            self.push(
                                self.now + LATENCY,
                                EventKind::Deliver {
                                    node: to,
                                    bytes: bytes.clone(),
                                },
                            );
                        }
                    }
                }
                Action::Schedule { timer, after } => {
                    let at = self.now + after;
                    self.nodes[from].deadlines.insert(timer, at);
                    self.push(at, EventKind::Timer { node: from, timer });
                }
                Action::Cancel(timer) => {
                    self.nodes[from].deadlines.remove(&timer);
                }
            }
        }
    }

    /// Messages node `i` has broadcast so far.
    pub fn sent_by(&self, i: usize) -> impl Iterator<Item = &Message> {
        self.sent.iter().filter(move |s| s.from == i).map(|s| &s.message)
    }

    pub fn pending_timers(&self, i: usize) -> Vec<TimerId> {
        self.nodes[i].deadlines.keys().copied().collect()
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

/// A static car at `x` on the y = 0 road.
pub fn parked(sim: &mut Sim, n: u8, x: f64) -> usize {
    sim.add_car(n, Vector3::new(x, 0.0, 0.0), Vector3::ZERO)
}
