//! One protocol participant — the per-node context every handler runs in.
//!
//! The node never does I/O. The host feeds it packets, timer expiries and
//! the current time, and carries out the [`Action`]s it returns: broadcast
//! these bytes, arm this timer, cancel that one.

use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use corridor_core::config::{CorridorConfig, Role};
use corridor_core::message::{Payload, PacketReader};
use corridor_core::wire::seconds_to_valid_time;
use corridor_core::Address;

use crate::controller::LocalController;
use crate::discovery::RouteLookup;
use crate::dispatch;
use crate::global::GlobalController;
use crate::mobility::Mobility;
use crate::planner::PlannerParams;
use crate::queue::OutgoingQueue;
use crate::segment_graph::SegmentGraph;
use crate::tracker::NeighborTracker;
use crate::vehicle::VehicleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    Hello,
    Recompute,
    Flush,
}

impl TimerId {
    pub const ALL: [TimerId; 3] = [TimerId::Hello, TimerId::Recompute, TimerId::Flush];
}

/// Effect the host must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Broadcast(Bytes),
    /// Arm `timer` to fire `after` from now, replacing any earlier deadline.
    Schedule { timer: TimerId, after: Duration },
    Cancel(TimerId),
}

#[derive(Debug)]
pub enum RoleState {
    Car(VehicleState),
    Local(LocalController),
    Global(GlobalController),
    Other,
}

impl RoleState {
    pub fn role(&self) -> Role {
        match self {
            RoleState::Car(_) => Role::Car,
            RoleState::Local(_) => Role::LocalController,
            RoleState::Global(_) => Role::GlobalController,
            RoleState::Other => Role::Other,
        }
    }
}

pub struct ProtocolNode {
    address: Address,
    role: RoleState,
    mobility: Box<dyn Mobility>,
    queue: OutgoingQueue,
    rng: StdRng,
    hello_interval: Duration,
    recompute_interval: Duration,
    max_jitter: Duration,
    flush_pending: bool,
    running: bool,
}

impl ProtocolNode {
    pub fn new(config: &CorridorConfig, mobility: Box<dyn Mobility>) -> Self {
        let timing = &config.timing;
        let address = config.node.cch_address;

        let role = match config.node.role {
            Role::Car => RoleState::Car(VehicleState::new(
                address,
                config.node.sch_address,
                timing.discovery_interval(),
            )),
            Role::LocalController => {
                let segment = config.road.segment_for(&mobility.position(Duration::ZERO));
                let tracker =
                    NeighborTracker::new(segment, config.road.area(), timing.neighbor_timeout());
                let params = PlannerParams {
                    strategy: config.planner.strategy,
                    signal_range: config.radio.signal_range,
                    cutoff: segment.length() - config.planner.far_end_margin,
                    take_all_min_members: config.planner.take_all_min_members,
                    range_graph_factor: config.planner.range_graph_factor,
                };
                RoleState::Local(LocalController::new(
                    address,
                    tracker,
                    params,
                    config.road.road_end,
                    config.planner.send_appointments,
                ))
            }
            Role::GlobalController => RoleState::Global(GlobalController::new(
                address,
                SegmentGraph::new(config.global.min_chain_len, &config.global.segments),
            )),
            Role::Other => RoleState::Other,
        };

        let rng = match config.node.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            address,
            role,
            mobility,
            queue: OutgoingQueue::new(
                address,
                seconds_to_valid_time(timing.hello_interval().as_secs_f64()),
                timing.max_messages_per_packet,
            ),
            rng,
            hello_interval: timing.hello_interval(),
            recompute_interval: timing.recompute_interval(),
            max_jitter: timing.max_jitter(),
            flush_pending: false,
            running: false,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn role(&self) -> Role {
        self.role.role()
    }

    pub fn state(&self) -> &RoleState {
        &self.role
    }

    pub fn vehicle(&self) -> Option<&VehicleState> {
        match &self.role {
            RoleState::Car(car) => Some(car),
            _ => None,
        }
    }

    pub fn controller(&self) -> Option<&LocalController> {
        match &self.role {
            RoleState::Local(lc) => Some(lc),
            _ => None,
        }
    }

    pub fn global(&self) -> Option<&GlobalController> {
        match &self.role {
            RoleState::Global(gc) => Some(gc),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begin operating. Periodic work for the node's role runs right away.
    pub fn start(&mut self, now: Duration) -> Vec<Action> {
        self.running = true;
        tracing::info!(address = %self.address, role = ?self.role(), "protocol node started");
        let mut actions = Vec::new();
        match self.role {
            RoleState::Car(_) => self.hello_tick(now, &mut actions),
            RoleState::Local(_) => self.recompute_tick(now, &mut actions),
            RoleState::Global(_) | RoleState::Other => {}
        }
        actions
    }

    /// Stop operating. Anything still queued goes out now and every timer is
    /// cancelled.
    pub fn shutdown(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.flush(&mut actions);
        self.running = false;
        self.flush_pending = false;
        actions.extend(TimerId::ALL.into_iter().map(Action::Cancel));
        tracing::info!(address = %self.address, "protocol node stopped");
        actions
    }

    pub fn on_timer_fired(&mut self, timer: TimerId, now: Duration) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.running {
            return actions;
        }
        match timer {
            TimerId::Hello => self.hello_tick(now, &mut actions),
            TimerId::Recompute => self.recompute_tick(now, &mut actions),
            TimerId::Flush => {
                self.flush_pending = false;
                self.flush(&mut actions);
            }
        }
        actions
    }

    pub fn on_packet_received(&mut self, bytes: &[u8], now: Duration) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.running {
            return actions;
        }
        let reader = match PacketReader::new(bytes) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "malformed packet");
                return actions;
            }
        };
        let from = reader.originator;

        let mut outgoing = Vec::new();
        for result in reader {
            match result {
                Ok(message) => {
                    outgoing.extend(dispatch::dispatch(&mut self.role, &message, self.address, now));
                }
                Err(e) => tracing::warn!(error = %e, %from, "malformed message skipped"),
            }
        }
        self.send(outgoing, &mut actions);
        actions
    }

    /// Data-plane lookup on a car. `None` for other roles.
    pub fn route_output(
        &mut self,
        destination: Address,
        now: Duration,
    ) -> Option<(RouteLookup, Vec<Action>)> {
        let RoleState::Car(car) = &mut self.role else {
            return None;
        };
        let (lookup, request) = car.route_output(destination, self.mobility.as_ref(), now);
        let mut actions = Vec::new();
        self.send(request.into_iter().collect(), &mut actions);
        Some((lookup, actions))
    }

    fn hello_tick(&mut self, now: Duration, actions: &mut Vec<Action>) {
        let RoleState::Car(car) = &self.role else {
            return;
        };
        let hello = car.hello(self.mobility.as_ref(), now);
        self.send(vec![hello], actions);
        actions.push(Action::Schedule {
            timer: TimerId::Hello,
            after: self.hello_interval,
        });
    }

    fn recompute_tick(&mut self, now: Duration, actions: &mut Vec<Action>) {
        let RoleState::Local(lc) = &mut self.role else {
            return;
        };
        let out = lc.recompute(now);
        self.send(out, actions);
        actions.push(Action::Schedule {
            timer: TimerId::Recompute,
            after: self.recompute_interval,
        });
    }

    /// Queue payloads. A full packet goes out immediately; otherwise a
    /// jittered flush is armed if none is pending.
    fn send(&mut self, payloads: Vec<Payload>, actions: &mut Vec<Action>) {
        if payloads.is_empty() {
            return;
        }
        for payload in payloads {
            if self.queue.push(payload) {
                self.flush(actions);
            }
        }
        if !self.queue.is_empty() && !self.flush_pending {
            self.flush_pending = true;
            let after = self.jitter();
            actions.push(Action::Schedule {
                timer: TimerId::Flush,
                after,
            });
        }
    }

    fn flush(&mut self, actions: &mut Vec<Action>) {
        if self.queue.is_empty() {
            return;
        }
        let queued = self.queue.len();
        let packets = self.queue.drain();
        tracing::trace!(messages = queued, packets = packets.len(), "flushing");
        actions.extend(packets.into_iter().map(Action::Broadcast));
    }

    fn jitter(&mut self) -> Duration {
        let max = self.max_jitter.as_micros() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.rng.gen_range(0..=max))
    }
}
