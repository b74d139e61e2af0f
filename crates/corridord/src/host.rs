//! Carries out the node's actions against the real world: the socket, and
//! a deadline per armed timer.

use std::collections::BTreeMap;
use std::net::SocketAddrV4;

use tokio::net::UdpSocket;
use tokio::time::Instant;

use corridor_core::geometry::Direction;
use corridor_services::{Action, ProtocolNode, RoleState, TimerId};

#[derive(Debug, Default)]
pub struct Timers {
    armed: BTreeMap<TimerId, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest armed deadline.
    pub fn next(&self) -> Option<(TimerId, Instant)> {
        self.armed
            .iter()
            .min_by_key(|(_, at)| **at)
            .map(|(timer, at)| (*timer, *at))
    }

    pub fn disarm(&mut self, timer: TimerId) {
        self.armed.remove(&timer);
    }

    fn arm(&mut self, timer: TimerId, at: Instant) {
        self.armed.insert(timer, at);
    }
}

pub async fn execute(
    actions: Vec<Action>,
    socket: &UdpSocket,
    target: SocketAddrV4,
    timers: &mut Timers,
) {
    for action in actions {
        match action {
            Action::Broadcast(bytes) => match socket.send_to(&bytes, target).await {
                Ok(n) => tracing::trace!(bytes = n, "broadcast sent"),
                Err(e) => tracing::warn!(error = %e, "broadcast send failed"),
            },
            Action::Schedule { timer, after } => timers.arm(timer, Instant::now() + after),
            Action::Cancel(timer) => timers.disarm(timer),
        }
    }
}

/// Log what the node currently knows.
pub fn log_snapshot(node: &ProtocolNode) {
    match node.state() {
        RoleState::Car(car) => {
            tracing::info!(
                entries = car.table.len(),
                appointment = ?car.appointment,
                next_forwarder = ?car.next_forwarder,
                "vehicle table snapshot"
            );
            for entry in car.table.iter() {
                tracing::info!(
                    destination = %entry.destination,
                    mask = %entry.mask,
                    next_hop = %entry.next_hop,
                    "  route"
                );
            }
        }
        RoleState::Local(lc) => {
            let forward = lc.chain(Direction::Forward);
            let reverse = lc.chain(Direction::Reverse);
            tracing::info!(
                vehicles = lc.tracker().len(),
                forward = forward.len(),
                reverse = reverse.len(),
                "controller snapshot"
            );
            for (vehicle, record) in lc.tracker().vehicles() {
                tracing::info!(
                    %vehicle,
                    direction = ?record.direction,
                    distance = record.distance,
                    entries = record.table.len(),
                    "  vehicle"
                );
            }
        }
        RoleState::Global(gc) => {
            for segment in 1..=corridor_services::segment_graph::SEGMENT_COUNT as u8 {
                let Some(state) = gc.graph().state(segment) else { continue };
                if state.forward_hops.is_none() && state.reverse_hops.is_none() {
                    continue;
                }
                tracing::info!(
                    segment,
                    forward = ?state.forward_hops,
                    reverse = ?state.reverse_hops,
                    vehicles = state.addresses.len(),
                    "  segment"
                );
            }
        }
        RoleState::Other => {}
    }
}
