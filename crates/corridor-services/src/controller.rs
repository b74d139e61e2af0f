//! Local controller role — owns one road segment.
//!
//! Each recompute cycle:
//!   1. evict stale vehicles
//!   2. plan a relay chain per direction bucket
//!   3. withdraw bucket members that were not chosen
//!   4. install next-hop entries along each chain toward the road end, and
//!      re-project the active global-controller route onto the new chain
//!   5. push routing messages
//!   6. report chain state to the global controller
//!   7. optionally appoint forwarders
//!
//! Directives from the global controller and replies from neighboring
//! controllers rewrite the shadow tables between cycles and push again.

use std::collections::BTreeSet;
use std::time::Duration;

use corridor_core::geometry::Direction;
use corridor_core::message::{
    Appointment, AppointmentKind, Hello, LinkStatus, Payload, RouteReply, RouteRequest,
    RoutingUpdate, SegmentRoute,
};
use corridor_core::wire::{NO_ROUTE, ROUTE_MASK, UNASSIGNED};
use corridor_core::Address;

use crate::discovery;
use crate::planner::{plan_chain, Candidate, PlannerParams, RelayChain};
use crate::routing_table::RoutingTableEntry;
use crate::tracker::{HelloOutcome, NeighborTracker};

/// Route assigned by the global controller, kept so every recompute can lay
/// it over the fresh chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRoute {
    pub destination: Address,
    /// Relay the terminal member hands off to.
    pub next_hop: Address,
    pub direction: Direction,
}

#[derive(Debug)]
pub struct LocalController {
    pub control: Address,
    tracker: NeighborTracker,
    params: PlannerParams,
    /// Placeholder destination for "the far end of this segment".
    road_end: Address,
    send_appointments: bool,
    forward: RelayChain,
    reverse: RelayChain,
    active_route: Option<ActiveRoute>,
}

impl LocalController {
    pub fn new(
        control: Address,
        tracker: NeighborTracker,
        params: PlannerParams,
        road_end: Address,
        send_appointments: bool,
    ) -> Self {
        Self {
            control,
            tracker,
            params,
            road_end,
            send_appointments,
            forward: RelayChain::empty(Direction::Forward),
            reverse: RelayChain::empty(Direction::Reverse),
            active_route: None,
        }
    }

    pub fn tracker(&self) -> &NeighborTracker {
        &self.tracker
    }

    pub fn chain(&self, direction: Direction) -> &RelayChain {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    pub fn active_route(&self) -> Option<&ActiveRoute> {
        self.active_route.as_ref()
    }

    pub fn on_hello(&mut self, hello: &Hello, originator: Address, now: Duration) -> HelloOutcome {
        self.tracker.on_hello(hello, originator, now)
    }

    /// Run one planning cycle and return the messages it produces.
    pub fn recompute(&mut self, now: Duration) -> Vec<Payload> {
        self.tracker.evict_stale(now);

        self.forward = self.plan(Direction::Forward);
        self.reverse = self.plan(Direction::Reverse);

        let mut withdrawn = BTreeSet::new();
        for direction in [Direction::Forward, Direction::Reverse] {
            let chain = self.chain(direction);
            let dropped: Vec<Address> = self
                .tracker
                .bucket(direction)
                .map(|(addr, _)| *addr)
                .filter(|addr| !chain.contains(addr))
                .collect();
            for vehicle in dropped {
                self.withdraw(vehicle);
                withdrawn.insert(vehicle);
            }
        }

        let road_end = self.road_end;
        let forward = self.forward.clone();
        let reverse = self.reverse.clone();
        self.install_chain(&forward, road_end, road_end);
        self.install_chain(&reverse, road_end, road_end);
        if let Some(route) = self.active_route {
            self.reinstall(route);
        }

        tracing::debug!(
            vehicles = self.tracker.len(),
            forward = self.forward.len(),
            reverse = self.reverse.len(),
            withdrawn = withdrawn.len(),
            "chains recomputed"
        );

        let mut out = self.push_tables(&withdrawn);
        if !self.forward.is_empty() || !self.reverse.is_empty() {
            out.push(self.link_status());
        }
        if self.send_appointments {
            out.extend(self.appointments());
        }
        out
    }

    fn plan(&self, direction: Direction) -> RelayChain {
        let candidates = self
            .tracker
            .bucket(direction)
            .map(|(addr, record)| Candidate {
                vehicle: *addr,
                distance: record.distance,
            });
        plan_chain(&self.params, direction, candidates)
    }

    /// Clear a vehicle's shadow table down to routes to itself.
    fn withdraw(&mut self, vehicle: Address) {
        if let Some(record) = self.tracker.get_mut(&vehicle) {
            record.table.retain_self_routes(vehicle);
        }
    }

    fn withdraw_all(&mut self) -> BTreeSet<Address> {
        let all: BTreeSet<Address> = self.tracker.vehicles().map(|(a, _)| *a).collect();
        for vehicle in &all {
            self.withdraw(*vehicle);
        }
        all
    }

    /// Link each member to its successor for `destination`; the terminal
    /// member hands off to `terminal_next`.
    fn install_chain(&mut self, chain: &RelayChain, destination: Address, terminal_next: Address) {
        for (member, next) in chain.links() {
            if let Some(record) = self.tracker.get_mut(&member) {
                record
                    .table
                    .add(RoutingTableEntry::new(destination, ROUTE_MASK, next));
            }
        }
        if let Some(terminal) = chain.terminal() {
            if let Some(record) = self.tracker.get_mut(&terminal) {
                record
                    .table
                    .add(RoutingTableEntry::new(destination, ROUTE_MASK, terminal_next));
            }
        }
    }

    /// Drop every member's entry for the route's destination, then install it
    /// along the current chain of its direction.
    fn reinstall(&mut self, route: ActiveRoute) {
        for (_, record) in self.tracker.vehicles_mut() {
            record.table.remove(route.destination);
        }
        let chain = self.chain(route.direction).clone();
        self.install_chain(&chain, route.destination, route.next_hop);
    }

    /// One routing message per vehicle with something to say.
    fn push_tables(&self, withdrawn: &BTreeSet<Address>) -> Vec<Payload> {
        self.tracker
            .vehicles()
            .filter(|(addr, record)| !record.table.is_empty() || withdrawn.contains(*addr))
            .map(|(addr, record)| {
                Payload::Routing(RoutingUpdate {
                    owner: self.tracker.control_address(addr).unwrap_or(*addr),
                    entries: record.table.to_tuples(),
                })
            })
            .collect()
    }

    pub fn link_status(&self) -> Payload {
        Payload::LinkStatus(LinkStatus {
            controller: self.control,
            forward_count: self.forward.len() as u32,
            reverse_count: self.reverse.len() as u32,
            first_forward: self.forward.first().unwrap_or(UNASSIGNED),
            first_reverse: self.reverse.first().unwrap_or(UNASSIGNED),
            addresses: self
                .tracker
                .vehicles()
                .map(|(addr, _)| {
                    (
                        *addr,
                        self.tracker.control_address(addr).unwrap_or(UNASSIGNED),
                    )
                })
                .collect(),
        })
    }

    fn appointments(&self) -> Vec<Payload> {
        self.tracker
            .vehicles()
            .map(|(addr, _)| {
                let in_chain = [&self.forward, &self.reverse]
                    .into_iter()
                    .find_map(|chain| chain.members.iter().position(|m| m == addr).map(|i| (chain, i)));
                let appointment = match in_chain {
                    Some((chain, i)) => Appointment {
                        vehicle: *addr,
                        kind: AppointmentKind::Forwarder,
                        next_forwarder: chain.members.get(i + 1).copied().unwrap_or(self.road_end),
                    },
                    None => Appointment {
                        vehicle: *addr,
                        kind: AppointmentKind::Normal,
                        next_forwarder: UNASSIGNED,
                    },
                };
                Payload::Appointment(appointment)
            })
            .collect()
    }

    pub fn on_route_request(&self, request: &RouteRequest) -> Option<Payload> {
        let reply = discovery::answer_request(&self.tracker, &self.forward, &self.reverse, request)?;
        tracing::debug!(
            source = %reply.source,
            destination = %reply.destination,
            transfer = %reply.transfer,
            "answering route request"
        );
        Some(Payload::RouteReply(reply))
    }

    pub fn on_route_reply(&mut self, reply: &RouteReply) -> Vec<Payload> {
        if discovery::apply_reply(
            &mut self.tracker,
            &self.forward,
            &self.reverse,
            self.road_end,
            reply,
        ) {
            self.push_tables(&BTreeSet::new())
        } else {
            Vec::new()
        }
    }

    /// Apply a directive from the global controller.
    pub fn on_segment_route(&mut self, directive: &SegmentRoute) -> Vec<Payload> {
        if directive.controller != self.control {
            return Vec::new();
        }
        if directive.destination == NO_ROUTE {
            tracing::info!("global controller reports no route");
            self.active_route = None;
            let withdrawn = self.withdraw_all();
            return self.push_tables(&withdrawn);
        }
        if self.forward.len() <= 2 && self.reverse.len() <= 2 {
            tracing::debug!(destination = %directive.destination, "chains too short for directive");
            return Vec::new();
        }

        let withdrawn = self.withdraw_all();
        let use_forward = if directive.next_hop == directive.destination {
            directive.direction.enters_forward()
        } else {
            directive.direction.leaves_forward()
        };
        let route = ActiveRoute {
            destination: directive.destination,
            next_hop: directive.next_hop,
            direction: if use_forward {
                Direction::Forward
            } else {
                Direction::Reverse
            },
        };
        self.active_route = Some(route);
        self.reinstall(route);
        tracing::debug!(
            destination = %route.destination,
            next_hop = %route.next_hop,
            direction = ?route.direction,
            members = self.chain(route.direction).len(),
            "segment route installed"
        );
        self.push_tables(&withdrawn)
    }
}
