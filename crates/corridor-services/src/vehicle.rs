//! Car role: beacons, the installed forwarding table, and discovery.

use std::time::Duration;

use corridor_core::message::{Appointment, AppointmentKind, Hello, Payload, RouteRequest, RoutingUpdate};
use corridor_core::Address;

use crate::discovery::{Discovery, DiscoveryPhase, RouteLookup};
use crate::mobility::Mobility;
use crate::routing_table::{RoutingTable, RoutingTableEntry};

/// Interface index installed entries point out of (the service channel).
pub const SERVICE_INTERFACE: u32 = 1;

#[derive(Debug)]
pub struct VehicleState {
    /// Control-channel address: identity, and owner of routing messages.
    pub control: Address,
    /// Service-channel address carried in Hellos.
    pub service: Address,
    pub table: RoutingTable,
    pub appointment: AppointmentKind,
    pub next_forwarder: Option<Address>,
    discovery: Discovery,
}

impl VehicleState {
    pub fn new(control: Address, service: Address, discovery_interval: Duration) -> Self {
        Self {
            control,
            service,
            table: RoutingTable::new(),
            appointment: AppointmentKind::Normal,
            next_forwarder: None,
            discovery: Discovery::new(discovery_interval),
        }
    }

    pub fn hello(&self, mobility: &dyn Mobility, now: Duration) -> Payload {
        Payload::Hello(Hello {
            vehicle: self.service,
            position: mobility.position(now).truncated(),
            velocity: mobility.velocity(now).truncated(),
        })
    }

    /// Install a pushed table if it is addressed to this vehicle.
    pub fn on_routing(&mut self, update: &RoutingUpdate) -> bool {
        if update.owner != self.control {
            return false;
        }
        let mut table = RoutingTable::new();
        for tuple in &update.entries {
            table.add(RoutingTableEntry::from_tuple(tuple, SERVICE_INTERFACE));
        }
        self.table = table;
        for destination in self.discovery.on_table_installed(&self.table) {
            tracing::debug!(%destination, "discovered route installed");
        }
        tracing::debug!(entries = self.table.len(), "routing table replaced");
        true
    }

    pub fn on_appointment(&mut self, appointment: &Appointment) -> bool {
        if appointment.vehicle != self.service {
            return false;
        }
        self.appointment = appointment.kind;
        self.next_forwarder = match appointment.kind {
            AppointmentKind::Forwarder => Some(appointment.next_forwarder),
            AppointmentKind::Normal => None,
        };
        tracing::debug!(kind = ?appointment.kind, next = %appointment.next_forwarder, "appointed");
        true
    }

    /// Look up `destination` for an outgoing data packet. On a miss, also
    /// returns the route request to send, if one is due this epoch.
    pub fn route_output(
        &mut self,
        destination: Address,
        mobility: &dyn Mobility,
        now: Duration,
    ) -> (RouteLookup, Option<Payload>) {
        if let Some(entry) = self.table.lookup(destination) {
            return (RouteLookup::Found(*entry), None);
        }
        let request = self.discovery.on_miss(destination, now).then(|| {
            Payload::RouteRequest(RouteRequest {
                source: self.control,
                destination,
                position: Some(mobility.position(now).truncated()),
            })
        });
        (RouteLookup::Discovering, request)
    }

    pub fn discovery_phase(&self, destination: Address) -> DiscoveryPhase {
        self.discovery.phase(destination, &self.table)
    }
}
