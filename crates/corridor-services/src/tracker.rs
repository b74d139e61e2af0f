//! Neighbor tracker — the vehicles a local controller currently hears.
//!
//! Three views over the same records: the unified table keyed by vehicle
//! service address, and one bucket per travel direction. A tracked vehicle is
//! always in exactly one bucket. Buckets hold keys only, so a record is never
//! duplicated.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use corridor_core::geometry::{Area, Direction, Segment, Vector3};
use corridor_core::message::Hello;
use corridor_core::Address;

use crate::routing_table::RoutingTable;

/// What the controller knows about one vehicle.
#[derive(Debug, Clone)]
pub struct VehicleRecord {
    pub position: Vector3,
    pub velocity: Vector3,
    /// When the latest Hello arrived.
    pub last_active: Duration,
    /// Distance from the endpoint the vehicle's direction starts at.
    pub distance: f64,
    pub direction: Direction,
    /// Shadow copy of the vehicle's forwarding table.
    pub table: RoutingTable,
}

impl VehicleRecord {
    /// Dead-reckoned position at `now`.
    pub fn position_at(&self, now: Duration) -> Vector3 {
        let elapsed = now.saturating_sub(self.last_active).as_secs_f64();
        self.position.advanced(&self.velocity, elapsed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloOutcome {
    /// Reported position is outside this controller's segment.
    OutOfArea,
    Created,
    Updated,
}

#[derive(Debug)]
pub struct NeighborTracker {
    segment: Segment,
    area: Area,
    timeout: Duration,
    vehicles: BTreeMap<Address, VehicleRecord>,
    forward: BTreeSet<Address>,
    reverse: BTreeSet<Address>,
    /// Vehicle service address → control address its Hello came from.
    control: BTreeMap<Address, Address>,
}

impl NeighborTracker {
    pub fn new(segment: Segment, area: Area, timeout: Duration) -> Self {
        Self {
            segment,
            area,
            timeout,
            vehicles: BTreeMap::new(),
            forward: BTreeSet::new(),
            reverse: BTreeSet::new(),
            control: BTreeMap::new(),
        }
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Record a Hello heard from `originator`.
    pub fn on_hello(&mut self, hello: &Hello, originator: Address, now: Duration) -> HelloOutcome {
        let position = Vector3::from_truncated(hello.position);
        let velocity = Vector3::from_truncated(hello.velocity);
        if !self.segment.contains(&position) {
            tracing::trace!(vehicle = %hello.vehicle, ?position, "hello outside segment");
            return HelloOutcome::OutOfArea;
        }

        self.control.insert(hello.vehicle, originator);

        let (outcome, direction) = match self.vehicles.get_mut(&hello.vehicle) {
            Some(record) => {
                let (distance, direction) = self.segment.locate(&record.position, &position);
                record.position = position;
                record.velocity = velocity;
                record.last_active = now;
                record.distance = distance;
                record.direction = direction;
                (HelloOutcome::Updated, direction)
            }
            None => {
                // No previous sample yet; the reported velocity decides.
                let heading = self.segment.heading_of(&velocity);
                let (distance, direction) = self.segment.locate_heading(&position, heading);
                self.vehicles.insert(
                    hello.vehicle,
                    VehicleRecord {
                        position,
                        velocity,
                        last_active: now,
                        distance,
                        direction,
                        table: RoutingTable::new(),
                    },
                );
                (HelloOutcome::Created, direction)
            }
        };
        self.place(hello.vehicle, direction);

        tracing::debug!(
            vehicle = %hello.vehicle,
            ?direction,
            created = outcome == HelloOutcome::Created,
            "hello accepted"
        );
        outcome
    }

    fn place(&mut self, vehicle: Address, direction: Direction) {
        match direction {
            Direction::Forward => {
                self.reverse.remove(&vehicle);
                self.forward.insert(vehicle);
            }
            Direction::Reverse => {
                self.forward.remove(&vehicle);
                self.reverse.insert(vehicle);
            }
        }
    }

    /// Remove records silent for longer than the timeout, or whose
    /// extrapolated position has left the area. Returns the evicted vehicles.
    pub fn evict_stale(&mut self, now: Duration) -> Vec<Address> {
        let timeout = self.timeout;
        let area = self.area;
        let stale: Vec<Address> = self
            .vehicles
            .iter()
            .filter(|(_, r)| {
                now.saturating_sub(r.last_active) > timeout || !area.contains(&r.position_at(now))
            })
            .map(|(addr, _)| *addr)
            .collect();

        for vehicle in &stale {
            self.vehicles.remove(vehicle);
            self.forward.remove(vehicle);
            self.reverse.remove(vehicle);
            self.control.remove(vehicle);
        }
        if !stale.is_empty() {
            tracing::debug!(removed = stale.len(), "evicted stale vehicles");
        }
        stale
    }

    pub fn get(&self, vehicle: &Address) -> Option<&VehicleRecord> {
        self.vehicles.get(vehicle)
    }

    pub fn get_mut(&mut self, vehicle: &Address) -> Option<&mut VehicleRecord> {
        self.vehicles.get_mut(vehicle)
    }

    pub fn contains(&self, vehicle: &Address) -> bool {
        self.vehicles.contains_key(vehicle)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn vehicles(&self) -> impl Iterator<Item = (&Address, &VehicleRecord)> {
        self.vehicles.iter()
    }

    pub fn vehicles_mut(&mut self) -> impl Iterator<Item = (&Address, &mut VehicleRecord)> {
        self.vehicles.iter_mut()
    }

    /// Vehicles currently moving in `direction`.
    pub fn bucket(&self, direction: Direction) -> impl Iterator<Item = (&Address, &VehicleRecord)> {
        let keys = match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        };
        keys.iter()
            .filter_map(|addr| self.vehicles.get(addr).map(|r| (addr, r)))
    }

    pub fn bucket_len(&self, direction: Direction) -> usize {
        match direction {
            Direction::Forward => self.forward.len(),
            Direction::Reverse => self.reverse.len(),
        }
    }

    pub fn in_bucket(&self, vehicle: &Address, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.forward.contains(vehicle),
            Direction::Reverse => self.reverse.contains(vehicle),
        }
    }

    /// Control address a vehicle's Hellos come from.
    pub fn control_address(&self, vehicle: &Address) -> Option<Address> {
        self.control.get(vehicle).copied()
    }
}
