//! Forwarding tables — a vehicle's installed table, and the controller's
//! shadow copy of it.
//!
//! The two are independent replicas. A controller edits its shadow copy and
//! pushes it whole in a routing message; the vehicle replaces its own table
//! with what arrives.

use corridor_core::message::RouteTuple;
use corridor_core::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingTableEntry {
    pub destination: Address,
    pub mask: Address,
    pub next_hop: Address,
    /// Outgoing interface index on the owning node.
    pub interface: u32,
}

impl RoutingTableEntry {
    pub fn new(destination: Address, mask: Address, next_hop: Address) -> Self {
        Self {
            destination,
            mask,
            next_hop,
            interface: 0,
        }
    }

    pub fn to_tuple(&self) -> RouteTuple {
        RouteTuple {
            destination: self.destination,
            mask: self.mask,
            next_hop: self.next_hop,
        }
    }

    pub fn from_tuple(tuple: &RouteTuple, interface: u32) -> Self {
        Self {
            destination: tuple.destination,
            mask: tuple.mask,
            next_hop: tuple.next_hop,
            interface,
        }
    }
}

/// At most one entry per destination. Insertion order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: Vec<RoutingTableEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any entry for the same destination.
    pub fn add(&mut self, entry: RoutingTableEntry) {
        self.entries.retain(|e| e.destination != entry.destination);
        self.entries.push(entry);
    }

    pub fn get(&self, destination: Address) -> Option<&RoutingTableEntry> {
        self.entries.iter().find(|e| e.destination == destination)
    }

    /// Entry for a data packet to `dest`. Only an exact destination match
    /// counts: the mask is carried on the wire but every chain entry shares
    /// it, so a masked match would answer for unrelated destinations.
    pub fn lookup(&self, dest: Address) -> Option<&RoutingTableEntry> {
        self.get(dest)
    }

    pub fn remove(&mut self, destination: Address) {
        self.entries.retain(|e| e.destination != destination);
    }

    /// Drop every entry except routes to `owner` itself.
    pub fn retain_self_routes(&mut self, owner: Address) {
        self.entries.retain(|e| e.destination == owner);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutingTableEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_tuples(&self) -> Vec<RouteTuple> {
        self.entries.iter().map(RoutingTableEntry::to_tuple).collect()
    }
}
