//! Reactive discovery — the fallback when a vehicle's table has no entry for
//! a destination.
//!
//! Vehicle side: a miss moves the destination to Waiting and emits a route
//! request, at most once per destination per discovery epoch. The destination
//! is Installed once a routing message brings an entry for it.
//!
//! Controller side: answer requests with the head of a local chain, and
//! splice answers heard from other controllers into the local tables.

use std::collections::BTreeMap;
use std::time::Duration;

use corridor_core::message::{RouteReply, RouteRequest};
use corridor_core::wire::ROUTE_MASK;
use corridor_core::{Address, Vector3};

use crate::planner::RelayChain;
use crate::routing_table::{RoutingTable, RoutingTableEntry};
use crate::tracker::NeighborTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    NoRoute,
    Waiting,
    Installed,
}

/// Answer to a data-plane lookup on a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteLookup {
    Found(RoutingTableEntry),
    /// No entry yet. A request has been (or will shortly be) sent.
    Discovering,
}

#[derive(Debug)]
pub struct Discovery {
    interval: Duration,
    /// Destination → epoch its latest request went out in.
    waiting: BTreeMap<Address, u64>,
}

impl Discovery {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            waiting: BTreeMap::new(),
        }
    }

    /// `floor(now / interval)`.
    pub fn epoch(&self, now: Duration) -> u64 {
        let interval = self.interval.as_nanos().max(1);
        (now.as_nanos() / interval) as u64
    }

    /// Record a table miss. Returns true if a request should be sent now.
    pub fn on_miss(&mut self, destination: Address, now: Duration) -> bool {
        let epoch = self.epoch(now);
        match self.waiting.insert(destination, epoch) {
            Some(previous) if previous == epoch => false,
            _ => {
                tracing::debug!(%destination, epoch, "route request due");
                true
            }
        }
    }

    pub fn phase(&self, destination: Address, table: &RoutingTable) -> DiscoveryPhase {
        if table.lookup(destination).is_some() {
            DiscoveryPhase::Installed
        } else if self.waiting.contains_key(&destination) {
            DiscoveryPhase::Waiting
        } else {
            DiscoveryPhase::NoRoute
        }
    }

    /// Drop waiting destinations the new table now covers. Returns them.
    pub fn on_table_installed(&mut self, table: &RoutingTable) -> Vec<Address> {
        let resolved: Vec<Address> = self
            .waiting
            .keys()
            .filter(|d| table.lookup(**d).is_some())
            .copied()
            .collect();
        for d in &resolved {
            self.waiting.remove(d);
        }
        resolved
    }

    pub fn waiting(&self) -> impl Iterator<Item = &Address> {
        self.waiting.keys()
    }
}

/// Best relay this controller can offer traffic from outside: the head of
/// the forward chain, else of the reverse chain.
pub fn transfer_candidate(forward: &RelayChain, reverse: &RelayChain) -> Option<Address> {
    forward.first().or_else(|| reverse.first())
}

/// Decide whether and how to answer a route request.
pub fn answer_request(
    tracker: &NeighborTracker,
    forward: &RelayChain,
    reverse: &RelayChain,
    request: &RouteRequest,
) -> Option<RouteReply> {
    if let Some(position) = request.position {
        if !tracker.segment().contains(&Vector3::from_truncated(position)) {
            tracing::trace!(source = %request.source, "route request from outside segment");
            return None;
        }
    }
    if tracker.contains(&request.destination) {
        tracing::trace!(destination = %request.destination, "destination is local, not answering");
        return None;
    }
    if tracker.len() <= 1 {
        tracing::trace!("too few vehicles to relay");
        return None;
    }
    let transfer = transfer_candidate(forward, reverse)?;
    if transfer == request.destination {
        return None;
    }
    Some(RouteReply {
        source: request.source,
        destination: request.destination,
        transfer,
    })
}

/// Splice a reply heard from another controller into the shadow tables.
///
/// Every vehicle routing toward the road end also learns the destination,
/// through the same next hop. The terminal vehicle of the current chain
/// sends it to the transfer address. Returns false if there is no chain.
pub fn apply_reply(
    tracker: &mut NeighborTracker,
    forward: &RelayChain,
    reverse: &RelayChain,
    road_end: Address,
    reply: &RouteReply,
) -> bool {
    let Some(terminal) = forward.terminal().or_else(|| reverse.terminal()) else {
        return false;
    };
    if !tracker.contains(&terminal) {
        return false;
    }

    let mut copied = 0usize;
    for (_, record) in tracker.vehicles_mut() {
        if let Some(toward_end) = record.table.get(road_end).copied() {
            record.table.add(RoutingTableEntry {
                destination: reply.destination,
                ..toward_end
            });
            copied += 1;
        }
    }
    if let Some(record) = tracker.get_mut(&terminal) {
        record.table.add(RoutingTableEntry::new(
            reply.destination,
            ROUTE_MASK,
            reply.transfer,
        ));
    }

    tracing::debug!(
        destination = %reply.destination,
        transfer = %reply.transfer,
        %terminal,
        copied,
        "route reply installed"
    );
    true
}
