//! Relay-chain planner — picks which vehicles of one direction bucket relay
//! traffic across the segment, in order from the start of the segment.
//!
//! Three interchangeable strategies:
//!   Greedy      — fewest relays, each roughly half a radio range apart
//!   TakeAll     — every vehicle, for buckets big enough to be worth it
//!   RangeGraph  — fewest hops over the in-range graph of all vehicles
//!
//! Planning is pure. Installing the chain into forwarding tables is the
//! controller's job.

use corridor_core::config::ChainStrategy;
use corridor_core::geometry::Direction;
use corridor_core::Address;

use crate::shortest_path::{floyd_warshall, WeightMatrix};

/// A vehicle eligible for the chain, with its distance from the start of its
/// direction of travel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub vehicle: Address,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PlannerParams {
    pub strategy: ChainStrategy,
    pub signal_range: f64,
    /// Candidates at or beyond this distance are about to leave the segment.
    pub cutoff: f64,
    pub take_all_min_members: usize,
    pub range_graph_factor: f64,
}

impl PlannerParams {
    /// Greedy spacing: consecutive relays must be further apart than this.
    pub fn greedy_spacing(&self) -> f64 {
        0.5 * self.signal_range
    }

    /// Range-graph edge threshold.
    pub fn link_range(&self) -> f64 {
        self.range_graph_factor * self.signal_range
    }

    /// Are two vehicles close enough to share a range-graph edge?
    pub fn in_range(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.link_range()
    }
}

/// Ordered relays for one direction of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayChain {
    pub direction: Direction,
    pub members: Vec<Address>,
}

impl RelayChain {
    pub fn empty(direction: Direction) -> Self {
        Self {
            direction,
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member nearest the start of the segment.
    pub fn first(&self) -> Option<Address> {
        self.members.first().copied()
    }

    /// Member nearest the far end.
    pub fn terminal(&self) -> Option<Address> {
        self.members.last().copied()
    }

    pub fn contains(&self, vehicle: &Address) -> bool {
        self.members.contains(vehicle)
    }

    /// `(member, successor)` for every member but the terminal one.
    pub fn links(&self) -> impl Iterator<Item = (Address, Address)> + '_ {
        self.members.windows(2).map(|w| (w[0], w[1]))
    }
}

/// Plan the chain for one bucket.
pub fn plan_chain<I>(params: &PlannerParams, direction: Direction, candidates: I) -> RelayChain
where
    I: IntoIterator<Item = Candidate>,
{
    let mut sorted: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.distance < params.cutoff)
        .collect();
    sorted.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.vehicle.cmp(&b.vehicle))
    });

    let chosen = match params.strategy {
        ChainStrategy::Greedy => greedy(params, &sorted),
        ChainStrategy::TakeAll => take_all(params, &sorted),
        ChainStrategy::RangeGraph => range_graph(params, &sorted),
    };

    tracing::debug!(
        ?direction,
        strategy = ?params.strategy,
        candidates = sorted.len(),
        chosen = chosen.len(),
        "relay chain planned"
    );

    RelayChain {
        direction,
        members: chosen.into_iter().map(|i| sorted[i].vehicle).collect(),
    }
}

/// Closest vehicle if it is within half a range of the start, then every
/// vehicle more than half a range past the last one chosen.
fn greedy(params: &PlannerParams, sorted: &[Candidate]) -> Vec<usize> {
    let spacing = params.greedy_spacing();
    let mut chosen = Vec::new();
    let Some(first) = sorted.first() else {
        return chosen;
    };
    if first.distance >= spacing {
        return chosen;
    }
    chosen.push(0);
    let mut last = first.distance;
    for (i, c) in sorted.iter().enumerate().skip(1) {
        if c.distance - last > spacing {
            chosen.push(i);
            last = c.distance;
        }
    }
    chosen
}

fn take_all(params: &PlannerParams, sorted: &[Candidate]) -> Vec<usize> {
    if sorted.len() < params.take_all_min_members {
        return Vec::new();
    }
    (0..sorted.len()).collect()
}

/// Minimum-hop path from the vehicle nearest the start to the one nearest the
/// far end, over edges between vehicles closer than the link range. Empty if
/// the two are not connected.
fn range_graph(params: &PlannerParams, sorted: &[Candidate]) -> Vec<usize> {
    let n = sorted.len();
    if n == 0 {
        return Vec::new();
    }
    let mut graph = WeightMatrix::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if params.in_range(sorted[i].distance, sorted[j].distance) {
                graph.set_undirected(i, j, Some(1));
            }
        }
    }
    floyd_warshall(&graph).path(0, n - 1).unwrap_or_default()
}
