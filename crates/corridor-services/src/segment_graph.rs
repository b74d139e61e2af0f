//! Segment graph — the global controller's view of the road network.
//!
//! Nodes are the 24 road segments of the deployment grid, numbered 1..=24.
//! Adjacency and the direction code of each junction are fixed; edge weights
//! come from the chain lengths local controllers report. A segment with a
//! chain too short in the direction a hop needs breaks that edge.

use std::collections::BTreeMap;

use corridor_core::config::SegmentAssignment;
use corridor_core::message::{LinkStatus, SegmentRoute};
use corridor_core::wire::{DirectionCode, NO_ROUTE};
use corridor_core::Address;

use crate::shortest_path::{floyd_warshall, WeightMatrix};

pub const SEGMENT_COUNT: usize = 24;

use DirectionCode::{
    ForwardToForward as FF, ForwardToReverse as FR, ReverseToForward as RF,
    ReverseToReverse as RR,
};

/// Row `i` lists the neighbors of segment `i + 1` with the code of the hop
/// from `i + 1` into that neighbor.
const ADJACENCY: [&[(u8, DirectionCode)]; SEGMENT_COUNT] = [
    /*  1 */ &[(2, FF), (5, FF), (4, RF)],
    /*  2 */ &[(1, RR), (5, RF), (6, FF), (3, FF)],
    /*  3 */ &[(2, RR), (6, RF), (7, FF)],
    /*  4 */ &[(11, FF), (8, FF), (1, RF)],
    /*  5 */ &[(1, RR), (8, FR), (12, FF), (9, FF), (2, RF)],
    /*  6 */ &[(2, RR), (9, FR), (13, FF), (10, FF), (3, RF)],
    /*  7 */ &[(3, RR), (10, FR), (14, FF)],
    /*  8 */ &[(4, RR), (11, RF), (12, FF), (9, FF), (5, FR)],
    /*  9 */ &[(5, RR), (8, RR), (12, RF), (13, FF), (10, FF), (6, FR)],
    /* 10 */ &[(6, RR), (9, RR), (13, RF), (14, FF), (7, FR)],
    /* 11 */ &[(18, FF), (15, FF), (8, RF), (4, RR)],
    /* 12 */ &[(8, RR), (15, FR), (19, FF), (16, FF), (9, RF), (5, RR)],
    /* 13 */ &[(9, RR), (16, FR), (20, FF), (17, FF), (10, RF), (6, RR)],
    /* 14 */ &[(10, RR), (17, FR), (21, FF), (7, RR)],
    /* 15 */ &[(11, RR), (18, RF), (19, FF), (16, FF), (12, FR)],
    /* 16 */ &[(12, RR), (15, RR), (19, RF), (20, FF), (17, FF), (13, FR)],
    /* 17 */ &[(13, RR), (16, RR), (20, RF), (21, FF), (14, FR)],
    /* 18 */ &[(22, FF), (15, RF), (11, RR)],
    /* 19 */ &[(15, RR), (22, FR), (23, FF), (16, RF), (12, RR)],
    /* 20 */ &[(16, RR), (23, FR), (24, FF), (17, RF), (13, RR)],
    /* 21 */ &[(17, RR), (24, FR), (14, RR)],
    /* 22 */ &[(18, RR), (23, FF), (19, FR)],
    /* 23 */ &[(19, RR), (22, RR), (24, FF), (20, FR)],
    /* 24 */ &[(20, RR), (23, RR), (21, FR)],
];

/// Direction code of the hop `from → to`, if the two segments meet.
pub fn direction_code(from: u8, to: u8) -> Option<DirectionCode> {
    let row = ADJACENCY.get(usize::from(from).checked_sub(1)?)?;
    row.iter().find(|(n, _)| *n == to).map(|(_, code)| *code)
}

fn index(segment: u8) -> Option<usize> {
    let i = usize::from(segment).checked_sub(1)?;
    (i < SEGMENT_COUNT).then_some(i)
}

/// Latest report for one segment.
#[derive(Debug, Clone)]
pub struct SegmentState {
    /// Hop count of the forward chain, if long enough to route through.
    pub forward_hops: Option<u32>,
    pub reverse_hops: Option<u32>,
    pub first_forward: Address,
    pub first_reverse: Address,
    /// Vehicle service address → vehicle control address.
    pub addresses: BTreeMap<Address, Address>,
}

impl Default for SegmentState {
    fn default() -> Self {
        Self {
            forward_hops: None,
            reverse_hops: None,
            first_forward: NO_ROUTE,
            first_reverse: NO_ROUTE,
            addresses: BTreeMap::new(),
        }
    }
}

impl SegmentState {
    fn hops(&self, forward: bool) -> Option<u32> {
        if forward {
            self.forward_hops
        } else {
            self.reverse_hops
        }
    }

    fn first(&self, forward: bool) -> Address {
        if forward {
            self.first_forward
        } else {
            self.first_reverse
        }
    }
}

/// Result of a cross-segment computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    /// Segments visited, source first. Empty when unreachable.
    pub segments: Vec<u8>,
    /// Directives to send, one per controller on the path, or the single
    /// no-route sentinel to the source controller.
    pub directives: Vec<SegmentRoute>,
}

impl RoutePlan {
    pub fn is_reachable(&self) -> bool {
        !self.segments.is_empty()
    }
}

#[derive(Debug)]
pub struct SegmentGraph {
    min_chain_len: u32,
    controllers: BTreeMap<Address, u8>,
    segments: Vec<SegmentState>,
}

impl SegmentGraph {
    pub fn new(min_chain_len: u32, assignments: &[SegmentAssignment]) -> Self {
        let mut controllers = BTreeMap::new();
        for a in assignments {
            if index(a.segment).is_none() {
                tracing::warn!(controller = %a.controller, segment = a.segment, "segment id out of range, ignored");
                continue;
            }
            controllers.insert(a.controller, a.segment);
        }
        Self {
            min_chain_len,
            controllers,
            segments: vec![SegmentState::default(); SEGMENT_COUNT],
        }
    }

    pub fn segment_of(&self, controller: &Address) -> Option<u8> {
        self.controllers.get(controller).copied()
    }

    pub fn controller_of(&self, segment: u8) -> Option<Address> {
        self.controllers
            .iter()
            .find(|(_, s)| **s == segment)
            .map(|(c, _)| *c)
    }

    pub fn state(&self, segment: u8) -> Option<&SegmentState> {
        self.segments.get(index(segment)?)
    }

    /// Store a controller's report. Returns the segment it updated, or `None`
    /// if the controller has no segment assignment.
    pub fn on_link_status(&mut self, status: &LinkStatus) -> Option<u8> {
        let Some(segment) = self.segment_of(&status.controller) else {
            tracing::warn!(controller = %status.controller, "link status from unassigned controller");
            return None;
        };
        let min = self.min_chain_len;
        let state = self.segments.get_mut(index(segment)?)?;

        if status.forward_count > min {
            state.forward_hops = Some(status.forward_count);
            state.first_forward = status.first_forward;
        } else {
            state.forward_hops = None;
            state.first_forward = NO_ROUTE;
        }
        if status.reverse_count > min {
            state.reverse_hops = Some(status.reverse_count);
            state.first_reverse = status.first_reverse;
        } else {
            state.reverse_hops = None;
            state.first_reverse = NO_ROUTE;
        }

        state.addresses.clear();
        if state.forward_hops.is_some() || state.reverse_hops.is_some() {
            state.addresses.extend(status.addresses.iter().copied());
        }

        tracing::debug!(
            segment,
            forward = ?state.forward_hops,
            reverse = ?state.reverse_hops,
            vehicles = state.addresses.len(),
            "link status stored"
        );
        Some(segment)
    }

    /// Segment whose latest report lists `vehicle`.
    pub fn segment_holding(&self, vehicle: &Address) -> Option<u8> {
        self.segments
            .iter()
            .position(|s| s.addresses.contains_key(vehicle))
            .and_then(|i| u8::try_from(i + 1).ok())
    }

    /// Edge weights from the current reports. Index `i` is segment `i + 1`.
    pub fn weights(&self) -> WeightMatrix {
        let mut matrix = WeightMatrix::new(SEGMENT_COUNT);
        for (i, row) in ADJACENCY.iter().enumerate() {
            let from = &self.segments[i];
            for (to, code) in row.iter() {
                let Some(j) = index(*to) else { continue };
                let into = &self.segments[j];
                let weight = from
                    .hops(code.leaves_forward())
                    .zip(into.hops(code.enters_forward()))
                    .map(|(a, b)| u64::from(a) + u64::from(b));
                matrix.set(i, j, weight);
            }
        }
        matrix
    }

    /// Route from `source` segment to `target` segment for traffic to
    /// `destination`.
    pub fn compute_route(&self, source: u8, target: u8, destination: Address) -> RoutePlan {
        let path = match (index(source), index(target)) {
            (Some(s), Some(t)) => floyd_warshall(&self.weights()).path(s, t),
            _ => None,
        };
        let Some(path) = path else {
            tracing::info!(source, target, %destination, "no segment route");
            return self.unreachable(source);
        };
        let segments: Vec<u8> = path
            .iter()
            .filter_map(|i| u8::try_from(i + 1).ok())
            .collect();

        let mut directives = Vec::with_capacity(segments.len());
        for hop in segments.windows(2) {
            let (here, next) = (hop[0], hop[1]);
            let (Some(code), Some(controller), Some(state)) = (
                direction_code(here, next),
                self.controller_of(here),
                self.state(next),
            ) else {
                continue;
            };
            directives.push(SegmentRoute {
                controller,
                destination,
                next_hop: state.first(code.enters_forward()),
                direction: code,
            });
        }

        let last = segments.last().copied().unwrap_or(target);
        let final_code = match segments.len() {
            0 | 1 => Some(DirectionCode::ForwardToForward),
            n => direction_code(segments[n - 2], last),
        };
        if let (Some(controller), Some(code)) = (self.controller_of(last), final_code) {
            directives.push(SegmentRoute {
                controller,
                destination,
                next_hop: destination,
                direction: code,
            });
        }

        tracing::info!(?segments, %destination, "segment route computed");
        RoutePlan {
            segments,
            directives,
        }
    }

    fn unreachable(&self, source: u8) -> RoutePlan {
        let directives = self
            .controller_of(source)
            .map(|controller| SegmentRoute {
                controller,
                destination: NO_ROUTE,
                next_hop: NO_ROUTE,
                direction: DirectionCode::ReverseToReverse,
            })
            .into_iter()
            .collect();
        RoutePlan {
            segments: Vec::new(),
            directives,
        }
    }
}
