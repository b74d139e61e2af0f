//! Global controller role.

use corridor_core::message::{LinkStatus, Payload, RouteReply};
use corridor_core::Address;

use crate::segment_graph::{RoutePlan, SegmentGraph};

#[derive(Debug)]
pub struct GlobalController {
    pub control: Address,
    graph: SegmentGraph,
}

impl GlobalController {
    pub fn new(control: Address, graph: SegmentGraph) -> Self {
        Self { control, graph }
    }

    pub fn graph(&self) -> &SegmentGraph {
        &self.graph
    }

    pub fn on_link_status(&mut self, status: &LinkStatus) {
        self.graph.on_link_status(status);
    }

    /// A controller answered a route request: route from its segment to the
    /// segment currently holding the destination.
    pub fn on_route_reply(&self, originator: Address, reply: &RouteReply) -> Vec<Payload> {
        match self.plan_for(originator, reply) {
            Some(plan) => plan.directives.into_iter().map(Payload::SegmentRoute).collect(),
            None => Vec::new(),
        }
    }

    fn plan_for(&self, originator: Address, reply: &RouteReply) -> Option<RoutePlan> {
        let Some(source) = self.graph.segment_of(&originator) else {
            tracing::warn!(controller = %originator, "route reply from unassigned controller");
            return None;
        };
        let Some(target) = self.graph.segment_holding(&reply.destination) else {
            tracing::debug!(destination = %reply.destination, "destination not in any reported segment");
            return None;
        };
        Some(self.graph.compute_route(source, target, reply.destination))
    }
}
