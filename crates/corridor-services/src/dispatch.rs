//! Routes decoded messages to the handler for this node's role.
//!
//! Every message kind has exactly one arm; a role that has no use for a kind
//! ignores it. Handlers return the payloads they want sent.

use std::time::Duration;

use corridor_core::message::{Message, Payload};
use corridor_core::Address;

use crate::node::RoleState;

/// Common receive filter: expired or self-originated messages are dropped.
pub fn accept(message: &Message, me: Address) -> bool {
    if message.ttl == 0 {
        tracing::trace!(kind = ?message.kind(), originator = %message.originator, "ttl expired");
        return false;
    }
    if message.originator == me {
        tracing::trace!(kind = ?message.kind(), "own message");
        return false;
    }
    true
}

pub fn dispatch(role: &mut RoleState, message: &Message, me: Address, now: Duration) -> Vec<Payload> {
    if !accept(message, me) {
        return Vec::new();
    }
    let originator = message.originator;

    match &message.payload {
        Payload::Hello(hello) => match role {
            RoleState::Local(lc) => {
                lc.on_hello(hello, originator, now);
                Vec::new()
            }
            _ => Vec::new(),
        },
        Payload::Routing(update) => match role {
            RoleState::Car(car) => {
                car.on_routing(update);
                Vec::new()
            }
            _ => Vec::new(),
        },
        Payload::Appointment(appointment) => match role {
            RoleState::Car(car) => {
                car.on_appointment(appointment);
                Vec::new()
            }
            _ => Vec::new(),
        },
        Payload::RouteRequest(request) => match role {
            RoleState::Local(lc) => lc.on_route_request(request).into_iter().collect(),
            _ => Vec::new(),
        },
        Payload::RouteReply(reply) => match role {
            RoleState::Local(lc) => lc.on_route_reply(reply),
            RoleState::Global(gc) => gc.on_route_reply(originator, reply),
            _ => Vec::new(),
        },
        Payload::LinkStatus(status) => match role {
            RoleState::Global(gc) => {
                gc.on_link_status(status);
                Vec::new()
            }
            _ => Vec::new(),
        },
        Payload::SegmentRoute(directive) => match role {
            RoleState::Local(lc) => lc.on_segment_route(directive),
            _ => Vec::new(),
        },
    }
}
