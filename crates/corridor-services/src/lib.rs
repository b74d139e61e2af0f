//! corridor-services — protocol logic for every node role.
//!
//! Nothing in here touches a socket or a clock. A host drives a
//! [`ProtocolNode`] through its entry points and carries out the returned
//! [`Action`]s.

pub mod controller;
pub mod discovery;
pub mod dispatch;
pub mod global;
pub mod mobility;
pub mod node;
pub mod planner;
pub mod queue;
pub mod routing_table;
pub mod segment_graph;
pub mod shortest_path;
pub mod tracker;
pub mod vehicle;

pub use controller::{ActiveRoute, LocalController};
pub use discovery::{DiscoveryPhase, RouteLookup};
pub use global::GlobalController;
pub use mobility::{LinearMobility, Mobility, StaticMobility};
pub use node::{Action, ProtocolNode, RoleState, TimerId};
pub use planner::{plan_chain, Candidate, PlannerParams, RelayChain};
pub use routing_table::{RoutingTable, RoutingTableEntry};
pub use segment_graph::{RoutePlan, SegmentGraph};
pub use tracker::{NeighborTracker, VehicleRecord};
pub use vehicle::VehicleState;
