//! Kinematic model of the hosting node.
//!
//! The protocol only ever asks "where am I and how fast am I going". The host
//! supplies the answer: a simulator plugs in its own trace, the daemon uses a
//! straight-line model from config.

use std::time::Duration;

use corridor_core::Vector3;

pub trait Mobility: Send {
    fn position(&self, now: Duration) -> Vector3;
    fn velocity(&self, now: Duration) -> Vector3;
}

/// Constant velocity from a starting point at time zero.
#[derive(Debug, Clone, Copy)]
pub struct LinearMobility {
    pub origin: Vector3,
    pub velocity: Vector3,
}

impl LinearMobility {
    pub fn new(origin: Vector3, velocity: Vector3) -> Self {
        Self { origin, velocity }
    }
}

impl Mobility for LinearMobility {
    fn position(&self, now: Duration) -> Vector3 {
        self.origin.advanced(&self.velocity, now.as_secs_f64())
    }

    fn velocity(&self, _now: Duration) -> Vector3 {
        self.velocity
    }
}

/// Road-side units never move.
#[derive(Debug, Clone, Copy)]
pub struct StaticMobility(pub Vector3);

impl Mobility for StaticMobility {
    fn position(&self, _now: Duration) -> Vector3 {
        self.0
    }

    fn velocity(&self, _now: Duration) -> Vector3 {
        Vector3::ZERO
    }
}
