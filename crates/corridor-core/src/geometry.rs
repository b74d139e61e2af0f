//! Road geometry — positions, segment bounding boxes, travel direction.
//!
//! A segment is a straight stretch of road aligned with one axis. Vehicles are
//! placed on it by their coordinate along that axis; the other horizontal
//! coordinate must stay within a lateral tolerance of the road centerline.

use serde::{Deserialize, Serialize};

/// Position or velocity in simulation units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// `self + v * seconds`. Used for dead reckoning.
    pub fn advanced(&self, velocity: &Vector3, seconds: f64) -> Vector3 {
        Vector3 {
            x: self.x + velocity.x * seconds,
            y: self.y + velocity.y * seconds,
            z: self.z + velocity.z * seconds,
        }
    }

    pub fn distance(&self, other: &Vector3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Truncate each coordinate to a whole unit, as carried on the wire.
    pub fn truncated(&self) -> [i32; 3] {
        [self.x as i32, self.y as i32, self.z as i32]
    }

    pub fn from_truncated(coords: [i32; 3]) -> Vector3 {
        Vector3 {
            x: coords[0] as f64,
            y: coords[1] as f64,
            z: coords[2] as f64,
        }
    }
}

/// Axis a segment runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Coordinate along the axis.
    pub fn along(self, p: &Vector3) -> f64 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }

    /// Horizontal coordinate across the axis.
    pub fn across(self, p: &Vector3) -> f64 {
        match self {
            Axis::X => p.y,
            Axis::Y => p.x,
        }
    }
}

/// Travel direction relative to a segment's start point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Start toward end: the along-axis coordinate increases.
    Forward,
    /// End toward start.
    Reverse,
}

/// Bounding box of one controller-owned segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub axis: Axis,
    /// Along-axis coordinate of the start point.
    pub start: f64,
    /// Along-axis coordinate of the end point. Always `>= start`.
    pub end: f64,
    /// Across-axis coordinate of the road centerline.
    pub lateral: f64,
    /// Allowed distance from the centerline.
    pub half_width: f64,
}

impl Segment {
    pub fn new(axis: Axis, start: f64, end: f64, lateral: f64, half_width: f64) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            axis,
            start,
            end,
            lateral,
            half_width,
        }
    }

    /// Derive the segment a controller at `center` owns on a grid of roads
    /// spaced `road_length` apart.
    ///
    /// A controller whose x coordinate sits on a grid line watches a road
    /// running along y, and vice versa. Off-grid controllers default to x.
    pub fn around(center: &Vector3, road_length: f64, half_length: f64, half_width: f64) -> Self {
        let on_grid = |v: f64| road_length > 0.0 && (v as i64) % (road_length as i64).max(1) == 0;
        let axis = if on_grid(center.x) {
            Axis::Y
        } else {
            Axis::X
        };
        let mid = axis.along(center);
        Segment::new(
            axis,
            mid - half_length,
            mid + half_length,
            axis.across(center),
            half_width,
        )
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Is `p` inside this segment's bounding box? Edges count as inside.
    pub fn contains(&self, p: &Vector3) -> bool {
        let along = self.axis.along(p);
        let across = self.axis.across(p);
        along >= self.start
            && along <= self.end
            && across >= self.lateral - self.half_width
            && across <= self.lateral + self.half_width
    }

    /// Direction of travel from `previous` to `current`, and the distance of
    /// `current` from the endpoint that direction starts at.
    ///
    /// A stationary vehicle counts as moving forward.
    pub fn locate(&self, previous: &Vector3, current: &Vector3) -> (f64, Direction) {
        let delta = self.axis.along(current) - self.axis.along(previous);
        if delta >= 0.0 {
            self.locate_heading(current, Direction::Forward)
        } else {
            self.locate_heading(current, Direction::Reverse)
        }
    }

    /// Distance of `p` from the start of a chain running in `direction`.
    pub fn locate_heading(&self, p: &Vector3, direction: Direction) -> (f64, Direction) {
        let along = self.axis.along(p);
        match direction {
            Direction::Forward => (along - self.start, Direction::Forward),
            Direction::Reverse => (self.end - along, Direction::Reverse),
        }
    }

    /// Heading implied by a velocity vector. Used before a second position
    /// sample exists.
    pub fn heading_of(&self, velocity: &Vector3) -> Direction {
        if self.axis.along(velocity) >= 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
}

/// Rectangle a vehicle must stay inside to remain tracked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Area {
    pub fn contains(&self, p: &Vector3) -> bool {
        p.x >= self.min[0] && p.x <= self.max[0] && p.y >= self.min[1] && p.y <= self.max[1]
    }
}
