//! corridor-core — shared types, wire format, geometry and configuration.
//! All other Corridor crates depend on this one.

pub mod config;
pub mod geometry;
pub mod message;
pub mod wire;

pub use geometry::{Direction, Segment, Vector3};
pub use message::{Message, Packet, PacketReader, Payload};
pub use wire::{Address, DirectionCode, MessageKind, WireError};
