//! Corridor wire format — fixed on-wire sections for every control message.
//!
//! Every field here is part of the protocol. All multi-byte integers are
//! network byte order. The fixed sections are zerocopy structs built from
//! big-endian integer wrappers, so they have no padding and no alignment
//! requirement; the variable-length tuple lists that follow some of them are
//! assembled in `message.rs`.
//!
//! There is no unsafe code in this module.

use std::net::Ipv4Addr;

use static_assertions::assert_eq_size;
use zerocopy::byteorder::network_endian::{I32, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Opaque 32-bit network identifier. Used as node identity and, overloaded,
/// as route destination, mask and next hop.
pub type Address = Ipv4Addr;

// ── Packet Envelope ───────────────────────────────────────────────────────────

/// Transmission unit header. One or more messages follow it.
///
/// `length` covers this header plus every contained message.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct PacketHeader {
    pub originator: U32,
    pub length: U16,
    pub sequence_number: U16,
}

assert_eq_size!(PacketHeader, [u8; 8]);

// ── Message Header ────────────────────────────────────────────────────────────

/// Per-message header. The type-specific payload follows immediately.
///
/// `size` covers this header plus the payload.
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct MessageHeader {
    pub originator: U32,
    /// See [`MessageKind`].
    pub kind: u8,
    /// Mantissa/exponent encoded validity, see [`seconds_to_valid_time`].
    pub valid_time: u8,
    pub size: U16,
    pub ttl: U16,
    pub sequence_number: U16,
}

assert_eq_size!(MessageHeader, [u8; 12]);

// ── Payload sections ──────────────────────────────────────────────────────────

/// Vehicle beacon. Coordinates are truncated to whole units on the wire.
///
/// Wire size: 28 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct HelloBody {
    pub vehicle: U32,
    pub position: [I32; 3],
    pub velocity: [I32; 3],
}

assert_eq_size!(HelloBody, [u8; 28]);

/// Fixed part of a routing message. `table_size` tuples follow.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RoutingHead {
    pub table_size: U32,
    pub owner: U32,
}

assert_eq_size!(RoutingHead, [u8; 8]);

/// One forwarding entry inside a routing message.
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RoutingTuple {
    pub destination: U32,
    pub mask: U32,
    pub next_hop: U32,
}

assert_eq_size!(RoutingTuple, [u8; 12]);

/// Relay role assignment for one vehicle.
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct AppointmentBody {
    pub vehicle: U32,
    /// 0xFFFF = forwarder, 0 = normal. Any nonzero value decodes as forwarder.
    pub kind: U32,
    pub next_forwarder: U32,
}

assert_eq_size!(AppointmentBody, [u8; 12]);

/// Route request addresses. The extended form appends a [`RequestPosition`].
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RouteRequestBody {
    pub source: U32,
    pub destination: U32,
}

assert_eq_size!(RouteRequestBody, [u8; 8]);

/// Requester position carried by the extended route request.
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RequestPosition {
    pub position: [I32; 3],
}

assert_eq_size!(RequestPosition, [u8; 12]);

/// Wire size: 12 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RouteReplyBody {
    pub source: U32,
    pub destination: U32,
    pub transfer: U32,
}

assert_eq_size!(RouteReplyBody, [u8; 12]);

/// Fixed part of a link-status report. Address pairs fill the rest.
///
/// Wire size: 20 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct LinkStatusHead {
    pub controller: U32,
    pub forward_count: U32,
    pub reverse_count: U32,
    pub first_forward: U32,
    pub first_reverse: U32,
}

assert_eq_size!(LinkStatusHead, [u8; 20]);

/// Vehicle service address and the control address that owns it.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct AddressPair {
    pub vehicle: U32,
    pub owner: U32,
}

assert_eq_size!(AddressPair, [u8; 8]);

/// Per-segment directive from the global controller.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct SegmentRouteBody {
    pub controller: U32,
    pub destination: U32,
    pub next_hop: U32,
    pub direction: U32,
}

assert_eq_size!(SegmentRouteBody, [u8; 16]);

// ── Message kind ──────────────────────────────────────────────────────────────

/// Message type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Hello = 1,
    Routing = 2,
    Appointment = 3,
    RouteRequest = 4,
    RouteReply = 5,
    LinkStatus = 6,
    SegmentRoute = 7,
}

impl TryFrom<u8> for MessageKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageKind::Hello),
            2 => Ok(MessageKind::Routing),
            3 => Ok(MessageKind::Appointment),
            4 => Ok(MessageKind::RouteRequest),
            5 => Ok(MessageKind::RouteReply),
            6 => Ok(MessageKind::LinkStatus),
            7 => Ok(MessageKind::SegmentRoute),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(k: MessageKind) -> u8 {
        k as u8
    }
}

// ── Direction code ────────────────────────────────────────────────────────────

/// Which chain a cross-segment hop leaves on and which it enters on.
///
/// The first half names the chain used inside the segment being left, the
/// second half the chain used inside the segment being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DirectionCode {
    ReverseToReverse = 0,
    ReverseToForward = 1,
    ForwardToReverse = 2,
    ForwardToForward = 3,
}

impl DirectionCode {
    /// Chain to use when this segment is the one being left.
    pub fn leaves_forward(self) -> bool {
        matches!(
            self,
            DirectionCode::ForwardToReverse | DirectionCode::ForwardToForward
        )
    }

    /// Chain to use when this segment is the one being entered.
    pub fn enters_forward(self) -> bool {
        matches!(
            self,
            DirectionCode::ReverseToForward | DirectionCode::ForwardToForward
        )
    }
}

impl TryFrom<u32> for DirectionCode {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DirectionCode::ReverseToReverse),
            1 => Ok(DirectionCode::ReverseToForward),
            2 => Ok(DirectionCode::ForwardToReverse),
            3 => Ok(DirectionCode::ForwardToForward),
            other => Err(WireError::UnknownDirection(other)),
        }
    }
}

impl From<DirectionCode> for u32 {
    fn from(d: DirectionCode) -> u32 {
        d as u32
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

pub const PACKET_HEADER_SIZE: usize = 8;
pub const MESSAGE_HEADER_SIZE: usize = 12;
pub const HELLO_SIZE: usize = 28;
pub const ROUTING_HEAD_SIZE: usize = 8;
pub const ROUTING_TUPLE_SIZE: usize = 12;
pub const APPOINTMENT_SIZE: usize = 12;
pub const ROUTE_REQUEST_SIZE: usize = 8;
pub const ROUTE_REQUEST_EXTENDED_SIZE: usize = 20;
pub const ROUTE_REPLY_SIZE: usize = 12;
pub const LINK_STATUS_HEAD_SIZE: usize = 20;
pub const ADDRESS_PAIR_SIZE: usize = 8;
pub const SEGMENT_ROUTE_SIZE: usize = 16;

/// Largest size a message or packet can declare.
pub const MAX_DECLARED_SIZE: usize = u16::MAX as usize;

/// Default cap on messages batched into one packet.
pub const MAX_MESSAGES_PER_PACKET: usize = 64;

/// Appointment kind value for a forwarder.
pub const APPOINTMENT_FORWARDER: u32 = 0xFFFF;

/// Hop-limit written into every outgoing message. Control messages travel a
/// single broadcast hop, so the value is only checked against zero.
pub const DEFAULT_TTL: u16 = 64;

/// Mask installed with every chain entry. Allows up to 4096 addresses.
pub const ROUTE_MASK: Address = Address::new(255, 255, 240, 0);

/// Reserved "no route" destination carried by segment-route directives and
/// used as the first-vehicle marker of a disabled chain at the global tier.
pub const NO_ROUTE: Address = Address::new(1, 1, 1, 1);

/// Placeholder for a missing first vehicle or control address in a link-status
/// report.
pub const UNASSIGNED: Address = Address::new(0, 0, 0, 1);

// ── Valid time ────────────────────────────────────────────────────────────────

/// Scaling factor of the mantissa/exponent time encoding, in seconds.
const VTIME_SCALE: f64 = 1.0 / 16.0;

/// Largest encodable validity, `0xFF`.
const VTIME_MAX: f64 = VTIME_SCALE * (1.0 + 15.0 / 16.0) * 32768.0;

/// Encode a duration in seconds into the 8-bit mantissa/exponent form
/// (`value = C * (1 + a/16) * 2^b`, high nibble `a`, low nibble `b`).
pub fn seconds_to_valid_time(seconds: f64) -> u8 {
    if seconds.is_nan() || seconds <= VTIME_SCALE {
        return 0;
    }
    let seconds = seconds.min(VTIME_MAX);
    let mut b: i32 = 0;
    while seconds / VTIME_SCALE >= f64::powi(2.0, b) {
        b += 1;
    }
    b -= 1;
    let mut a = 16.0 * (seconds / (VTIME_SCALE * f64::powi(2.0, b)) - 1.0);
    a = a.ceil();
    if a >= 16.0 {
        b += 1;
        a = 0.0;
    }
    let b = b.clamp(0, 15) as u8;
    ((a as u8) << 4) | b
}

/// Inverse of [`seconds_to_valid_time`].
pub fn valid_time_to_seconds(encoded: u8) -> f64 {
    let a = (encoded >> 4) as f64;
    let b = (encoded & 0x0f) as i32;
    VTIME_SCALE * (1.0 + a / 16.0) * f64::powi(2.0, b)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting or producing wire-format data.
///
/// Every decode variant is a malformed message: the message is discarded,
/// never answered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown message type: {0}")]
    UnknownKind(u8),

    #[error("unknown direction code: {0}")]
    UnknownDirection(u32),

    #[error("buffer truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("declared size {declared} does not match consumed {consumed}")]
    SizeMismatch { declared: usize, consumed: usize },

    #[error("{remainder} trailing bytes do not form a whole {tuple}-byte tuple")]
    PartialTuple { remainder: usize, tuple: usize },

    #[error("table size field says {declared} tuples, payload holds {actual}")]
    CountMismatch { declared: usize, actual: usize },

    #[error("encoded size {0} exceeds maximum {}", MAX_DECLARED_SIZE)]
    TooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
