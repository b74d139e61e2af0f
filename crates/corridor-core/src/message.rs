//! Control messages and the packet envelope that carries them.
//!
//! `Message` is a closed sum over the seven payload kinds. Encoding computes
//! every size field; decoding checks every size field against what was
//! actually consumed and rejects the message on any disagreement.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::byteorder::network_endian::{I32, U16, U32};
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{
    AddressPair, Address, AppointmentBody, DirectionCode, HelloBody, LinkStatusHead,
    MessageHeader, MessageKind, PacketHeader, RequestPosition, RouteReplyBody, RouteRequestBody,
    RoutingHead, RoutingTuple, SegmentRouteBody, WireError, ADDRESS_PAIR_SIZE,
    APPOINTMENT_FORWARDER, APPOINTMENT_SIZE, HELLO_SIZE, LINK_STATUS_HEAD_SIZE,
    MAX_DECLARED_SIZE, MESSAGE_HEADER_SIZE, PACKET_HEADER_SIZE, ROUTE_REPLY_SIZE,
    ROUTE_REQUEST_EXTENDED_SIZE, ROUTE_REQUEST_SIZE, ROUTING_HEAD_SIZE, ROUTING_TUPLE_SIZE,
    SEGMENT_ROUTE_SIZE,
};

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Periodic vehicle beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// The vehicle's service-channel address.
    pub vehicle: Address,
    pub position: [i32; 3],
    pub velocity: [i32; 3],
}

/// One forwarding entry pushed to a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTuple {
    pub destination: Address,
    pub mask: Address,
    pub next_hop: Address,
}

/// Full forwarding table for one vehicle. Replaces whatever it had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingUpdate {
    /// Control-channel address of the vehicle that must install the table.
    pub owner: Address,
    pub entries: Vec<RouteTuple>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentKind {
    Normal,
    Forwarder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub vehicle: Address,
    pub kind: AppointmentKind,
    pub next_forwarder: Address,
}

/// Vehicle asks the controllers for a way to reach `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub source: Address,
    pub destination: Address,
    /// Requester position, truncated. Present in the extended form only.
    pub position: Option<[i32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReply {
    pub source: Address,
    pub destination: Address,
    /// Vehicle the destination can be reached through.
    pub transfer: Address,
}

/// Controller-to-global report of current chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub controller: Address,
    pub forward_count: u32,
    pub reverse_count: u32,
    pub first_forward: Address,
    pub first_reverse: Address,
    /// `(vehicle service address, vehicle control address)` for every
    /// vehicle the controller tracks.
    pub addresses: Vec<(Address, Address)>,
}

/// Global-to-controller directive for one hop of a cross-segment route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRoute {
    pub controller: Address,
    pub destination: Address,
    pub next_hop: Address,
    pub direction: DirectionCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Hello(Hello),
    Routing(RoutingUpdate),
    Appointment(Appointment),
    RouteRequest(RouteRequest),
    RouteReply(RouteReply),
    LinkStatus(LinkStatus),
    SegmentRoute(SegmentRoute),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Hello(_) => MessageKind::Hello,
            Payload::Routing(_) => MessageKind::Routing,
            Payload::Appointment(_) => MessageKind::Appointment,
            Payload::RouteRequest(_) => MessageKind::RouteRequest,
            Payload::RouteReply(_) => MessageKind::RouteReply,
            Payload::LinkStatus(_) => MessageKind::LinkStatus,
            Payload::SegmentRoute(_) => MessageKind::SegmentRoute,
        }
    }

    /// Bytes this payload occupies after the message header.
    pub fn serialized_size(&self) -> usize {
        match self {
            Payload::Hello(_) => HELLO_SIZE,
            Payload::Routing(r) => ROUTING_HEAD_SIZE + r.entries.len() * ROUTING_TUPLE_SIZE,
            Payload::Appointment(_) => APPOINTMENT_SIZE,
            Payload::RouteRequest(r) if r.position.is_some() => ROUTE_REQUEST_EXTENDED_SIZE,
            Payload::RouteRequest(_) => ROUTE_REQUEST_SIZE,
            Payload::RouteReply(_) => ROUTE_REPLY_SIZE,
            Payload::LinkStatus(l) => LINK_STATUS_HEAD_SIZE + l.addresses.len() * ADDRESS_PAIR_SIZE,
            Payload::SegmentRoute(_) => SEGMENT_ROUTE_SIZE,
        }
    }

    fn encode_into(&self, out: &mut BytesMut) {
        match self {
            Payload::Hello(h) => out.put_slice(
                HelloBody {
                    vehicle: addr(h.vehicle),
                    position: h.position.map(I32::new),
                    velocity: h.velocity.map(I32::new),
                }
                .as_bytes(),
            ),
            Payload::Routing(r) => {
                out.put_slice(
                    RoutingHead {
                        table_size: U32::new(r.entries.len() as u32),
                        owner: addr(r.owner),
                    }
                    .as_bytes(),
                );
                for t in &r.entries {
                    out.put_slice(
                        RoutingTuple {
                            destination: addr(t.destination),
                            mask: addr(t.mask),
                            next_hop: addr(t.next_hop),
                        }
                        .as_bytes(),
                    );
                }
            }
            Payload::Appointment(a) => out.put_slice(
                AppointmentBody {
                    vehicle: addr(a.vehicle),
                    kind: U32::new(match a.kind {
                        AppointmentKind::Forwarder => APPOINTMENT_FORWARDER,
                        AppointmentKind::Normal => 0,
                    }),
                    next_forwarder: addr(a.next_forwarder),
                }
                .as_bytes(),
            ),
            Payload::RouteRequest(r) => {
                out.put_slice(
                    RouteRequestBody {
                        source: addr(r.source),
                        destination: addr(r.destination),
                    }
                    .as_bytes(),
                );
                if let Some(position) = r.position {
                    out.put_slice(
                        RequestPosition {
                            position: position.map(I32::new),
                        }
                        .as_bytes(),
                    );
                }
            }
            Payload::RouteReply(r) => out.put_slice(
                RouteReplyBody {
                    source: addr(r.source),
                    destination: addr(r.destination),
                    transfer: addr(r.transfer),
                }
                .as_bytes(),
            ),
            Payload::LinkStatus(l) => {
                out.put_slice(
                    LinkStatusHead {
                        controller: addr(l.controller),
                        forward_count: U32::new(l.forward_count),
                        reverse_count: U32::new(l.reverse_count),
                        first_forward: addr(l.first_forward),
                        first_reverse: addr(l.first_reverse),
                    }
                    .as_bytes(),
                );
                for (vehicle, owner) in &l.addresses {
                    out.put_slice(
                        AddressPair {
                            vehicle: addr(*vehicle),
                            owner: addr(*owner),
                        }
                        .as_bytes(),
                    );
                }
            }
            Payload::SegmentRoute(s) => out.put_slice(
                SegmentRouteBody {
                    controller: addr(s.controller),
                    destination: addr(s.destination),
                    next_hop: addr(s.next_hop),
                    direction: U32::new(s.direction.into()),
                }
                .as_bytes(),
            ),
        }
    }

    /// Decode a payload of `kind` that must occupy exactly `buf`.
    fn decode(kind: MessageKind, mut buf: &[u8]) -> Result<Payload, WireError> {
        let len = buf.len();
        let declared = MESSAGE_HEADER_SIZE + len;
        let fixed = move |expected: usize| -> Result<(), WireError> {
            if len == expected {
                Ok(())
            } else {
                Err(WireError::SizeMismatch {
                    declared,
                    consumed: MESSAGE_HEADER_SIZE + expected,
                })
            }
        };

        let payload = match kind {
            MessageKind::Hello => {
                fixed(HELLO_SIZE)?;
                let body: HelloBody = take(&mut buf)?;
                Payload::Hello(Hello {
                    vehicle: body.vehicle.get().into(),
                    position: body.position.map(|c| c.get()),
                    velocity: body.velocity.map(|c| c.get()),
                })
            }
            MessageKind::Routing => {
                let head: RoutingHead = take(&mut buf)?;
                let count = tuple_count(buf.len(), ROUTING_TUPLE_SIZE)?;
                if head.table_size.get() as usize != count {
                    return Err(WireError::CountMismatch {
                        declared: head.table_size.get() as usize,
                        actual: count,
                    });
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let t: RoutingTuple = take(&mut buf)?;
                    entries.push(RouteTuple {
                        destination: t.destination.get().into(),
                        mask: t.mask.get().into(),
                        next_hop: t.next_hop.get().into(),
                    });
                }
                Payload::Routing(RoutingUpdate {
                    owner: head.owner.get().into(),
                    entries,
                })
            }
            MessageKind::Appointment => {
                fixed(APPOINTMENT_SIZE)?;
                let body: AppointmentBody = take(&mut buf)?;
                Payload::Appointment(Appointment {
                    vehicle: body.vehicle.get().into(),
                    kind: if body.kind.get() != 0 {
                        AppointmentKind::Forwarder
                    } else {
                        AppointmentKind::Normal
                    },
                    next_forwarder: body.next_forwarder.get().into(),
                })
            }
            MessageKind::RouteRequest => {
                if len != ROUTE_REQUEST_SIZE {
                    fixed(ROUTE_REQUEST_EXTENDED_SIZE)?;
                }
                let body: RouteRequestBody = take(&mut buf)?;
                let position = if buf.is_empty() {
                    None
                } else {
                    let p: RequestPosition = take(&mut buf)?;
                    Some(p.position.map(|c| c.get()))
                };
                Payload::RouteRequest(RouteRequest {
                    source: body.source.get().into(),
                    destination: body.destination.get().into(),
                    position,
                })
            }
            MessageKind::RouteReply => {
                fixed(ROUTE_REPLY_SIZE)?;
                let body: RouteReplyBody = take(&mut buf)?;
                Payload::RouteReply(RouteReply {
                    source: body.source.get().into(),
                    destination: body.destination.get().into(),
                    transfer: body.transfer.get().into(),
                })
            }
            MessageKind::LinkStatus => {
                let head: LinkStatusHead = take(&mut buf)?;
                let count = tuple_count(buf.len(), ADDRESS_PAIR_SIZE)?;
                let mut addresses = Vec::with_capacity(count);
                for _ in 0..count {
                    let pair: AddressPair = take(&mut buf)?;
                    addresses.push((pair.vehicle.get().into(), pair.owner.get().into()));
                }
                Payload::LinkStatus(LinkStatus {
                    controller: head.controller.get().into(),
                    forward_count: head.forward_count.get(),
                    reverse_count: head.reverse_count.get(),
                    first_forward: head.first_forward.get().into(),
                    first_reverse: head.first_reverse.get().into(),
                    addresses,
                })
            }
            MessageKind::SegmentRoute => {
                fixed(SEGMENT_ROUTE_SIZE)?;
                let body: SegmentRouteBody = take(&mut buf)?;
                Payload::SegmentRoute(SegmentRoute {
                    controller: body.controller.get().into(),
                    destination: body.destination.get().into(),
                    next_hop: body.next_hop.get().into(),
                    direction: DirectionCode::try_from(body.direction.get())?,
                })
            }
        };
        Ok(payload)
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub originator: Address,
    pub valid_time: u8,
    pub ttl: u16,
    pub sequence_number: u16,
    pub payload: Payload,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Header plus payload, as written into the `size` field.
    pub fn serialized_size(&self) -> usize {
        MESSAGE_HEADER_SIZE + self.payload.serialized_size()
    }

    pub fn encode_into(&self, out: &mut BytesMut) -> Result<(), WireError> {
        let size = self.serialized_size();
        if size > MAX_DECLARED_SIZE {
            return Err(WireError::TooLarge(size));
        }
        out.reserve(size);
        out.put_slice(
            MessageHeader {
                originator: addr(self.originator),
                kind: self.kind().into(),
                valid_time: self.valid_time,
                size: U16::new(size as u16),
                ttl: U16::new(self.ttl),
                sequence_number: U16::new(self.sequence_number),
            }
            .as_bytes(),
        );
        self.payload.encode_into(out);
        Ok(())
    }

    pub fn encode(&self) -> Result<Bytes, WireError> {
        let mut out = BytesMut::with_capacity(self.serialized_size());
        self.encode_into(&mut out)?;
        Ok(out.freeze())
    }

    /// Decode one message that must occupy all of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Message, WireError> {
        let mut rest = buf;
        let header: MessageHeader = take(&mut rest)?;
        let declared = header.size.get() as usize;
        if declared != buf.len() {
            return Err(WireError::SizeMismatch {
                declared,
                consumed: buf.len(),
            });
        }
        let kind = MessageKind::try_from(header.kind)?;
        let payload = Payload::decode(kind, rest)?;
        Ok(Message {
            originator: header.originator.get().into(),
            valid_time: header.valid_time,
            ttl: header.ttl.get(),
            sequence_number: header.sequence_number.get(),
            payload,
        })
    }
}

// ── Packet ────────────────────────────────────────────────────────────────────

/// Envelope plus its messages, as built by a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub originator: Address,
    pub sequence_number: u16,
    pub messages: Vec<Message>,
}

impl Packet {
    pub fn serialized_size(&self) -> usize {
        PACKET_HEADER_SIZE
            + self
                .messages
                .iter()
                .map(Message::serialized_size)
                .sum::<usize>()
    }

    pub fn encode(&self) -> Result<Bytes, WireError> {
        let length = self.serialized_size();
        if length > MAX_DECLARED_SIZE {
            return Err(WireError::TooLarge(length));
        }
        let mut out = BytesMut::with_capacity(length);
        out.put_slice(
            PacketHeader {
                originator: addr(self.originator),
                length: U16::new(length as u16),
                sequence_number: U16::new(self.sequence_number),
            }
            .as_bytes(),
        );
        for message in &self.messages {
            message.encode_into(&mut out)?;
        }
        Ok(out.freeze())
    }

    /// Strict decode: every message must be well-formed and the envelope
    /// length must match `buf` exactly.
    pub fn decode(buf: &[u8]) -> Result<Packet, WireError> {
        let reader = PacketReader::new(buf)?;
        if reader.length != buf.len() {
            return Err(WireError::SizeMismatch {
                declared: reader.length,
                consumed: buf.len(),
            });
        }
        let originator = reader.originator;
        let sequence_number = reader.sequence_number;
        let messages = reader.collect::<Result<Vec<_>, _>>()?;
        Ok(Packet {
            originator,
            sequence_number,
            messages,
        })
    }
}

/// Lenient, message-at-a-time packet decoding for receivers.
///
/// A message that fails to decode is yielded as an error and skipped using
/// its declared size. Iteration stops once the declared size itself cannot be
/// trusted, since the next message boundary is then unknown.
#[derive(Debug)]
pub struct PacketReader<'a> {
    pub originator: Address,
    pub sequence_number: u16,
    /// Envelope length as declared.
    pub length: usize,
    remaining: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, WireError> {
        let mut rest = buf;
        let header: PacketHeader = take(&mut rest)?;
        let length = header.length.get() as usize;
        if length < PACKET_HEADER_SIZE {
            return Err(WireError::SizeMismatch {
                declared: length,
                consumed: PACKET_HEADER_SIZE,
            });
        }
        if length > buf.len() {
            return Err(WireError::Truncated {
                needed: length,
                available: buf.len(),
            });
        }
        Ok(Self {
            originator: header.originator.get().into(),
            sequence_number: header.sequence_number.get(),
            length,
            remaining: &buf[PACKET_HEADER_SIZE..length],
        })
    }
}

impl<'a> Iterator for PacketReader<'a> {
    type Item = Result<Message, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let available = self.remaining.len();
        let declared = match MessageHeader::read_from_prefix(self.remaining) {
            Some(h) => h.size.get() as usize,
            None => {
                self.remaining = &[];
                return Some(Err(WireError::Truncated {
                    needed: MESSAGE_HEADER_SIZE,
                    available,
                }));
            }
        };
        if declared < MESSAGE_HEADER_SIZE || declared > available {
            self.remaining = &[];
            return Some(Err(WireError::SizeMismatch {
                declared,
                consumed: available,
            }));
        }
        let (current, rest) = self.remaining.split_at(declared);
        self.remaining = rest;
        Some(Message::decode(current))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn addr(a: Address) -> U32 {
    U32::new(u32::from(a))
}

/// Read one fixed section off the front of `buf`.
fn take<T: FromBytes>(buf: &mut &[u8]) -> Result<T, WireError> {
    let needed = std::mem::size_of::<T>();
    let available = buf.len();
    if available < needed {
        return Err(WireError::Truncated { needed, available });
    }
    let (head, rest) = buf.split_at(needed);
    let value = T::read_from(head).ok_or(WireError::Truncated { needed, available })?;
    *buf = rest;
    Ok(value)
}

fn tuple_count(len: usize, tuple: usize) -> Result<usize, WireError> {
    if len % tuple != 0 {
        return Err(WireError::PartialTuple {
            remainder: len % tuple,
            tuple,
        });
    }
    Ok(len / tuple)
}
