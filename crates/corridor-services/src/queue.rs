//! Outgoing message batching.
//!
//! Messages are stamped with the node's header fields as they are queued and
//! leave in packets of at most `max_per_packet` messages. The node decides
//! when to drain: immediately once a full packet is waiting, otherwise when
//! the jittered flush timer fires.

use bytes::Bytes;

use corridor_core::message::{Message, Packet, Payload};
use corridor_core::wire::{DEFAULT_TTL, MAX_DECLARED_SIZE, PACKET_HEADER_SIZE};
use corridor_core::Address;

#[derive(Debug)]
pub struct OutgoingQueue {
    originator: Address,
    valid_time: u8,
    max_per_packet: usize,
    packet_sequence: u16,
    message_sequence: u16,
    pending: Vec<Message>,
}

impl OutgoingQueue {
    pub fn new(originator: Address, valid_time: u8, max_per_packet: usize) -> Self {
        Self {
            originator,
            valid_time,
            max_per_packet: max_per_packet.max(1),
            // first increment yields 0
            packet_sequence: u16::MAX,
            message_sequence: u16::MAX,
            pending: Vec::new(),
        }
    }

    fn next_message_sequence(&mut self) -> u16 {
        self.message_sequence = self.message_sequence.wrapping_add(1);
        self.message_sequence
    }

    fn next_packet_sequence(&mut self) -> u16 {
        self.packet_sequence = self.packet_sequence.wrapping_add(1);
        self.packet_sequence
    }

    /// Queue a payload. Returns true once a full packet is waiting.
    pub fn push(&mut self, payload: Payload) -> bool {
        let sequence_number = self.next_message_sequence();
        self.pending.push(Message {
            originator: self.originator,
            valid_time: self.valid_time,
            ttl: DEFAULT_TTL,
            sequence_number,
            payload,
        });
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.max_per_packet
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain everything queued into encoded packets.
    ///
    /// A packet closes at `max_per_packet` messages or before its length
    /// would overflow the envelope's 16-bit field. A message that cannot be
    /// encoded even alone is dropped with a warning.
    pub fn drain(&mut self) -> Vec<Bytes> {
        let mut packets = Vec::new();
        let mut batch: Vec<Message> = Vec::new();
        let mut batch_size = PACKET_HEADER_SIZE;

        for message in std::mem::take(&mut self.pending) {
            let size = message.serialized_size();
            if !batch.is_empty()
                && (batch.len() >= self.max_per_packet || batch_size + size > MAX_DECLARED_SIZE)
            {
                self.seal(std::mem::take(&mut batch), &mut packets);
                batch_size = PACKET_HEADER_SIZE;
            }
            batch_size += size;
            batch.push(message);
        }
        if !batch.is_empty() {
            self.seal(batch, &mut packets);
        }
        packets
    }

    fn seal(&mut self, messages: Vec<Message>, out: &mut Vec<Bytes>) {
        let count = messages.len();
        let packet = Packet {
            originator: self.originator,
            sequence_number: self.next_packet_sequence(),
            messages,
        };
        match packet.encode() {
            Ok(bytes) => out.push(bytes),
            Err(e) => tracing::warn!(error = %e, messages = count, "dropping unencodable packet"),
        }
    }
}
