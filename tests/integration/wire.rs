use crate::*;

use corridor_core::message::{Hello, Packet, Payload};
use corridor_core::wire::{DEFAULT_TTL, MESSAGE_HEADER_SIZE, PACKET_HEADER_SIZE};

// ══════════════════════════════════════════════════════════════════════════════
//  Wire robustness — what a controller does with damaged packets
// ══════════════════════════════════════════════════════════════════════════════

fn hello_message(n: u8, x: i32, ttl: u16) -> Message {
    Message {
        originator: car_cch(n),
        valid_time: 0x04,
        ttl,
        sequence_number: u16::from(n),
        payload: Payload::Hello(Hello {
            vehicle: car_sch(n),
            position: [x, 0, 0],
            velocity: [0, 0, 0],
        }),
    }
}

fn three_hellos() -> Bytes {
    let packet = Packet {
        originator: car_cch(1),
        sequence_number: 7,
        messages: vec![
            hello_message(1, 200, DEFAULT_TTL),
            hello_message(2, 300, DEFAULT_TTL),
            hello_message(3, 400, DEFAULT_TTL),
        ],
    };
    packet.encode().expect("packet fits")
}

fn listening_controller() -> (Sim, usize) {
    let mut sim = Sim::new();
    let lc = sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), ChainStrategy::Greedy);
    sim.start_all();
    (sim, lc)
}

#[test]
fn test_bad_message_type_skips_only_that_message() {
    let (mut sim, lc) = listening_controller();
    let mut bytes = three_hellos().to_vec();

    // Message type of the second Hello: packet header, first message, then
    // the 4-byte originator of the second.
    let hello_size = hello_message(1, 0, 1).serialized_size();
    bytes[PACKET_HEADER_SIZE + hello_size + 4] = 99;

    sim.inject(lc, &bytes);

    let tracker = sim.controller(lc).tracker();
    assert!(tracker.contains(&car_sch(1)));
    assert!(!tracker.contains(&car_sch(2)));
    assert!(tracker.contains(&car_sch(3)), "decoding resumes after the bad message");
}

#[test]
fn test_truncated_packet_is_dropped_whole() {
    let (mut sim, lc) = listening_controller();
    let bytes = three_hellos();

    let actions = sim.inject(lc, &bytes[..bytes.len() - 5]);
    assert!(actions.is_empty());
    assert!(sim.controller(lc).tracker().is_empty());

    let actions = sim.inject(lc, &bytes[..PACKET_HEADER_SIZE - 1]);
    assert!(actions.is_empty());
}

#[test]
fn test_lying_message_size_ends_the_packet() {
    let (mut sim, lc) = listening_controller();
    let mut bytes = three_hellos().to_vec();

    // Size field of the second message claims less than a header.
    let hello_size = hello_message(1, 0, 1).serialized_size();
    let size_at = PACKET_HEADER_SIZE + hello_size + 6;
    let bogus = (MESSAGE_HEADER_SIZE as u16 - 1).to_be_bytes();
    bytes[size_at..size_at + 2].copy_from_slice(&bogus);

    sim.inject(lc, &bytes);

    let tracker = sim.controller(lc).tracker();
    assert!(tracker.contains(&car_sch(1)));
    assert!(!tracker.contains(&car_sch(2)));
    assert!(!tracker.contains(&car_sch(3)), "boundary after a bad size is unknown");
}

#[test]
fn test_expired_message_is_ignored() {
    let (mut sim, lc) = listening_controller();
    let packet = Packet {
        originator: car_cch(1),
        sequence_number: 1,
        messages: vec![hello_message(1, 200, 0), hello_message(2, 300, DEFAULT_TTL)],
    };
    sim.inject(lc, &packet.encode().unwrap());

    let tracker = sim.controller(lc).tracker();
    assert!(!tracker.contains(&car_sch(1)), "ttl 0");
    assert!(tracker.contains(&car_sch(2)));
}

#[test]
fn test_sent_messages_carry_node_header_fields() {
    let mut sim = Sim::new();
    let lc = sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), ChainStrategy::Greedy);
    for n in 1..=3u8 {
        parked(&mut sim, n, 150.0 * f64::from(n));
    }
    sim.start_all();
    sim.run_until(secs(6.0));

    assert!(!sim.sent.is_empty());
    for s in &sim.sent {
        assert_eq!(s.message.valid_time, 0x04, "one second");
        assert_eq!(s.message.ttl, DEFAULT_TTL);
        assert_eq!(s.message.originator, sim.node(s.from).address());
    }

    let routing = sim
        .sent_by(lc)
        .filter(|m| matches!(m.payload, Payload::Routing(_)))
        .count();
    assert_eq!(routing, 3, "one routing message per tracked car");
}
