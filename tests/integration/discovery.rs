use crate::*;

use corridor_core::message::{Payload, RouteReply, RouteRequest};
use corridor_services::DiscoveryPhase;

// ══════════════════════════════════════════════════════════════════════════════
//  Reactive discovery — table misses turn into requests and replies
// ══════════════════════════════════════════════════════════════════════════════

/// Outside every segment in these scenarios.
const FAR_AWAY: Address = Address::new(10, 5, 0, 1);

/// Controller at 500 with a three-car forward chain 1 → 2 → 3.
fn chained_segment() -> (Sim, usize, usize) {
    let mut sim = Sim::new();
    let lc = sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), ChainStrategy::Greedy);
    let requester = parked(&mut sim, 1, 120.0);
    parked(&mut sim, 2, 350.0);
    parked(&mut sim, 3, 560.0);
    sim.start_all();
    sim.run_until(secs(6.0));
    (sim, lc, requester)
}

fn requests(sim: &Sim, from: usize) -> Vec<RouteRequest> {
    sim.sent_by(from)
        .filter_map(|m| match &m.payload {
            Payload::RouteRequest(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

fn replies(sim: &Sim, from: usize) -> Vec<RouteReply> {
    sim.sent_by(from)
        .filter_map(|m| match &m.payload {
            Payload::RouteReply(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_miss_is_answered_with_chain_head() -> Result<()> {
    let (mut sim, lc, requester) = chained_segment();

    assert_eq!(sim.route_output(requester, FAR_AWAY)?, RouteLookup::Discovering);
    assert_eq!(sim.car(requester).discovery_phase(FAR_AWAY), DiscoveryPhase::Waiting);
    sim.run_for(secs(1.0));

    let sent = requests(&sim, requester);
    assert_eq!(
        sent,
        vec![RouteRequest {
            source: car_cch(1),
            destination: FAR_AWAY,
            position: Some([120, 0, 0]),
        }]
    );

    assert_eq!(
        replies(&sim, lc),
        vec![RouteReply {
            source: car_cch(1),
            destination: FAR_AWAY,
            transfer: car_sch(1),
        }]
    );
    Ok(())
}

#[test]
fn test_one_request_per_epoch() -> Result<()> {
    let (mut sim, _, requester) = chained_segment();

    sim.route_output(requester, FAR_AWAY)?;
    sim.run_for(secs(0.5));
    sim.route_output(requester, FAR_AWAY)?;
    sim.run_for(secs(0.5));
    assert_eq!(requests(&sim, requester).len(), 1, "same discovery epoch");

    // Epochs are five seconds long; t = 10.5 is the next one.
    sim.run_until(secs(10.5));
    sim.route_output(requester, FAR_AWAY)?;
    sim.run_for(secs(0.5));
    assert_eq!(requests(&sim, requester).len(), 2);
    Ok(())
}

#[test]
fn test_local_destination_gets_no_reply() -> Result<()> {
    let (mut sim, lc, requester) = chained_segment();

    sim.route_output(requester, car_sch(3))?;
    sim.run_for(secs(1.0));

    assert_eq!(requests(&sim, requester).len(), 1);
    assert!(replies(&sim, lc).is_empty(), "the controller already tracks it");
    Ok(())
}

#[test]
fn test_request_from_outside_segment_is_ignored() -> Result<()> {
    let (mut sim, lc, _) = chained_segment();
    let off_road = sim.add_car(9, Vector3::new(500.0, 100.0, 0.0), Vector3::ZERO);
    let actions = sim.start(off_road);
    assert!(!actions.is_empty());

    sim.route_output(off_road, FAR_AWAY)?;
    sim.run_for(secs(1.0));

    assert_eq!(requests(&sim, off_road).len(), 1);
    assert!(replies(&sim, lc).is_empty());
    Ok(())
}

#[test]
fn test_neighbor_controller_splices_reply() -> Result<()> {
    let mut sim = Sim::new();
    sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), ChainStrategy::Greedy);
    let neighbor = sim.add_controller(2, Vector3::new(1500.0, 0.0, 0.0), ChainStrategy::Greedy);
    let requester = parked(&mut sim, 11, 115.0);
    parked(&mut sim, 12, 330.0);
    parked(&mut sim, 13, 545.0);
    let theirs: Vec<usize> = [1115.0, 1330.0, 1545.0]
        .iter()
        .zip(21u8..)
        .map(|(x, n)| parked(&mut sim, n, *x))
        .collect();
    sim.start_all();
    sim.run_until(secs(6.0));

    sim.route_output(requester, FAR_AWAY)?;
    sim.run_for(secs(1.0));

    // Vehicles already routing toward the road end learn the destination
    // through the same next hop; the terminal one hands off to the transfer.
    let next = |i: usize| sim.car(i).table.get(FAR_AWAY).map(|e| e.next_hop);
    assert_eq!(next(theirs[0]), Some(car_sch(22)));
    assert_eq!(next(theirs[1]), Some(car_sch(23)));
    assert_eq!(next(theirs[2]), Some(car_sch(11)));

    assert!(replies(&sim, neighbor).is_empty(), "the neighbor only listens");
    Ok(())
}
