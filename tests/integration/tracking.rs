use crate::*;

use corridor_core::geometry::Direction;

// ══════════════════════════════════════════════════════════════════════════════
//  Neighbor tracking — controllers learn vehicles from their Hellos
// ══════════════════════════════════════════════════════════════════════════════

fn controller_at_500(sim: &mut Sim) -> usize {
    sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), ChainStrategy::Greedy)
}

#[test]
fn test_vehicles_bucketed_by_heading() {
    let mut sim = Sim::new();
    let lc = controller_at_500(&mut sim);
    sim.add_car(1, Vector3::new(200.0, 0.0, 0.0), Vector3::new(10.0, 0.0, 0.0));
    sim.add_car(2, Vector3::new(800.0, 0.0, 0.0), Vector3::new(-10.0, 0.0, 0.0));
    sim.start_all();
    sim.run_until(secs(3.0));

    let tracker = sim.controller(lc).tracker();
    assert!(tracker.in_bucket(&car_sch(1), Direction::Forward));
    assert!(tracker.in_bucket(&car_sch(2), Direction::Reverse));

    // Segment runs 15..985 along x; forward distance is measured from 15,
    // reverse from 985.
    let eastbound = tracker.get(&car_sch(1)).unwrap();
    assert!(eastbound.distance > 185.0 && eastbound.distance < 225.0, "{}", eastbound.distance);
    let westbound = tracker.get(&car_sch(2)).unwrap();
    assert!(westbound.distance > 185.0 && westbound.distance < 225.0, "{}", westbound.distance);

    println!(
        "eastbound at {:.0}, westbound at {:.0}",
        eastbound.distance, westbound.distance
    );
}

#[test]
fn test_control_address_comes_from_packet_originator() {
    let mut sim = Sim::new();
    let lc = controller_at_500(&mut sim);
    parked(&mut sim, 1, 300.0);
    sim.start_all();
    sim.run_until(secs(1.5));

    let tracker = sim.controller(lc).tracker();
    assert_eq!(tracker.control_address(&car_sch(1)), Some(car_cch(1)));
}

#[test]
fn test_vehicle_off_the_road_is_ignored() {
    let mut sim = Sim::new();
    let lc = controller_at_500(&mut sim);
    // In radio range, but 100 units off the centerline.
    sim.add_car(1, Vector3::new(500.0, 100.0, 0.0), Vector3::ZERO);
    sim.start_all();
    sim.run_until(secs(3.0));

    assert!(sim.controller(lc).tracker().is_empty());
}

#[test]
fn test_silent_vehicle_is_evicted_on_recompute() {
    let mut sim = Sim::new();
    let lc = controller_at_500(&mut sim);
    parked(&mut sim, 1, 300.0);
    let quiet = parked(&mut sim, 2, 600.0);
    sim.start_all();

    sim.run_until(secs(5.5));
    assert_eq!(sim.controller(lc).tracker().len(), 2);

    sim.stop(quiet);
    sim.run_until(secs(10.5));

    let tracker = sim.controller(lc).tracker();
    assert!(tracker.contains(&car_sch(1)));
    assert!(!tracker.contains(&car_sch(2)), "silent for longer than two hello intervals");
}
