use crate::*;

use corridor_core::message::Payload;

// ══════════════════════════════════════════════════════════════════════════════
//  Harness sanity — timers, radio range, shutdown
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_car_beacons_once_per_interval() {
    let mut sim = Sim::new();
    let car = parked(&mut sim, 1, 200.0);
    sim.start_all();
    sim.run_until(secs(3.5));

    let hellos = sim
        .sent_by(car)
        .filter(|m| matches!(m.payload, Payload::Hello(_)))
        .count();
    assert_eq!(hellos, 4, "hellos at t = 0, 1, 2, 3");

    for s in sim.sent.iter().filter(|s| s.from == car) {
        assert_eq!(s.message.originator, car_cch(1));
    }
}

#[test]
fn test_radio_range_limits_who_is_heard() {
    let mut sim = Sim::new();
    let lc = sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), ChainStrategy::Greedy);
    parked(&mut sim, 1, 200.0);
    // Inside the segment, but 450 units from the controller.
    parked(&mut sim, 2, 950.0);
    sim.start_all();
    sim.run_until(secs(3.0));

    let tracker = sim.controller(lc).tracker();
    assert!(tracker.contains(&car_sch(1)));
    assert!(!tracker.contains(&car_sch(2)), "out of radio range");
}

#[test]
fn test_stopped_node_goes_quiet() {
    let mut sim = Sim::new();
    let car = parked(&mut sim, 1, 200.0);
    sim.start_all();
    sim.run_until(secs(1.5));
    sim.stop(car);

    assert!(!sim.node(car).is_running());
    assert!(sim.pending_timers(car).is_empty(), "shutdown cancels every timer");

    let before = sim.sent_by(car).count();
    sim.run_until(secs(5.0));
    assert_eq!(sim.sent_by(car).count(), before);
}

#[test]
fn test_route_output_rejects_non_cars() {
    let mut sim = Sim::new();
    let lc = sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), ChainStrategy::Greedy);
    sim.start_all();
    assert!(sim.route_output(lc, car_sch(9)).is_err());
}
