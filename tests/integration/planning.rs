use crate::*;

use corridor_core::geometry::Direction;
use corridor_core::message::{AppointmentKind, Payload};
use corridor_services::PlannerParams;

// ══════════════════════════════════════════════════════════════════════════════
//  Relay chains — planned by the controller, pushed into vehicle tables
// ══════════════════════════════════════════════════════════════════════════════

const ROAD_END: Address = Address::UNSPECIFIED;

fn controller(sim: &mut Sim, strategy: ChainStrategy) -> usize {
    sim.add_controller(1, Vector3::new(500.0, 0.0, 0.0), strategy)
}

fn next_hop(sim: &Sim, car: usize, destination: Address) -> Option<Address> {
    sim.car(car).table.get(destination).map(|e| e.next_hop)
}

#[test]
fn test_greedy_chain_reaches_vehicle_tables() {
    let mut sim = Sim::new();
    let lc = controller(&mut sim, ChainStrategy::Greedy);
    let cars: Vec<usize> = [120.0, 150.0, 350.0, 560.0, 780.0]
        .iter()
        .zip(1u8..)
        .map(|(x, n)| parked(&mut sim, n, *x))
        .collect();
    sim.start_all();
    sim.run_until(secs(6.0));

    let chain = sim.controller(lc).chain(Direction::Forward);
    assert_eq!(
        chain.members,
        vec![car_sch(1), car_sch(3), car_sch(4), car_sch(5)],
        "car 2 is too close to car 1 to be worth a hop"
    );
    assert!(sim.controller(lc).chain(Direction::Reverse).is_empty());

    assert_eq!(next_hop(&sim, cars[0], ROAD_END), Some(car_sch(3)));
    assert_eq!(next_hop(&sim, cars[2], ROAD_END), Some(car_sch(4)));
    assert_eq!(next_hop(&sim, cars[3], ROAD_END), Some(car_sch(5)));
    assert_eq!(next_hop(&sim, cars[4], ROAD_END), Some(ROAD_END), "terminal hands off to the road end");
    assert!(sim.car(cars[1]).table.is_empty());

    let report = sim.sent_by(lc).find_map(|m| match &m.payload {
        Payload::LinkStatus(s) => Some(s.clone()),
        _ => None,
    });
    let report = report.expect("controller reported its chains");
    assert_eq!(report.forward_count, 4);
    assert_eq!(report.reverse_count, 0);
    assert_eq!(report.first_forward, car_sch(1));
    assert_eq!(report.addresses.len(), 5);
}

#[test]
fn test_range_graph_chain_spans_segment() {
    let mut sim = Sim::new();
    let lc = controller(&mut sim, ChainStrategy::RangeGraph);
    for n in 1..=6u8 {
        parked(&mut sim, n, 110.0 + 150.0 * f64::from(n - 1));
    }
    sim.start_all();
    sim.run_until(secs(6.0));

    let controller = sim.controller(lc);
    let chain = controller.chain(Direction::Forward);
    assert_eq!(chain.first(), Some(car_sch(1)));
    assert_eq!(chain.terminal(), Some(car_sch(6)));
    assert_eq!(chain.len(), 4, "three hops of at most two spacings each");

    let params = PlannerParams {
        strategy: ChainStrategy::RangeGraph,
        signal_range: sim.range,
        cutoff: f64::MAX,
        take_all_min_members: 4,
        range_graph_factor: 0.85,
    };
    for (a, b) in chain.links() {
        let da = controller.tracker().get(&a).unwrap().distance;
        let db = controller.tracker().get(&b).unwrap().distance;
        assert!(params.in_range(da, db), "{a} -> {b} spans {}", (da - db).abs());
    }
}

#[test]
fn test_take_all_skips_sparse_segment() {
    let mut sim = Sim::new();
    let lc = controller(&mut sim, ChainStrategy::TakeAll);
    let cars: Vec<usize> = (1..=3u8)
        .map(|n| parked(&mut sim, n, 150.0 * f64::from(n)))
        .collect();
    sim.start_all();
    sim.run_until(secs(6.0));

    assert!(sim.controller(lc).chain(Direction::Forward).is_empty());
    assert!(
        !sim.sent_by(lc).any(|m| matches!(m.payload, Payload::LinkStatus(_))),
        "nothing to report without a chain"
    );
    for car in cars {
        assert!(sim.car(car).table.is_empty());
    }
}

#[test]
fn test_take_all_uses_every_vehicle() {
    let mut sim = Sim::new();
    let lc = controller(&mut sim, ChainStrategy::TakeAll);
    for n in 1..=4u8 {
        parked(&mut sim, n, 150.0 * f64::from(n));
    }
    sim.start_all();
    sim.run_until(secs(6.0));

    assert_eq!(
        sim.controller(lc).chain(Direction::Forward).members,
        vec![car_sch(1), car_sch(2), car_sch(3), car_sch(4)]
    );
}

#[test]
fn test_appointments_name_next_forwarder() {
    let mut sim = Sim::new();
    let mut config = base_config(Role::LocalController, lc_addr(1), lc_addr(1), 1001);
    config.planner.send_appointments = true;
    sim.add(
        &config,
        LinearMobility::new(Vector3::new(500.0, 0.0, 0.0), Vector3::ZERO),
        true,
    );
    let first = parked(&mut sim, 1, 120.0);
    let middle = parked(&mut sim, 2, 350.0);
    let last = parked(&mut sim, 3, 560.0);
    let bystander = parked(&mut sim, 4, 150.0);
    sim.start_all();
    sim.run_until(secs(6.0));

    let car = sim.car(first);
    assert_eq!(car.appointment, AppointmentKind::Forwarder);
    assert_eq!(car.next_forwarder, Some(car_sch(2)));

    assert_eq!(sim.car(middle).next_forwarder, Some(car_sch(3)));
    assert_eq!(sim.car(last).next_forwarder, Some(ROAD_END));

    let car = sim.car(bystander);
    assert_eq!(car.appointment, AppointmentKind::Normal);
    assert_eq!(car.next_forwarder, None);
}
