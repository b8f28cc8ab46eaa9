use shapeshifter_core::{CellCoord, Command, Scenario, SimulationSettings};
use shapeshifter_system_analytics::Analytics;
use shapeshifter_world::{self as world, query, World};

fn drive(world: &mut World, analytics: &mut Analytics, steps: usize) {
    for _ in 0..steps {
        let mut events = Vec::new();
        world::apply(world, Command::Step, &mut events);
        analytics.handle(&events);
    }
}

#[test]
fn uncontested_run_counts_every_move() {
    let scenario = Scenario::with_fixed_origins(
        6,
        6,
        vec![CellCoord::new(0, 0), CellCoord::new(5, 0)],
        Vec::new(),
    );
    let mut world = World::new(scenario, SimulationSettings::default()).expect("valid scenario");
    let expected_moves = query::assignment_cost(&world);
    let mut analytics = Analytics::new();

    drive(&mut world, &mut analytics, 30);

    let report = analytics.report();
    assert!(query::is_complete(&world));
    assert_eq!(report.arrivals, 2);
    assert_eq!(report.advances, expected_moves);
    assert_eq!(report.completed, Some(query::step_index(&world)));
    assert_eq!(report.steps, query::step_index(&world));
    assert_eq!(report.waits, 0);
    assert_eq!(report.overlaps, 0);
}

#[test]
fn contested_swap_records_waits_and_stalls() {
    let scenario = Scenario {
        columns: 3,
        rows: 1,
        origins: vec![CellCoord::new(0, 0), CellCoord::new(2, 0)],
        destinations: vec![CellCoord::new(2, 0), CellCoord::new(0, 0)],
        obstacles: Vec::new(),
    };
    let mut world =
        World::preassigned(scenario, SimulationSettings::default()).expect("valid scenario");
    let mut analytics = Analytics::new();

    drive(&mut world, &mut analytics, 40);

    let report = analytics.report();
    assert!(report.waits > 0);
    assert!(report.plan_failures > 0);
    assert_eq!(report.stalls, 2);
    assert_eq!(report.completed, None);
    assert_eq!(report.steps, 40);
}
