use std::time::Duration;

use shapeshifter_core::{
    AgentSnapshot, CellCoord, Command, Event, PriorityStrategy, RoutingAlgorithm, Scenario,
    SimulationSettings,
};
use shapeshifter_world::{self as world, query, World};

const STEPS: usize = 60;

#[test]
fn replays_are_identical_for_every_strategy() {
    for routing in [RoutingAlgorithm::AStar, RoutingAlgorithm::BreadthFirst] {
        for priority in [
            PriorityStrategy::RemainingDistance,
            PriorityStrategy::DestinationRow,
        ] {
            let settings = SimulationSettings {
                routing,
                priority,
                ..SimulationSettings::default()
            };
            let first = replay(settings.clone());
            let second = replay(settings);
            assert_eq!(first, second, "{routing:?}/{priority:?} diverged between runs");
        }
    }
}

#[test]
fn replay_never_stacks_agents() {
    let outcome = replay(SimulationSettings::default());

    assert!(!outcome
        .events
        .iter()
        .any(|event| matches!(event, Event::OverlapDetected { .. })));
    let mut cells: Vec<CellCoord> = outcome.agents.iter().map(|agent| agent.cell).collect();
    cells.sort_unstable();
    cells.dedup();
    assert_eq!(cells.len(), outcome.agents.len());
}

#[test]
fn reset_replays_the_same_run() {
    let mut world = World::new(ring_scenario(), SimulationSettings::default())
        .expect("valid scenario");
    let first = drive(&mut world);

    let mut reset_events = Vec::new();
    world::apply(&mut world, Command::Reset, &mut reset_events);
    let second = drive(&mut world);

    assert_eq!(first, second);
}

#[derive(Debug, PartialEq, Eq)]
struct ReplayOutcome {
    agents: Vec<AgentSnapshot>,
    events: Vec<Event>,
}

fn replay(settings: SimulationSettings) -> ReplayOutcome {
    let mut world = World::new(ring_scenario(), settings).expect("valid scenario");
    let events = drive(&mut world);
    ReplayOutcome {
        agents: query::agent_view(&world).into_vec(),
        events,
    }
}

fn drive(world: &mut World) -> Vec<Event> {
    let mut events = Vec::new();
    for index in 0..STEPS {
        // Alternate frame lengths; only whole step intervals advance the run.
        let dt = if index % 2 == 0 {
            Duration::from_millis(700)
        } else {
            Duration::from_millis(1_300)
        };
        world::apply(world, Command::Tick { dt }, &mut events);
    }
    events
}

/// Twelve agents forming a ring above a short wall.
fn ring_scenario() -> Scenario {
    let destinations = [
        (3, 1),
        (4, 1),
        (5, 1),
        (6, 1),
        (2, 2),
        (7, 2),
        (2, 3),
        (7, 3),
        (3, 4),
        (4, 4),
        (5, 4),
        (6, 4),
    ]
    .into_iter()
    .map(|(column, row)| CellCoord::new(column, row))
    .collect();
    let obstacles = (3..7).map(|column| CellCoord::new(column, 6)).collect();
    Scenario::with_fixed_origins(10, 10, destinations, obstacles)
}
