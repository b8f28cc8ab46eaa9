//! Ordering of agent transitions within a single step.

use shapeshifter_core::PriorityStrategy;

use crate::agent::{Agent, StepContext};

/// Indices of the agents that still need to move, in processing order.
///
/// Ties on the priority key fall back to ascending agent id so that every
/// run over the same scenario processes agents identically.
pub(crate) fn processing_order(agents: &[Agent], strategy: PriorityStrategy) -> Vec<usize> {
    let mut order: Vec<usize> = agents
        .iter()
        .enumerate()
        .filter(|(_, agent)| !agent.is_arrived())
        .map(|(index, _)| index)
        .collect();
    order.sort_by_key(|&index| {
        let agent = &agents[index];
        (priority_key(agent, strategy), agent.id())
    });
    order
}

fn priority_key(agent: &Agent, strategy: PriorityStrategy) -> u32 {
    match strategy {
        PriorityStrategy::RemainingDistance => agent.cell().manhattan_distance(agent.destination()),
        PriorityStrategy::DestinationRow => agent.destination().row(),
    }
}

/// Advances every unfinished agent once.
///
/// Each transition sees the occupancy left behind by the agents processed
/// before it, so a cell vacated early in the step is available to later
/// agents in the same step.
pub(crate) fn run_step(agents: &mut [Agent], strategy: PriorityStrategy, ctx: &mut StepContext<'_>) {
    for index in processing_order(agents, strategy) {
        if let Some(agent) = agents.get_mut(index) {
            agent.step(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use shapeshifter_core::{AgentId, CellCoord, Connectivity, Event, RoutingAlgorithm};
    use shapeshifter_system_pathfinding::Pathfinder;

    use super::*;
    use crate::{grid::Grid, occupancy::OccupancyGrid};

    fn agent(id: u32, cell: (u32, u32), destination: (u32, u32)) -> Agent {
        Agent::new(
            AgentId::new(id),
            CellCoord::new(cell.0, cell.1),
            CellCoord::new(destination.0, destination.1),
        )
    }

    #[test]
    fn remaining_distance_orders_closest_first_with_id_ties() {
        let agents = vec![
            agent(0, (0, 9), (0, 0)),
            agent(1, (5, 5), (5, 4)),
            agent(2, (1, 1), (3, 1)),
            agent(3, (7, 7), (7, 9)),
        ];

        let order = processing_order(&agents, PriorityStrategy::RemainingDistance);

        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn destination_row_orders_top_rows_first() {
        let agents = vec![
            agent(0, (0, 9), (0, 4)),
            agent(1, (1, 9), (1, 0)),
            agent(2, (2, 9), (2, 4)),
        ];

        let order = processing_order(&agents, PriorityStrategy::DestinationRow);

        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn cells_vacated_earlier_in_the_step_are_available() {
        // Agent 1 heads for the cell agent 0 is about to leave.
        let mut agents = vec![agent(0, (1, 0), (2, 0)), agent(1, (0, 0), (1, 0))];
        let mut grid_occupancy = OccupancyGrid::new(3, 1);
        grid_occupancy.fill_with(agents.iter().map(|agent| (agent.id(), agent.cell())));
        let grid = Grid::new(3, 1, &[]);
        let destinations: Vec<CellCoord> = agents.iter().map(Agent::destination).collect();
        let mut pathfinder = Pathfinder::new(RoutingAlgorithm::AStar, Connectivity::FourWay);
        let mut events = Vec::new();
        let mut ctx = StepContext {
            grid: &grid,
            occupancy: &mut grid_occupancy,
            destinations: &destinations,
            pathfinder: &mut pathfinder,
            stall_threshold: 5,
            events: &mut events,
        };

        // The first step only plans.
        run_step(&mut agents, PriorityStrategy::RemainingDistance, &mut ctx);
        run_step(&mut agents, PriorityStrategy::RemainingDistance, &mut ctx);

        assert_eq!(agents[0].cell(), CellCoord::new(2, 0));
        assert_eq!(agents[1].cell(), CellCoord::new(1, 0));
        assert!(agents.iter().all(Agent::is_arrived));
        assert!(events.iter().any(|event| matches!(
            event,
            Event::AgentAdvanced { agent_id, .. } if *agent_id == AgentId::new(1)
        )));
    }
}
