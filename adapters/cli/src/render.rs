//! Plain-text frames of the grid for terminal output.

use std::fmt::Write as _;

use shapeshifter_core::{AgentSnapshot, AgentStatus, AgentView, CellCoord};
use shapeshifter_world::Grid;

const EMPTY: char = '.';
const OBSTACLE: char = '#';
const OPEN_DESTINATION: char = '+';

/// Glyph drawn for an agent.
fn agent_glyph(agent: &AgentSnapshot) -> char {
    if agent.overlapping {
        return '*';
    }
    if agent.stalled {
        return '!';
    }
    match agent.status {
        AgentStatus::Arrived => '@',
        AgentStatus::Waiting => 'w',
        AgentStatus::Idle | AgentStatus::Planning | AgentStatus::Moving => 'o',
    }
}

/// Draws the grid row by row followed by a one-line summary.
pub(crate) fn frame(grid: &Grid, agents: &AgentView, step: u64) -> String {
    let columns = grid.columns() as usize;
    let rows = grid.rows() as usize;
    let mut canvas = vec![EMPTY; columns * rows];
    let slot = |cell: CellCoord| cell.row() as usize * columns + cell.column() as usize;

    for cell in grid.obstacles() {
        canvas[slot(cell)] = OBSTACLE;
    }
    for agent in agents.iter() {
        if grid.contains(agent.destination) {
            canvas[slot(agent.destination)] = OPEN_DESTINATION;
        }
    }
    for agent in agents.iter() {
        if grid.contains(agent.cell) {
            canvas[slot(agent.cell)] = agent_glyph(agent);
        }
    }

    let mut output = String::with_capacity((columns + 1) * rows + 48);
    for row in canvas.chunks(columns.max(1)) {
        output.extend(row.iter());
        output.push('\n');
    }
    let waiting = agents.iter().filter(|agent| agent.is_waiting()).count();
    let _ = write!(
        output,
        "step {step}: {} arrived, {waiting} waiting",
        agents.progress()
    );
    output
}

#[cfg(test)]
mod tests {
    use shapeshifter_core::{Scenario, SimulationSettings};
    use shapeshifter_world::{query, World};

    use super::*;

    #[test]
    fn frame_marks_obstacles_agents_and_destinations() {
        let world = World::new(
            Scenario {
                columns: 3,
                rows: 2,
                origins: vec![CellCoord::new(0, 1)],
                destinations: vec![CellCoord::new(2, 0)],
                obstacles: vec![CellCoord::new(1, 0)],
            },
            SimulationSettings::default(),
        )
        .expect("valid scenario");

        let rendered = frame(query::grid(&world), &query::agent_view(&world), 0);

        assert_eq!(rendered, ".#+\no..\nstep 0: 0/1 arrived, 0 waiting");
    }
}
