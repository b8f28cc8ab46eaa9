#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for Shapeshifter.
//!
//! The world owns the grid, every agent and the live occupancy map. Adapters
//! drive it exclusively through [`apply`] and observe it through [`query`] and
//! the emitted events.

mod agent;
mod grid;
mod occupancy;
mod scheduler;

use std::time::Duration;

use shapeshifter_core::{
    AgentId, CellCoord, Command, Event, RunMode, Scenario, ScenarioError, SimulationSettings,
};
use shapeshifter_system_assignment::{assign, AssignmentError, Pairing};
use shapeshifter_system_pathfinding::Pathfinder;
use tracing::{debug, info};

use crate::{
    agent::{Agent, StepContext},
    occupancy::OccupancyGrid,
};

pub use grid::Grid;
pub use occupancy::detect_overlaps;

/// Represents the authoritative Shapeshifter world state.
#[derive(Debug)]
pub struct World {
    grid: Grid,
    agents: Vec<Agent>,
    destinations: Vec<CellCoord>,
    occupancy: OccupancyGrid,
    pathfinder: Pathfinder,
    settings: SimulationSettings,
    assignment_cost: u64,
    run_mode: RunMode,
    accumulator: Duration,
    step_index: u64,
    completed_at: Option<u64>,
}

impl World {
    /// Builds a world whose agents are matched to destinations at minimum
    /// total Manhattan cost.
    ///
    /// Every agent plans its first route before this returns.
    pub fn new(scenario: Scenario, settings: SimulationSettings) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let assignment =
            assign(&scenario.origins, &scenario.destinations).map_err(scenario_error)?;
        info!(
            agents = assignment.len(),
            cost = assignment.total_cost(),
            "agents assigned"
        );
        Ok(Self::build(
            scenario,
            settings,
            assignment.pairings(),
            assignment.total_cost(),
        ))
    }

    /// Builds a world that pairs `origins[i]` with `destinations[i]` verbatim.
    ///
    /// Useful when an external planner already decided the matching or when a
    /// particular conflict between agents has to be reproduced.
    pub fn preassigned(
        scenario: Scenario,
        settings: SimulationSettings,
    ) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let pairings: Vec<Pairing> = scenario
            .origins
            .iter()
            .zip(&scenario.destinations)
            .enumerate()
            .map(|(index, (origin, destination))| Pairing {
                origin: index,
                destination: index,
                cost: origin.manhattan_distance(*destination),
            })
            .collect();
        let cost = pairings.iter().map(|pairing| u64::from(pairing.cost)).sum();
        Ok(Self::build(scenario, settings, &pairings, cost))
    }

    fn build(
        scenario: Scenario,
        settings: SimulationSettings,
        pairings: &[Pairing],
        assignment_cost: u64,
    ) -> Self {
        let agents: Vec<Agent> = pairings
            .iter()
            .enumerate()
            .map(|(index, pairing)| {
                Agent::new(
                    AgentId::new(index as u32),
                    scenario.origins[pairing.origin],
                    scenario.destinations[pairing.destination],
                )
            })
            .collect();
        let destinations = agents.iter().map(Agent::destination).collect();

        let mut world = Self {
            grid: Grid::new(scenario.columns, scenario.rows, &scenario.obstacles),
            occupancy: OccupancyGrid::new(scenario.columns, scenario.rows),
            pathfinder: Pathfinder::new(settings.routing, settings.connectivity()),
            agents,
            destinations,
            settings,
            assignment_cost,
            run_mode: RunMode::Running,
            accumulator: Duration::ZERO,
            step_index: 0,
            completed_at: None,
        };

        let mut setup_events = Vec::new();
        world.restart(&mut setup_events);
        world
    }

    /// Places every agent on its origin and plans in id order.
    fn restart(&mut self, out_events: &mut Vec<Event>) {
        for agent in &mut self.agents {
            agent.reset();
        }
        self.occupancy
            .fill_with(self.agents.iter().map(|agent| (agent.id(), agent.cell())));
        self.accumulator = Duration::ZERO;
        self.step_index = 0;
        self.completed_at = None;

        let mut ctx = StepContext {
            grid: &self.grid,
            occupancy: &mut self.occupancy,
            destinations: &self.destinations,
            pathfinder: &mut self.pathfinder,
            stall_threshold: self.settings.stall_threshold.max(1),
            events: out_events,
        };
        for agent in &mut self.agents {
            agent.replan(&mut ctx);
        }

        self.refresh_overlaps(out_events);
        if self.agents.iter().all(Agent::is_arrived) {
            self.completed_at = Some(0);
        }
    }

    /// Runs one scheduler step unless the run already finished.
    fn step(&mut self, out_events: &mut Vec<Event>) {
        if self.completed_at.is_some() {
            return;
        }
        self.step_index = self.step_index.saturating_add(1);

        let mut ctx = StepContext {
            grid: &self.grid,
            occupancy: &mut self.occupancy,
            destinations: &self.destinations,
            pathfinder: &mut self.pathfinder,
            stall_threshold: self.settings.stall_threshold.max(1),
            events: out_events,
        };
        scheduler::run_step(&mut self.agents, self.settings.priority, &mut ctx);

        self.refresh_overlaps(out_events);

        let progress = query::progress(self);
        debug!(step = self.step_index, %progress, "step completed");
        out_events.push(Event::StepCompleted {
            step: self.step_index,
            progress,
        });

        if progress.all_completed() {
            self.completed_at = Some(self.step_index);
            info!(steps = self.step_index, "all agents arrived");
            out_events.push(Event::SimulationCompleted {
                steps: self.step_index,
            });
        }
    }

    fn refresh_overlaps(&mut self, out_events: &mut Vec<Event>) {
        let overlaps =
            detect_overlaps(self.agents.iter().map(|agent| (agent.id(), agent.cell())));
        for agent in &mut self.agents {
            let overlapping = overlaps
                .get(&agent.cell())
                .is_some_and(|agents| agents.contains(&agent.id()));
            agent.set_overlapping(overlapping);
        }
        for (cell, agents) in overlaps {
            tracing::warn!(%cell, count = agents.len(), "agents share a cell");
            out_events.push(Event::OverlapDetected { cell, agents });
        }
    }

    fn agent(&self, agent_id: AgentId) -> Option<&Agent> {
        usize::try_from(agent_id.get())
            .ok()
            .and_then(|index| self.agents.get(index))
    }
}

fn scenario_error(error: AssignmentError) -> ScenarioError {
    match error {
        AssignmentError::LengthMismatch {
            origins,
            destinations,
        } => ScenarioError::CountMismatch {
            origins,
            destinations,
        },
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            if world.run_mode == RunMode::Paused {
                return;
            }
            let interval = world.settings.step_interval;
            if interval.is_zero() {
                world.step(out_events);
                return;
            }
            world.accumulator = world.accumulator.saturating_add(dt);
            while world.accumulator >= interval {
                world.accumulator -= interval;
                world.step(out_events);
            }
        }
        Command::Step => {
            if world.run_mode == RunMode::Running {
                world.step(out_events);
            }
        }
        Command::SetRunMode { mode } => {
            if world.run_mode != mode {
                world.run_mode = mode;
                info!(?mode, "run mode changed");
                out_events.push(Event::RunModeChanged { mode });
            }
        }
        Command::ConfigureStepInterval { step_interval } => {
            world.settings.step_interval = step_interval;
            world.accumulator = Duration::ZERO;
        }
        Command::Reset => {
            info!("resetting agents to their origins");
            world.restart(out_events);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::collections::BTreeSet;

    use shapeshifter_core::{
        AgentId, AgentSnapshot, AgentView, CellCoord, Progress, RunMode, SimulationSettings,
    };

    use super::{detect_overlaps, Grid, OccupancyGrid, World};

    /// Provides read-only access to the grid.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Captures a snapshot of every agent, ordered by identifier.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(world.agents.iter().map(|agent| agent.snapshot()).collect())
    }

    /// Snapshot of a single agent.
    #[must_use]
    pub fn agent(world: &World, agent_id: AgentId) -> Option<AgentSnapshot> {
        world.agent(agent_id).map(|agent| agent.snapshot())
    }

    /// Cells the agent still intends to visit; empty unless it is moving.
    #[must_use]
    pub fn plan(world: &World, agent_id: AgentId) -> Vec<CellCoord> {
        world.agent(agent_id).map(|agent| agent.plan()).unwrap_or_default()
    }

    /// Number of agents at their destination out of the total.
    #[must_use]
    pub fn progress(world: &World) -> Progress {
        let completed = world.agents.iter().filter(|agent| agent.is_arrived()).count();
        Progress::new(completed, world.agents.len())
    }

    /// Reports whether every agent arrived.
    #[must_use]
    pub fn is_complete(world: &World) -> bool {
        world.completed_at.is_some()
    }

    /// Total Manhattan cost of the origin/destination matching.
    #[must_use]
    pub fn assignment_cost(world: &World) -> u64 {
        world.assignment_cost
    }

    /// Number of scheduler steps executed since the last reset.
    #[must_use]
    pub fn step_index(world: &World) -> u64 {
        world.step_index
    }

    /// Current run mode.
    #[must_use]
    pub fn run_mode(world: &World) -> RunMode {
        world.run_mode
    }

    /// Settings the world is running with.
    #[must_use]
    pub fn settings(world: &World) -> &SimulationSettings {
        &world.settings
    }

    /// Agents currently sharing a cell with another agent.
    ///
    /// Recomputed from agent positions on every call; the world is not
    /// modified.
    #[must_use]
    pub fn overlapping_agents(world: &World) -> BTreeSet<AgentId> {
        detect_overlaps(world.agents.iter().map(|agent| (agent.id(), agent.cell())))
            .into_values()
            .flatten()
            .collect()
    }

    /// Captures a read-only view of the occupancy map.
    #[must_use]
    pub fn occupancy_view(world: &World) -> OccupancyView<'_> {
        OccupancyView {
            grid: &world.occupancy,
        }
    }

    /// Read-only view into the dense occupancy map.
    #[derive(Clone, Copy, Debug)]
    pub struct OccupancyView<'a> {
        grid: &'a OccupancyGrid,
    }

    impl<'a> OccupancyView<'a> {
        /// Returns the agent occupying the provided cell, if any.
        #[must_use]
        pub fn occupant(&self, cell: CellCoord) -> Option<AgentId> {
            self.grid.occupant(cell)
        }

        /// Reports whether the cell lies inside the grid and is unoccupied.
        #[must_use]
        pub fn is_free(&self, cell: CellCoord) -> bool {
            self.grid.can_enter(cell)
        }

        /// Returns an iterator over all cells in row-major order.
        pub fn iter(&self) -> impl Iterator<Item = Option<AgentId>> + 'a {
            self.grid.cells().iter().copied()
        }

        /// Provides the dimensions of the underlying occupancy map.
        #[must_use]
        pub fn dimensions(&self) -> (u32, u32) {
            self.grid.dimensions()
        }
    }
}
