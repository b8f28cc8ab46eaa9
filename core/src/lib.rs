#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Shapeshifter simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters build a [`Scenario`],
//! hand it to the world together with [`SimulationSettings`], and then submit
//! [`Command`] values describing how the run should progress. The world
//! executes those commands via its `apply` entry point and broadcasts
//! [`Event`] values that systems and adapters consume deterministically.

use std::{collections::HashSet, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Shapeshifter.";

/// Number of rows at the bottom of the grid that host the fixed origins.
pub const ORIGIN_ROWS: u32 = 2;

/// Default simulated time between two scheduler steps.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of consecutive wait escalations before an agent is flagged as stalled.
pub const DEFAULT_STALL_THRESHOLD: u32 = 5;

/// Describes whether the world processes ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunMode {
    /// Ticks advance the scheduler.
    Running,
    /// Ticks are ignored and no agent state changes.
    Paused,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    ///
    /// One scheduler step runs for every whole step interval accumulated.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Runs exactly one scheduler step regardless of accumulated time.
    Step,
    /// Requests that the world transition to the provided run mode.
    SetRunMode {
        /// Mode the world should activate.
        mode: RunMode,
    },
    /// Updates the simulated time that must accumulate between scheduler steps.
    ConfigureStepInterval {
        /// Minimum simulated time required between successive steps.
        step_interval: Duration,
    },
    /// Returns every agent to its origin and plans the run from scratch.
    Reset,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Announces that the world entered a new run mode.
    RunModeChanged {
        /// Mode that became active after processing commands.
        mode: RunMode,
    },
    /// Reports that an agent computed a fresh plan.
    AgentPlanned {
        /// Identifier of the agent that planned.
        agent_id: AgentId,
        /// Number of moves contained in the plan.
        moves: u32,
    },
    /// Reports that no route to the destination exists under current occupancy.
    AgentPlanFailed {
        /// Identifier of the agent whose planning failed.
        agent_id: AgentId,
    },
    /// Confirms that an agent moved between two cells.
    AgentAdvanced {
        /// Identifier of the agent that advanced.
        agent_id: AgentId,
        /// Cell the agent occupied before moving.
        from: CellCoord,
        /// Cell the agent occupies after completing the move.
        to: CellCoord,
    },
    /// Reports that an agent backed off because its next cell was taken.
    AgentWaiting {
        /// Identifier of the agent that started waiting.
        agent_id: AgentId,
        /// Agent holding the planned cell; `None` when no route could be found.
        blocked_by: Option<AgentId>,
        /// Number of steps the agent waits before replanning.
        max_wait: u32,
    },
    /// Reports that an agent dropped its plan because a settled agent blocks it.
    AgentRerouted {
        /// Identifier of the agent that dropped its plan.
        agent_id: AgentId,
        /// Settled agent occupying the planned cell.
        settled: AgentId,
    },
    /// Confirms that an agent reached its destination.
    AgentArrived {
        /// Identifier of the agent that arrived.
        agent_id: AgentId,
        /// Destination cell now held by the agent.
        cell: CellCoord,
    },
    /// Reports that an agent keeps escalating without making progress.
    AgentStalled {
        /// Identifier of the stalled agent.
        agent_id: AgentId,
        /// Consecutive escalations observed since the last advance.
        escalations: u32,
    },
    /// Reports that more than one agent occupies the same cell.
    OverlapDetected {
        /// Cell hosting multiple agents.
        cell: CellCoord,
        /// Agents located in the cell, ordered by identifier.
        agents: Vec<AgentId>,
    },
    /// Confirms that a scheduler step finished.
    StepCompleted {
        /// One-based index of the completed step.
        step: u64,
        /// Progress after the step.
        progress: Progress,
    },
    /// Announces that every agent reached its destination.
    SimulationCompleted {
        /// Number of steps the run required.
        steps: u64,
    },
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Columns grow to the east (`x`), rows grow to the south (`y`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }

    /// Computes the Chebyshev distance between two cell coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.column()
            .abs_diff(other.column())
            .max(self.row().abs_diff(other.row()))
    }

    /// Returns the cell displaced by the offset when it stays inside the bounds.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32, columns: u32, rows: u32) -> Option<CellCoord> {
        let column = self.column.checked_add_signed(dx)?;
        let row = self.row.checked_add_signed(dy)?;
        if column < columns && row < rows {
            Some(CellCoord::new(column, row))
        } else {
            None
        }
    }

    /// Reports whether the cell lies inside a grid of the provided dimensions.
    #[must_use]
    pub const fn within(&self, columns: u32, rows: u32) -> bool {
        self.column < columns && self.row < rows
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Neighbourhood used when expanding routes across the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connectivity {
    /// Moves along the four cardinal directions only.
    #[default]
    FourWay,
    /// Cardinal moves plus the four diagonals.
    EightWay,
}

/// Search strategy used when an agent plans its route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingAlgorithm {
    /// Best-first search guided by a distance heuristic.
    #[default]
    AStar,
    /// Uninformed breadth-first search.
    BreadthFirst,
}

impl FromStr for RoutingAlgorithm {
    type Err = SettingParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "astar" | "a-star" | "a*" => Ok(Self::AStar),
            "bfs" | "breadth-first" => Ok(Self::BreadthFirst),
            other => Err(SettingParseError::UnknownRouting(other.to_owned())),
        }
    }
}

/// Ordering applied to agents at the start of every scheduler step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityStrategy {
    /// Agents closest to their destination move first.
    #[default]
    RemainingDistance,
    /// Agents whose destination lies in the uppermost row move first.
    DestinationRow,
}

impl FromStr for PriorityStrategy {
    type Err = SettingParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manhattan" | "remaining-distance" => Ok(Self::RemainingDistance),
            "y-axis" | "destination-row" => Ok(Self::DestinationRow),
            other => Err(SettingParseError::UnknownPriority(other.to_owned())),
        }
    }
}

/// Errors raised while parsing textual simulation settings.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SettingParseError {
    /// The routing algorithm name was not recognised.
    #[error("unknown routing algorithm '{0}' (expected astar or bfs)")]
    UnknownRouting(String),
    /// The priority strategy name was not recognised.
    #[error("unknown priority strategy '{0}' (expected manhattan or y-axis)")]
    UnknownPriority(String),
}

/// Tunables that shape how a simulation run behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationSettings {
    /// Simulated time that must accumulate before a scheduler step runs.
    pub step_interval: Duration,
    /// Search strategy used for planning.
    pub routing: RoutingAlgorithm,
    /// Ordering applied to agents every step.
    pub priority: PriorityStrategy,
    /// Allows diagonal moves when planning.
    pub diagonal_moves: bool,
    /// Consecutive wait escalations after which an agent is reported as stalled.
    pub stall_threshold: u32,
}

impl SimulationSettings {
    /// Neighbourhood derived from the diagonal toggle.
    #[must_use]
    pub const fn connectivity(&self) -> Connectivity {
        if self.diagonal_moves {
            Connectivity::EightWay
        } else {
            Connectivity::FourWay
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            step_interval: DEFAULT_STEP_INTERVAL,
            routing: RoutingAlgorithm::default(),
            priority: PriorityStrategy::default(),
            diagonal_moves: false,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }
}

/// Initial layout supplied by an adapter before a run starts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Number of columns in the grid.
    pub columns: u32,
    /// Number of rows in the grid.
    pub rows: u32,
    /// Cells agents start from.
    pub origins: Vec<CellCoord>,
    /// Cells agents must reach.
    pub destinations: Vec<CellCoord>,
    /// Permanently blocked cells.
    pub obstacles: Vec<CellCoord>,
}

impl Scenario {
    /// Builds a scenario whose origins fill the bottom rows of the grid.
    ///
    /// One origin is generated per destination; see [`fixed_origins`].
    #[must_use]
    pub fn with_fixed_origins(
        columns: u32,
        rows: u32,
        destinations: Vec<CellCoord>,
        obstacles: Vec<CellCoord>,
    ) -> Self {
        Self {
            columns,
            rows,
            origins: fixed_origins(columns, rows, destinations.len()),
            destinations,
            obstacles,
        }
    }

    /// Checks the scenario for inputs that prevent a run from starting.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(ScenarioError::EmptyGrid {
                columns: self.columns,
                rows: self.rows,
            });
        }

        let cells = self
            .origins
            .iter()
            .chain(&self.destinations)
            .chain(&self.obstacles);
        for cell in cells {
            if !cell.within(self.columns, self.rows) {
                return Err(ScenarioError::OutOfBounds {
                    cell: *cell,
                    columns: self.columns,
                    rows: self.rows,
                });
            }
        }

        if self.origins.len() != self.destinations.len() {
            return Err(ScenarioError::CountMismatch {
                origins: self.origins.len(),
                destinations: self.destinations.len(),
            });
        }

        let obstacles: HashSet<CellCoord> = self.obstacles.iter().copied().collect();
        for cells in [&self.origins, &self.destinations] {
            let mut seen = HashSet::with_capacity(cells.len());
            for cell in cells {
                if obstacles.contains(cell) {
                    return Err(ScenarioError::BlockedCell { cell: *cell });
                }
                if !seen.insert(*cell) {
                    return Err(ScenarioError::DuplicateCell { cell: *cell });
                }
            }
        }

        Ok(())
    }
}

/// Generates the fixed origins occupying the bottom [`ORIGIN_ROWS`] rows.
///
/// Cells are produced left to right starting with the upper origin row and are
/// truncated to `count`. Fewer cells are returned when the rows cannot host
/// `count` agents.
#[must_use]
pub fn fixed_origins(columns: u32, rows: u32, count: usize) -> Vec<CellCoord> {
    let first_row = rows.saturating_sub(ORIGIN_ROWS);
    (first_row..rows)
        .flat_map(|row| (0..columns).map(move |column| CellCoord::new(column, row)))
        .take(count)
        .collect()
}

/// Reasons a scenario is rejected before the run starts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ScenarioError {
    /// The grid has no cells.
    #[error("grid must have at least one cell, got {columns}x{rows}")]
    EmptyGrid {
        /// Configured column count.
        columns: u32,
        /// Configured row count.
        rows: u32,
    },
    /// A cell lies outside the grid bounds.
    #[error("cell {cell} lies outside the {columns}x{rows} grid")]
    OutOfBounds {
        /// Offending cell.
        cell: CellCoord,
        /// Configured column count.
        columns: u32,
        /// Configured row count.
        rows: u32,
    },
    /// Origins and destinations cannot be matched one to one.
    #[error("{origins} origins cannot be matched with {destinations} destinations")]
    CountMismatch {
        /// Number of origins supplied.
        origins: usize,
        /// Number of destinations supplied.
        destinations: usize,
    },
    /// An origin or destination sits on an obstacle.
    #[error("cell {cell} is blocked by an obstacle")]
    BlockedCell {
        /// Offending cell.
        cell: CellCoord,
    },
    /// The same origin or destination was listed twice.
    #[error("cell {cell} is listed more than once")]
    DuplicateCell {
        /// Offending cell.
        cell: CellCoord,
    },
}

/// Externally visible phase of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    /// Resting at the origin without a plan.
    Idle,
    /// Computing a fresh route.
    Planning,
    /// Following a plan.
    Moving,
    /// Backing off before the next replan.
    Waiting,
    /// Resting at the destination.
    Arrived,
}

/// Immutable representation of a single agent's state used for queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSnapshot {
    /// Unique identifier assigned to the agent.
    pub id: AgentId,
    /// Cell the agent started from.
    pub origin: CellCoord,
    /// Grid cell currently occupied by the agent.
    pub cell: CellCoord,
    /// Cell the agent must reach.
    pub destination: CellCoord,
    /// Phase of the agent's state machine.
    pub status: AgentStatus,
    /// Steps spent waiting since the last back-off started.
    pub wait_count: u32,
    /// Steps the agent waits before replanning; zero unless waiting.
    pub max_wait: u32,
    /// Cells left in the current plan.
    pub remaining_plan: usize,
    /// Consecutive wait escalations since the last advance.
    pub escalations: u32,
    /// Indicates that the agent crossed the stall threshold.
    pub stalled: bool,
    /// Indicates that another agent shares the agent's cell.
    pub overlapping: bool,
}

impl AgentSnapshot {
    /// Reports whether the agent rests at its destination.
    #[must_use]
    pub fn is_at_destination(&self) -> bool {
        self.status == AgentStatus::Arrived
    }

    /// Reports whether the agent is backing off.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.status == AgentStatus::Waiting
    }

    /// Manhattan distance left to the destination.
    #[must_use]
    pub fn remaining_distance(&self) -> u32 {
        self.cell.manhattan_distance(self.destination)
    }
}

/// Read-only snapshot describing all agents in the simulation.
#[derive(Clone, Debug, Default)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured agent snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Snapshot for the provided agent, if present.
    #[must_use]
    pub fn get(&self, agent_id: AgentId) -> Option<&AgentSnapshot> {
        self.snapshots
            .binary_search_by_key(&agent_id, |snapshot| snapshot.id)
            .ok()
            .and_then(|index| self.snapshots.get(index))
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Aggregate completion derived from the snapshots.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::new(
            self.snapshots
                .iter()
                .filter(|snapshot| snapshot.is_at_destination())
                .count(),
            self.snapshots.len(),
        )
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

/// Number of agents that reached their destination out of the total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Progress {
    completed: usize,
    total: usize,
}

impl Progress {
    /// Creates a new progress summary.
    #[must_use]
    pub const fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Agents resting at their destination.
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// Agents taking part in the run.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Reports whether every agent arrived.
    #[must_use]
    pub const fn all_completed(&self) -> bool {
        self.completed == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        fixed_origins, AgentId, CellCoord, PriorityStrategy, RoutingAlgorithm, Scenario,
        ScenarioError,
    };

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
        assert_eq!(origin.chebyshev_distance(destination), 3);
    }

    #[test]
    fn offset_respects_bounds() {
        let cell = CellCoord::new(0, 2);
        assert_eq!(cell.offset(-1, 0, 3, 3), None);
        assert_eq!(cell.offset(0, 1, 3, 3), None);
        assert_eq!(cell.offset(1, -1, 3, 3), Some(CellCoord::new(1, 1)));
    }

    #[test]
    fn scenario_round_trips_through_bincode() {
        let scenario = Scenario::with_fixed_origins(
            4,
            4,
            vec![CellCoord::new(0, 0), CellCoord::new(3, 1)],
            vec![CellCoord::new(2, 0)],
        );
        let bytes = bincode::serialize(&scenario).expect("serialize");
        let restored: Scenario = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, scenario);
    }

    #[test]
    fn fixed_origins_fill_bottom_rows_left_to_right() {
        let origins = fixed_origins(3, 5, 4);
        assert_eq!(
            origins,
            vec![
                CellCoord::new(0, 3),
                CellCoord::new(1, 3),
                CellCoord::new(2, 3),
                CellCoord::new(0, 4),
            ]
        );
        assert_eq!(fixed_origins(3, 5, 10).len(), 6);
    }

    #[test]
    fn validate_rejects_mismatched_counts() {
        let scenario = Scenario {
            columns: 4,
            rows: 4,
            origins: vec![CellCoord::new(0, 3)],
            destinations: vec![CellCoord::new(0, 0), CellCoord::new(1, 0)],
            obstacles: Vec::new(),
        };
        assert_eq!(
            scenario.validate(),
            Err(ScenarioError::CountMismatch {
                origins: 1,
                destinations: 2
            })
        );
    }

    #[test]
    fn validate_rejects_out_of_bounds_and_blocked_cells() {
        let mut scenario = Scenario::with_fixed_origins(
            4,
            4,
            vec![CellCoord::new(4, 0)],
            Vec::new(),
        );
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::OutOfBounds { .. })
        ));

        scenario.destinations = vec![CellCoord::new(1, 1)];
        scenario.obstacles = vec![CellCoord::new(1, 1)];
        assert_eq!(
            scenario.validate(),
            Err(ScenarioError::BlockedCell {
                cell: CellCoord::new(1, 1)
            })
        );
    }

    #[test]
    fn validate_rejects_duplicate_destinations() {
        let scenario = Scenario::with_fixed_origins(
            4,
            4,
            vec![CellCoord::new(1, 1), CellCoord::new(1, 1)],
            Vec::new(),
        );
        assert_eq!(
            scenario.validate(),
            Err(ScenarioError::DuplicateCell {
                cell: CellCoord::new(1, 1)
            })
        );
    }

    #[test]
    fn empty_scenario_is_valid() {
        let scenario = Scenario::with_fixed_origins(2, 2, Vec::new(), Vec::new());
        assert_eq!(scenario.validate(), Ok(()));
    }

    #[test]
    fn settings_parse_selector_names() {
        assert_eq!("astar".parse(), Ok(RoutingAlgorithm::AStar));
        assert_eq!("BFS".parse(), Ok(RoutingAlgorithm::BreadthFirst));
        assert_eq!("y-axis".parse(), Ok(PriorityStrategy::DestinationRow));
        assert_eq!("manhattan".parse(), Ok(PriorityStrategy::RemainingDistance));
        assert!("dijkstra".parse::<RoutingAlgorithm>().is_err());
        assert_eq!(AgentId::new(3).to_string(), "#3");
    }
}
