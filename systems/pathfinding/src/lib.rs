#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-agent route planning over a grid shared with other agents.
//!
//! Routes are searched with uniform step cost over the four cardinal
//! neighbours (optionally the diagonals as well). Static obstacles are never
//! entered. Cells held by other agents are treated as temporary obstacles,
//! except the querying agent's start and goal cells: the agent stands on the
//! former and the latter may be vacated by the time the agent gets there.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, VecDeque},
};

use shapeshifter_core::{CellCoord, Connectivity, RoutingAlgorithm};

/// Cardinal offsets in expansion order: south, east, north, west.
const CARDINAL_OFFSETS: [(i32, i32); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Diagonal offsets appended after the cardinal ones for eight-way movement.
const DIAGONAL_OFFSETS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

const UNVISITED: u32 = u32::MAX;
const NO_PARENT: usize = usize::MAX;

/// Endpoints and bounds of a single route query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteRequest {
    /// Cell the agent currently occupies.
    pub start: CellCoord,
    /// Cell the agent wants to reach.
    pub goal: CellCoord,
    /// Number of columns in the grid.
    pub columns: u32,
    /// Number of rows in the grid.
    pub rows: u32,
}

/// Reusable route planner.
///
/// The planner keeps its search buffers between queries so repeated replans
/// over the same grid avoid reallocating.
#[derive(Debug)]
pub struct Pathfinder {
    algorithm: RoutingAlgorithm,
    connectivity: Connectivity,
    scratch: SearchScratch,
}

impl Pathfinder {
    /// Creates a planner for the provided strategy and neighbourhood.
    #[must_use]
    pub fn new(algorithm: RoutingAlgorithm, connectivity: Connectivity) -> Self {
        Self {
            algorithm,
            connectivity,
            scratch: SearchScratch::default(),
        }
    }

    /// Search strategy used by the planner.
    #[must_use]
    pub const fn algorithm(&self) -> RoutingAlgorithm {
        self.algorithm
    }

    /// Neighbourhood used by the planner.
    #[must_use]
    pub const fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Searches for a route from `request.start` to `request.goal`.
    ///
    /// The returned route contains both endpoints. `None` means the goal is
    /// unreachable under the supplied obstacles and occupancy; since occupancy
    /// changes every step, callers should treat it as a temporary condition.
    pub fn find_route<B, O>(
        &mut self,
        request: RouteRequest,
        is_obstacle: B,
        is_occupied: O,
    ) -> Option<Vec<CellCoord>>
    where
        B: Fn(CellCoord) -> bool,
        O: Fn(CellCoord) -> bool,
    {
        let RouteRequest {
            start,
            goal,
            columns,
            rows,
        } = request;

        if !start.within(columns, rows) || !goal.within(columns, rows) || is_obstacle(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let passable = |cell: CellCoord| {
            !is_obstacle(cell) && (cell == start || cell == goal || !is_occupied(cell))
        };

        let width = usize::try_from(columns).ok()?;
        let cell_count = width.checked_mul(usize::try_from(rows).ok()?)?;
        self.scratch.reset(cell_count);

        let found = match self.algorithm {
            RoutingAlgorithm::AStar => {
                self.scratch.a_star(request, width, self.connectivity, &passable)
            }
            RoutingAlgorithm::BreadthFirst => {
                self.scratch
                    .breadth_first(request, width, self.connectivity, &passable)
            }
        };

        if !found {
            tracing::trace!(%start, %goal, "no route under current occupancy");
            return None;
        }

        self.scratch.reconstruct(width, start, goal)
    }
}

/// Admissible distance estimate for the provided neighbourhood.
#[must_use]
pub fn heuristic(connectivity: Connectivity, from: CellCoord, to: CellCoord) -> u32 {
    match connectivity {
        Connectivity::FourWay => from.manhattan_distance(to),
        Connectivity::EightWay => from.chebyshev_distance(to),
    }
}

/// In-bounds neighbours of `cell` in expansion order.
pub fn neighbors(
    cell: CellCoord,
    columns: u32,
    rows: u32,
    connectivity: Connectivity,
) -> impl Iterator<Item = CellCoord> {
    let cardinal: &'static [(i32, i32)] = &CARDINAL_OFFSETS;
    let diagonals: &'static [(i32, i32)] = match connectivity {
        Connectivity::FourWay => &[],
        Connectivity::EightWay => &DIAGONAL_OFFSETS,
    };

    cardinal
        .iter()
        .chain(diagonals)
        .filter_map(move |&(dx, dy)| cell.offset(dx, dy, columns, rows))
}

#[derive(Debug, Default)]
struct SearchScratch {
    cost: Vec<u32>,
    parent: Vec<usize>,
    closed: Vec<bool>,
    open: BinaryHeap<Reverse<(u32, u64, usize)>>,
    frontier: VecDeque<usize>,
}

impl SearchScratch {
    fn reset(&mut self, cell_count: usize) {
        self.cost.clear();
        self.cost.resize(cell_count, UNVISITED);
        self.parent.clear();
        self.parent.resize(cell_count, NO_PARENT);
        self.closed.clear();
        self.closed.resize(cell_count, false);
        self.open.clear();
        self.frontier.clear();
    }

    /// Best-first search ordered by `f = g + h`; equal `f` pops in push order.
    fn a_star<P>(
        &mut self,
        request: RouteRequest,
        width: usize,
        connectivity: Connectivity,
        passable: &P,
    ) -> bool
    where
        P: Fn(CellCoord) -> bool,
    {
        let Some(start_index) = index(width, request.start) else {
            return false;
        };
        let mut sequence: u64 = 0;

        self.cost[start_index] = 0;
        self.open.push(Reverse((
            heuristic(connectivity, request.start, request.goal),
            sequence,
            start_index,
        )));

        while let Some(Reverse((_, _, current_index))) = self.open.pop() {
            if self.closed[current_index] {
                continue;
            }
            self.closed[current_index] = true;

            let current = cell_at(width, current_index);
            if current == request.goal {
                return true;
            }

            let next_cost = self.cost[current_index] + 1;
            for neighbor in neighbors(current, request.columns, request.rows, connectivity) {
                if !passable(neighbor) {
                    continue;
                }
                let Some(neighbor_index) = index(width, neighbor) else {
                    continue;
                };
                if self.closed[neighbor_index] || next_cost >= self.cost[neighbor_index] {
                    continue;
                }

                self.cost[neighbor_index] = next_cost;
                self.parent[neighbor_index] = current_index;
                sequence += 1;
                self.open.push(Reverse((
                    next_cost + heuristic(connectivity, neighbor, request.goal),
                    sequence,
                    neighbor_index,
                )));
            }
        }

        false
    }

    fn breadth_first<P>(
        &mut self,
        request: RouteRequest,
        width: usize,
        connectivity: Connectivity,
        passable: &P,
    ) -> bool
    where
        P: Fn(CellCoord) -> bool,
    {
        let Some(start_index) = index(width, request.start) else {
            return false;
        };

        self.cost[start_index] = 0;
        self.frontier.push_back(start_index);

        while let Some(current_index) = self.frontier.pop_front() {
            let current = cell_at(width, current_index);
            if current == request.goal {
                return true;
            }

            let next_cost = self.cost[current_index] + 1;
            for neighbor in neighbors(current, request.columns, request.rows, connectivity) {
                if !passable(neighbor) {
                    continue;
                }
                let Some(neighbor_index) = index(width, neighbor) else {
                    continue;
                };
                if self.cost[neighbor_index] != UNVISITED {
                    continue;
                }

                self.cost[neighbor_index] = next_cost;
                self.parent[neighbor_index] = current_index;
                self.frontier.push_back(neighbor_index);
            }
        }

        false
    }

    fn reconstruct(
        &self,
        width: usize,
        start: CellCoord,
        goal: CellCoord,
    ) -> Option<Vec<CellCoord>> {
        let start_index = index(width, start)?;
        let mut cursor = index(width, goal)?;
        let capacity = self.cost.get(cursor).map_or(0, |cost| *cost as usize + 1);
        let mut route = Vec::with_capacity(capacity);

        route.push(goal);
        while cursor != start_index {
            cursor = *self.parent.get(cursor)?;
            if cursor == NO_PARENT {
                return None;
            }
            route.push(cell_at(width, cursor));
        }

        route.reverse();
        Some(route)
    }
}

fn index(width: usize, cell: CellCoord) -> Option<usize> {
    let column = usize::try_from(cell.column()).ok()?;
    let row = usize::try_from(cell.row()).ok()?;
    row.checked_mul(width)?.checked_add(column)
}

fn cell_at(width: usize, index: usize) -> CellCoord {
    let column = index % width;
    let row = index / width;
    CellCoord::new(column as u32, row as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_follow_expansion_order() {
        let center = CellCoord::new(1, 1);
        let cardinal: Vec<_> = neighbors(center, 3, 3, Connectivity::FourWay).collect();
        assert_eq!(
            cardinal,
            vec![
                CellCoord::new(1, 2),
                CellCoord::new(2, 1),
                CellCoord::new(1, 0),
                CellCoord::new(0, 1),
            ]
        );

        let all: Vec<_> = neighbors(center, 3, 3, Connectivity::EightWay).collect();
        assert_eq!(all.len(), 8);
        assert_eq!(all[4], CellCoord::new(2, 2));
    }

    #[test]
    fn corner_neighbors_are_bounds_checked() {
        let corner: Vec<_> =
            neighbors(CellCoord::new(0, 0), 2, 2, Connectivity::EightWay).collect();
        assert_eq!(
            corner,
            vec![
                CellCoord::new(0, 1),
                CellCoord::new(1, 0),
                CellCoord::new(1, 1),
            ]
        );
    }

    #[test]
    fn index_round_trips_through_cell_at() {
        let cell = CellCoord::new(3, 2);
        let offset = index(5, cell).expect("in range");
        assert_eq!(offset, 13);
        assert_eq!(cell_at(5, offset), cell);
    }
}
