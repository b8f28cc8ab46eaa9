#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Minimum-cost matching between agent origins and destinations.
//!
//! The solver runs the Hungarian algorithm (dual potentials with shortest
//! augmenting paths) over a dense cost matrix. Costs default to the Manhattan
//! distance between the two cells, which keeps routes short and limits the
//! crossings that greedy nearest-neighbour matching tends to produce.

use shapeshifter_core::CellCoord;
use thiserror::Error;

/// Reasons a perfect matching cannot be computed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AssignmentError {
    /// Origins and destinations differ in length.
    #[error("cannot match {origins} origins with {destinations} destinations")]
    LengthMismatch {
        /// Number of origins supplied.
        origins: usize,
        /// Number of destinations supplied.
        destinations: usize,
    },
}

/// Single origin-to-destination pairing chosen by the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pairing {
    /// Index into the origin list.
    pub origin: usize,
    /// Index into the destination list.
    pub destination: usize,
    /// Cost contributed by the pairing.
    pub cost: u32,
}

/// Result of a matching, ordered by origin index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    pairings: Vec<Pairing>,
    total_cost: u64,
}

impl Assignment {
    fn from_pairings(mut pairings: Vec<Pairing>) -> Self {
        pairings.sort_by_key(|pairing| pairing.origin);
        let total_cost = pairings.iter().map(|pairing| u64::from(pairing.cost)).sum();
        Self {
            pairings,
            total_cost,
        }
    }

    /// Pairings in ascending origin order.
    #[must_use]
    pub fn pairings(&self) -> &[Pairing] {
        &self.pairings
    }

    /// Sum of the costs of every pairing.
    #[must_use]
    pub const fn total_cost(&self) -> u64 {
        self.total_cost
    }

    /// Destination index matched with the provided origin, if any.
    #[must_use]
    pub fn destination_for(&self, origin: usize) -> Option<usize> {
        self.pairings
            .binary_search_by_key(&origin, |pairing| pairing.origin)
            .ok()
            .map(|index| self.pairings[index].destination)
    }

    /// Number of pairings in the matching.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairings.len()
    }

    /// Reports whether the matching is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairings.is_empty()
    }
}

/// Dense row-major matrix of pairing costs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CostMatrix {
    rows: usize,
    columns: usize,
    costs: Vec<u32>,
}

impl CostMatrix {
    /// Evaluates `cost` for every origin/destination pair.
    #[must_use]
    pub fn build<F>(origins: &[CellCoord], destinations: &[CellCoord], cost: F) -> Self
    where
        F: Fn(CellCoord, CellCoord) -> u32,
    {
        let mut costs = Vec::with_capacity(origins.len() * destinations.len());
        for &origin in origins {
            for &destination in destinations {
                costs.push(cost(origin, destination));
            }
        }
        Self {
            rows: origins.len(),
            columns: destinations.len(),
            costs,
        }
    }

    /// Number of rows (origins).
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (destinations).
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Cost of pairing `row` with `column`.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<u32> {
        if row < self.rows && column < self.columns {
            self.costs.get(row * self.columns + column).copied()
        } else {
            None
        }
    }

    fn cost(&self, row: usize, column: usize, transposed: bool) -> i64 {
        let (row, column) = if transposed {
            (column, row)
        } else {
            (row, column)
        };
        i64::from(self.costs[row * self.columns + column])
    }
}

/// Cost function used by the simulation: `|dx| + |dy|`.
#[must_use]
pub fn manhattan_cost(origin: CellCoord, destination: CellCoord) -> u32 {
    origin.manhattan_distance(destination)
}

/// Computes a minimum-cost perfect matching under Manhattan cost.
///
/// Empty inputs produce an empty assignment.
pub fn assign(
    origins: &[CellCoord],
    destinations: &[CellCoord],
) -> Result<Assignment, AssignmentError> {
    if origins.len() != destinations.len() {
        return Err(AssignmentError::LengthMismatch {
            origins: origins.len(),
            destinations: destinations.len(),
        });
    }
    Ok(assign_with(origins, destinations, manhattan_cost))
}

/// Matches `min(origins, destinations)` pairs at minimum Manhattan cost.
///
/// Unmatched origins or destinations are simply left out of the result.
#[must_use]
pub fn assign_partial(origins: &[CellCoord], destinations: &[CellCoord]) -> Assignment {
    assign_with(origins, destinations, manhattan_cost)
}

/// Runs the solver with a caller supplied cost function.
#[must_use]
pub fn assign_with<F>(origins: &[CellCoord], destinations: &[CellCoord], cost: F) -> Assignment
where
    F: Fn(CellCoord, CellCoord) -> u32,
{
    let matrix = CostMatrix::build(origins, destinations, cost);
    solve(&matrix)
}

/// Solves the assignment problem for an arbitrary rectangular matrix.
#[must_use]
pub fn solve(matrix: &CostMatrix) -> Assignment {
    if matrix.rows == 0 || matrix.columns == 0 {
        return Assignment::default();
    }

    let transposed = matrix.rows > matrix.columns;
    let (rows, columns) = if transposed {
        (matrix.columns, matrix.rows)
    } else {
        (matrix.rows, matrix.columns)
    };

    let row_for_column = hungarian(rows, columns, |row, column| {
        matrix.cost(row, column, transposed)
    });

    let pairings = row_for_column
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| **row != 0)
        .map(|(column, row)| {
            let (origin, destination) = if transposed {
                (column - 1, row - 1)
            } else {
                (row - 1, column - 1)
            };
            Pairing {
                origin,
                destination,
                cost: matrix.costs[origin * matrix.columns + destination],
            }
        })
        .collect();

    Assignment::from_pairings(pairings)
}

/// Hungarian algorithm for `rows <= columns`.
///
/// Indices are one-based internally; slot zero of every buffer is the virtual
/// root used while growing augmenting paths. The returned vector maps each
/// column to its one-based row, or zero when the column stays unmatched.
fn hungarian<F>(rows: usize, columns: usize, cost: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> i64,
{
    let mut row_potential = vec![0_i64; rows + 1];
    let mut column_potential = vec![0_i64; columns + 1];
    let mut row_for_column = vec![0_usize; columns + 1];
    let mut way = vec![0_usize; columns + 1];
    let mut min_slack = vec![i64::MAX; columns + 1];
    let mut used = vec![false; columns + 1];

    for row in 1..=rows {
        row_for_column[0] = row;
        let mut column = 0;
        min_slack.fill(i64::MAX);
        used.fill(false);

        loop {
            used[column] = true;
            let active_row = row_for_column[column];
            let mut delta = i64::MAX;
            let mut next_column = 0;

            for candidate in 1..=columns {
                if used[candidate] {
                    continue;
                }
                let slack = cost(active_row - 1, candidate - 1)
                    - row_potential[active_row]
                    - column_potential[candidate];
                if slack < min_slack[candidate] {
                    min_slack[candidate] = slack;
                    way[candidate] = column;
                }
                if min_slack[candidate] < delta {
                    delta = min_slack[candidate];
                    next_column = candidate;
                }
            }

            for candidate in 0..=columns {
                if used[candidate] {
                    row_potential[row_for_column[candidate]] += delta;
                    column_potential[candidate] -= delta;
                } else {
                    min_slack[candidate] -= delta;
                }
            }

            column = next_column;
            if row_for_column[column] == 0 {
                break;
            }
        }

        loop {
            let previous = way[column];
            row_for_column[column] = row_for_column[previous];
            column = previous;
            if column == 0 {
                break;
            }
        }
    }

    row_for_column
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_produce_empty_assignment() {
        let assignment = assign(&[], &[]).expect("empty inputs are valid");
        assert!(assignment.is_empty());
        assert_eq!(assignment.total_cost(), 0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let error = assign(&[CellCoord::new(0, 0)], &[]).unwrap_err();
        assert_eq!(
            error,
            AssignmentError::LengthMismatch {
                origins: 1,
                destinations: 0
            }
        );
    }

    #[test]
    fn crossing_pairs_are_untangled() {
        let origins = [CellCoord::new(0, 5), CellCoord::new(5, 5)];
        let destinations = [CellCoord::new(5, 0), CellCoord::new(0, 0)];

        let assignment = assign(&origins, &destinations).expect("equal lengths");

        assert_eq!(assignment.destination_for(0), Some(1));
        assert_eq!(assignment.destination_for(1), Some(0));
        assert_eq!(assignment.total_cost(), 10);
    }

    #[test]
    fn partial_assignment_matches_smaller_side() {
        let origins = [
            CellCoord::new(0, 4),
            CellCoord::new(1, 4),
            CellCoord::new(2, 4),
        ];
        let destinations = [CellCoord::new(2, 0)];

        let assignment = assign_partial(&origins, &destinations);

        assert_eq!(assignment.len(), 1);
        assert_eq!(assignment.pairings()[0].origin, 2);
        assert_eq!(assignment.total_cost(), 4);
        assert_eq!(assignment.destination_for(0), None);
    }

    #[test]
    fn cost_matrix_is_row_major() {
        let matrix = CostMatrix::build(
            &[CellCoord::new(0, 0), CellCoord::new(1, 1)],
            &[CellCoord::new(0, 0), CellCoord::new(3, 0), CellCoord::new(1, 1)],
            manhattan_cost,
        );
        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.columns(), 3);
        assert_eq!(matrix.get(0, 1), Some(3));
        assert_eq!(matrix.get(1, 2), Some(0));
        assert_eq!(matrix.get(2, 0), None);
    }
}
