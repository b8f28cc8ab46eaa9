//! Static grid model: bounds and permanently blocked cells.

use shapeshifter_core::CellCoord;

/// Bounded grid with a dense obstacle mask.
///
/// The mask is established when the world is built and never changes while
/// the simulation runs.
#[derive(Clone, Debug)]
pub struct Grid {
    columns: u32,
    rows: u32,
    blocked: Vec<bool>,
}

impl Grid {
    pub(crate) fn new(columns: u32, rows: u32, obstacles: &[CellCoord]) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        let mut blocked = vec![false; capacity];
        for &cell in obstacles {
            if let Some(slot) = cell_index(columns, rows, cell).and_then(|i| blocked.get_mut(i)) {
                *slot = true;
            }
        }
        Self {
            columns,
            rows,
            blocked,
        }
    }

    /// Number of columns contained in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows contained in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.within(self.columns, self.rows)
    }

    /// Reports whether the cell is permanently blocked.
    ///
    /// Cells outside the grid count as blocked.
    #[must_use]
    pub fn is_obstacle(&self, cell: CellCoord) -> bool {
        cell_index(self.columns, self.rows, cell)
            .and_then(|index| self.blocked.get(index).copied())
            .unwrap_or(true)
    }

    /// Iterates the blocked cells in row-major order.
    pub fn obstacles(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let width = self.columns.max(1);
        self.blocked
            .iter()
            .enumerate()
            .filter(|(_, blocked)| **blocked)
            .map(move |(index, _)| {
                let index = index as u32;
                CellCoord::new(index % width, index / width)
            })
    }
}

/// Row-major offset of `cell`, or `None` when it lies outside the bounds.
pub(crate) fn cell_index(columns: u32, rows: u32, cell: CellCoord) -> Option<usize> {
    if cell.column() < columns && cell.row() < rows {
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(columns).ok()?;
        Some(row * width + column)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obstacles_are_recorded_and_listed() {
        let grid = Grid::new(
            4,
            3,
            &[CellCoord::new(2, 1), CellCoord::new(0, 2), CellCoord::new(9, 9)],
        );

        assert!(grid.is_obstacle(CellCoord::new(2, 1)));
        assert!(!grid.is_obstacle(CellCoord::new(1, 1)));
        assert!(grid.is_obstacle(CellCoord::new(4, 0)));
        assert_eq!(
            grid.obstacles().collect::<Vec<_>>(),
            vec![CellCoord::new(2, 1), CellCoord::new(0, 2)]
        );
    }

    #[test]
    fn cell_index_is_row_major() {
        assert_eq!(cell_index(5, 4, CellCoord::new(3, 2)), Some(13));
        assert_eq!(cell_index(5, 4, CellCoord::new(5, 0)), None);
        assert_eq!(cell_index(5, 4, CellCoord::new(0, 4)), None);
    }
}
