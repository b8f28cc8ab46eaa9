//! Dense map of which agent currently holds each cell.

use std::collections::BTreeMap;

use shapeshifter_core::{AgentId, CellCoord};

use crate::grid::cell_index;

#[derive(Clone, Debug)]
pub(crate) struct OccupancyGrid {
    columns: u32,
    rows: u32,
    cells: Vec<Option<AgentId>>,
}

impl OccupancyGrid {
    pub(crate) fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![None; capacity],
        }
    }

    /// Rebuilds the map from scratch. Later entries win shared cells.
    pub(crate) fn fill_with(&mut self, positions: impl IntoIterator<Item = (AgentId, CellCoord)>) {
        self.cells.fill(None);
        for (agent_id, cell) in positions {
            self.occupy(agent_id, cell);
        }
    }

    pub(crate) fn occupant(&self, cell: CellCoord) -> Option<AgentId> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied().flatten())
    }

    pub(crate) fn can_enter(&self, cell: CellCoord) -> bool {
        self.index(cell)
            .map_or(false, |index| matches!(self.cells.get(index), Some(None)))
    }

    pub(crate) fn occupy(&mut self, agent_id: AgentId, cell: CellCoord) {
        if let Some(slot) = self.index(cell).and_then(|index| self.cells.get_mut(index)) {
            *slot = Some(agent_id);
        }
    }

    /// Clears the cell only while it is still attributed to `agent_id`.
    pub(crate) fn release(&mut self, agent_id: AgentId, cell: CellCoord) {
        if let Some(slot) = self.index(cell).and_then(|index| self.cells.get_mut(index)) {
            if *slot == Some(agent_id) {
                *slot = None;
            }
        }
    }

    pub(crate) fn cells(&self) -> &[Option<AgentId>] {
        &self.cells
    }

    pub(crate) const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        cell_index(self.columns, self.rows, cell)
    }
}

/// Groups agent positions by cell and keeps the cells hosting several agents.
///
/// The result depends only on the supplied positions, so repeated calls over
/// an unchanged world return identical maps. Agents inside each entry are
/// sorted by identifier.
pub fn detect_overlaps(
    positions: impl IntoIterator<Item = (AgentId, CellCoord)>,
) -> BTreeMap<CellCoord, Vec<AgentId>> {
    let mut by_cell: BTreeMap<CellCoord, Vec<AgentId>> = BTreeMap::new();
    for (agent_id, cell) in positions {
        by_cell.entry(cell).or_default().push(agent_id);
    }
    by_cell.retain(|_, agents| agents.len() > 1);
    for agents in by_cell.values_mut() {
        agents.sort_unstable();
    }
    by_cell
}
