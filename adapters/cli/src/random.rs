//! Seeded destination generation for quick experiments.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shapeshifter_core::{CellCoord, ORIGIN_ROWS};
use thiserror::Error;

/// Raised when the grid cannot host the requested number of destinations.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("only {available} free cells above the origin rows, {requested} destinations requested")]
pub(crate) struct NotEnoughCells {
    pub(crate) requested: usize,
    pub(crate) available: usize,
}

/// Picks `count` distinct destinations above the origin rows.
///
/// Obstacles are skipped. The same seed always yields the same cells, sorted
/// in row-major order.
pub(crate) fn destinations(
    columns: u32,
    rows: u32,
    count: usize,
    obstacles: &[CellCoord],
    seed: u64,
) -> Result<Vec<CellCoord>, NotEnoughCells> {
    let blocked: HashSet<CellCoord> = obstacles.iter().copied().collect();
    let usable_rows = rows.saturating_sub(ORIGIN_ROWS);
    let candidates: Vec<CellCoord> = (0..usable_rows)
        .flat_map(|row| (0..columns).map(move |column| CellCoord::new(column, row)))
        .filter(|cell| !blocked.contains(cell))
        .collect();

    if candidates.len() < count {
        return Err(NotEnoughCells {
            requested: count,
            available: candidates.len(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut chosen: Vec<CellCoord> = candidates
        .choose_multiple(&mut rng, count)
        .copied()
        .collect();
    chosen.sort_unstable_by_key(|cell| (cell.row(), cell.column()));
    Ok(chosen)
}
