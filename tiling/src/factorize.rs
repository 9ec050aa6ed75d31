//! Two-dimensional work split.
//!
//! Picks `row_splits x col_splits` so that the grid of index rows and column blocks
//! fills the requested number of units with the least difference between a normal
//! tile and the ragged tail tiles.

use std::collections::BTreeSet;
use std::num::NonZeroU64;

use tracing::trace;

/// Axis to favour when two candidates leave the same imbalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TieBreak {
    FewerRowSplits,
    FewerColSplits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactorProblem {
    /// Index rows to split.
    pub rows: u64,
    /// Column blocks to split.
    pub col_blocks: u64,
    /// Units the grid should occupy.
    pub target: NonZeroU64,
    /// Whether splitting along columns is allowed at all.
    pub allow_col_split: bool,
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Factorization {
    pub row_splits: u64,
    pub col_splits: u64,
    /// Normal tile area minus tail tile area when the grid uses exactly `target`
    /// units, the whole normal tile area otherwise. Zero for perfectly even grids.
    pub waste: u64,
}

/// Candidate row-split counts for `target` units: every `m <= ceil(sqrt(target))`
/// together with its co-factor `target / m`.
pub fn unique_cuts(target: u64) -> BTreeSet<u64> {
    let root = target.isqrt();
    let last = if root * root == target { root } else { root + 1 };
    (1..=last).flat_map(|m| [m, target / m]).filter(|&m| m > 0).collect()
}

/// Choose the row and column split counts for `problem`.
///
/// Returns the first perfectly even grid that uses exactly `target` units. Otherwise
/// candidates are ranked by waste, then by the configured tie-break axis. Falls back
/// to `1 x 1` when no candidate respects the bounds.
pub fn factorize(problem: &FactorProblem) -> Factorization {
    let FactorProblem { rows, col_blocks, target, allow_col_split, tie_break } = *problem;
    let target = target.get();
    let mut candidates = Vec::new();

    for m in unique_cuts(target) {
        if m > rows {
            continue;
        }
        let n = (target / m).max(1);
        if n > col_blocks || (!allow_col_split && n > 1) {
            continue;
        }

        let row_norm = rows.div_ceil(m);
        let col_norm = col_blocks.div_ceil(n);
        let mut waste = row_norm * col_norm;
        if m * n == target {
            let rows_even = rows % m == 0;
            let cols_even = col_blocks % n == 0;
            let tail_area = match (rows_even, cols_even) {
                (true, true) => {
                    trace!(row_splits = m, col_splits = n, "Found even factorization");
                    return Factorization { row_splits: m, col_splits: n, waste: 0 };
                }
                (true, false) => row_norm * (col_blocks % col_norm),
                (false, true) => (rows % row_norm) * col_norm,
                (false, false) => (rows % row_norm) * (col_blocks % col_norm),
            };
            waste -= tail_area;
        }
        candidates.push(Factorization { row_splits: m, col_splits: n, waste });
    }

    match tie_break {
        TieBreak::FewerRowSplits => candidates.sort_by_key(|f| (f.waste, f.row_splits)),
        TieBreak::FewerColSplits => candidates.sort_by_key(|f| (f.waste, f.col_splits)),
    }

    let chosen = candidates
        .first()
        .copied()
        .unwrap_or(Factorization { row_splits: 1, col_splits: 1, waste: rows.saturating_mul(col_blocks) });
    trace!(chosen = ?chosen, candidates = candidates.len(), "Factorized work grid");
    chosen
}
