//! Plan data model.
//!
//! A [`TilePlan`] carries the analyzed shape, the strategy decision and a
//! [`Strategy`] variant holding only the partitions its kernel reads. Partitions are
//! expressed with two building blocks:
//!
//! * [`Split`] distributes an extent over execution units.
//! * [`Loop`] batches one unit's share through fast memory.

use std::num::NonZeroU64;

use smallvec::SmallVec;

use crate::error::Result;
use crate::factorize::Factorization;
use crate::math::{ceil_align, ceil_div, non_zero};
use crate::shape::ShapeDescriptor;
use crate::strategy::{IndexCast, StrategyDecision};

// ============================================================================
// Partitions
// ============================================================================

/// `total` items dealt to `units` units, `per_unit` each, the last unit taking `tail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Split {
    pub total: u64,
    pub per_unit: u64,
    pub units: u64,
    pub tail: u64,
}

impl Split {
    /// Spread `total` over at most `max_units` units as evenly as the ceiling allows.
    pub fn even(total: u64, max_units: NonZeroU64) -> Result<Self> {
        let per_unit = non_zero(ceil_div(total, max_units), "per-unit share")?;
        Ok(Self::with_block(total, per_unit))
    }

    /// Deal `total` in blocks of `per_unit`.
    pub fn with_block(total: u64, per_unit: NonZeroU64) -> Self {
        let units = ceil_div(total, per_unit);
        let tail = total - units.saturating_sub(1) * per_unit.get();
        Self { total, per_unit: per_unit.get(), units, tail }
    }
}

/// `extent` items processed `factor` at a time: `count` iterations, the last one `tail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loop {
    pub extent: u64,
    pub factor: u64,
    pub count: u64,
    pub tail: u64,
}

impl Loop {
    pub fn over(extent: u64, factor: u64, what: &'static str) -> Result<Self> {
        let divisor = non_zero(factor, what)?;
        let count = ceil_div(extent, divisor);
        let tail = extent - count.saturating_sub(1) * factor;
        Ok(Self { extent, factor, count, tail })
    }
}

/// Rectangular split of index rows by column blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileGrid {
    pub rows: Split,
    pub cols: Split,
}

impl TileGrid {
    /// Materialize a factorization over `rows x cols`. Column tiles are widened to a
    /// multiple of `col_align` elements.
    pub fn from_factorization(rows: u64, cols: u64, factors: Factorization, col_align: NonZeroU64) -> Result<Self> {
        let row_tile = non_zero(ceil_div(rows, non_zero(factors.row_splits, "row splits")?), "row tile")?;
        let col_tile = ceil_align(ceil_div(cols, non_zero(factors.col_splits, "column splits")?), col_align);
        let col_tile = non_zero(col_tile, "column tile")?;
        Ok(Self { rows: Split::with_block(rows, row_tile), cols: Split::with_block(cols, col_tile) })
    }

    pub fn units(&self) -> u64 {
        self.rows.units * self.cols.units
    }
}

/// Footprint of one kernel phase against the fast memory it may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryUse {
    pub footprint: u64,
    pub budget: u64,
}

impl MemoryUse {
    pub fn fits(&self) -> bool {
        self.footprint <= self.budget
    }
}

// ============================================================================
// Strategy variants
// ============================================================================

/// Element-wise cast copy of `var` into an `f32` workspace and back.
///
/// Used when the element type has no hardware atomic add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CastCopyTiling {
    pub elements: Split,
    pub unit_loop: Loop,
    pub tail_unit_loop: Loop,
    pub memory: MemoryUse,
}

impl CastCopyTiling {
    pub fn ub_factor(&self) -> u64 {
        self.unit_loop.factor
    }
}

/// Column-parallel atomic accumulation over a rows-by-columns grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnTiling {
    pub grid: TileGrid,
    pub ub_factor_row: u64,
    pub ub_factor_col: u64,
    pub memory: MemoryUse,
}

/// Column-parallel grid that sorts each row tile's indices before accumulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnSortTiling {
    pub grid: TileGrid,
    pub ub_factor_row: u64,
    pub ub_factor_col: u64,
    pub cast: IndexCast,
    pub memory: MemoryUse,
}

/// Column-parallel scatter through the `f32` workspace for types without atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnScalarTiling {
    pub cast: CastCopyTiling,
    pub indices: Split,
    pub unit_loop: Loop,
    pub tail_unit_loop: Loop,
    pub updates_loop: Loop,
    pub memory: MemoryUse,
}

/// Row-parallel sorted batches. Each unit runs `loops.per_unit` batches of `batch`
/// indices, the last unit `loops.tail` batches whose final one holds `tail_batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowSortTiling {
    pub batch: u64,
    pub loops: Split,
    pub tail_batch: u64,
    pub cast: IndexCast,
    pub memory: MemoryUse,
}

impl RowSortTiling {
    /// Indices handled by every unit but the last.
    pub fn indices_per_unit(&self) -> u64 {
        self.batch * self.loops.per_unit
    }

    /// Indices covered by all batches of all units.
    pub fn covered(&self) -> u64 {
        let full_units = self.loops.units.saturating_sub(1) * self.indices_per_unit();
        full_units + self.loops.tail.saturating_sub(1) * self.batch + self.tail_batch
    }
}

/// Deterministic plan partitioned by columns: every unit scans all indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeterministicColumnTiling {
    pub cols: Split,
    pub indices_loop: Loop,
    pub updates_loop: Loop,
    pub tail_updates_loop: Loop,
    pub memory: MemoryUse,
}

/// How the accumulated `f32` rows are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DequantizeBranch {
    /// Walk the sorted indices; cheap when few rows are touched.
    ByIndex,
    /// Walk every row of `var`.
    ByRow,
}

impl DequantizeBranch {
    pub const fn code(self) -> u64 {
        match self {
            Self::ByIndex => 1,
            Self::ByRow => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DequantizePlan {
    pub branch: DequantizeBranch,
    pub rows: Split,
    pub rows_in_ub: u64,
    pub memory: MemoryUse,
}

/// Deterministic plan that sorts indices into an `f32` workspace, then dequantizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeterministicSortTiling {
    pub indices: Split,
    pub unit_loop: Loop,
    pub tail_unit_loop: Loop,
    pub updates_factor: u64,
    pub dequantize: DequantizePlan,
    pub memory: MemoryUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeterministicTiling {
    Column(DeterministicColumnTiling),
    Sorted(DeterministicSortTiling),
}

/// Planning branch with the partitions its kernel needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Nothing to scatter.
    Empty,
    /// Row-parallel atomics over all units; types without atomics add a cast copy.
    RowAtomic { cast: Option<CastCopyTiling> },
    RowSorted(RowSortTiling),
    ColumnAtomic(ColumnTiling),
    ColumnSorted(ColumnSortTiling),
    ColumnScalar(ColumnScalarTiling),
    Deterministic(DeterministicTiling),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::RowAtomic { .. } => "row-atomic",
            Self::RowSorted(_) => "row-sorted",
            Self::ColumnAtomic(_) => "column-atomic",
            Self::ColumnSorted(_) => "column-sorted",
            Self::ColumnScalar(_) => "column-scalar",
            Self::Deterministic(DeterministicTiling::Column(_)) => "deterministic-column",
            Self::Deterministic(DeterministicTiling::Sorted(_)) => "deterministic-sorted",
        }
    }

    pub fn cast_copy(&self) -> Option<&CastCopyTiling> {
        match self {
            Self::RowAtomic { cast } => cast.as_ref(),
            Self::ColumnScalar(t) => Some(&t.cast),
            _ => None,
        }
    }

    /// Every unit split of the plan, named for diagnostics.
    pub fn splits(&self) -> SmallVec<[(&'static str, Split); 4]> {
        let mut out = SmallVec::new();
        if let Some(cast) = self.cast_copy() {
            out.push(("cast elements", cast.elements));
        }
        match self {
            Self::RowSorted(t) => out.push(("sorted batches", t.loops)),
            Self::ColumnAtomic(ColumnTiling { grid, .. }) | Self::ColumnSorted(ColumnSortTiling { grid, .. }) => {
                out.push(("grid rows", grid.rows));
                out.push(("grid columns", grid.cols));
            }
            Self::ColumnScalar(t) => out.push(("scatter indices", t.indices)),
            Self::Deterministic(DeterministicTiling::Column(t)) => out.push(("deterministic columns", t.cols)),
            Self::Deterministic(DeterministicTiling::Sorted(t)) => {
                out.push(("deterministic indices", t.indices));
                out.push(("dequantize rows", t.dequantize.rows));
            }
            Self::Empty | Self::RowAtomic { .. } => {}
        }
        out
    }

    /// Every fast-memory loop of the plan, named for diagnostics.
    pub fn loops(&self) -> SmallVec<[(&'static str, Loop); 4]> {
        let mut out = SmallVec::new();
        if let Some(cast) = self.cast_copy() {
            out.push(("cast unit loop", cast.unit_loop));
            out.push(("cast tail unit loop", cast.tail_unit_loop));
        }
        match self {
            Self::ColumnScalar(t) => {
                out.push(("scatter unit loop", t.unit_loop));
                out.push(("scatter tail unit loop", t.tail_unit_loop));
                out.push(("scatter updates loop", t.updates_loop));
            }
            Self::Deterministic(DeterministicTiling::Column(t)) => {
                out.push(("indices loop", t.indices_loop));
                out.push(("updates loop", t.updates_loop));
                out.push(("tail updates loop", t.tail_updates_loop));
            }
            Self::Deterministic(DeterministicTiling::Sorted(t)) => {
                out.push(("sort unit loop", t.unit_loop));
                out.push(("sort tail unit loop", t.tail_unit_loop));
            }
            _ => {}
        }
        out
    }

    /// Footprint of every kernel phase.
    pub fn memory(&self) -> SmallVec<[(&'static str, MemoryUse); 3]> {
        let mut out = SmallVec::new();
        if let Some(cast) = self.cast_copy() {
            out.push(("cast copy", cast.memory));
        }
        match self {
            Self::RowSorted(t) => out.push(("row sort", t.memory)),
            Self::ColumnAtomic(t) => out.push(("column atomic", t.memory)),
            Self::ColumnSorted(t) => out.push(("column sort", t.memory)),
            Self::ColumnScalar(t) => out.push(("column scatter", t.memory)),
            Self::Deterministic(DeterministicTiling::Column(t)) => out.push(("deterministic column", t.memory)),
            Self::Deterministic(DeterministicTiling::Sorted(t)) => {
                out.push(("deterministic sort", t.memory));
                out.push(("dequantize", t.dequantize.memory));
            }
            Self::Empty | Self::RowAtomic { .. } => {}
        }
        out
    }
}

/// Complete tiling decision for one scatter-add call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TilePlan {
    pub shape: ShapeDescriptor,
    /// `None` for the empty plan, which skips strategy selection.
    pub decision: Option<StrategyDecision>,
    pub strategy: Strategy,
    /// Fast memory left to the kernel after fixed reservations.
    pub fast_mem_bytes: u64,
    pub workspace_bytes: u64,
    pub units_to_launch: u64,
}

impl TilePlan {
    pub fn is_empty(&self) -> bool {
        matches!(self.strategy, Strategy::Empty)
    }
}
