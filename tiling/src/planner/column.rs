//! Column-parallel plans: wide rows are cut into column blocks and the
//! `indices x column blocks` grid is spread over the units.

use std::num::NonZeroU64;

use tracing::debug;

use crate::budget::{Footprint, max_fitting};
use crate::error::Result;
use crate::factorize::{FactorProblem, TieBreak, factorize};
use crate::footprint::{ACCUMULATOR_BYTES, AtomicRows, AtomicSortedRows, stream_bytes};
use crate::math::{ceil_align, ceil_div, floor_align, non_zero, reserve};
use crate::plan::{ColumnScalarTiling, ColumnSortTiling, ColumnTiling, Loop, MemoryUse, Split, TileGrid};
use crate::platform::SortScratch;
use crate::strategy::IndexCast;

use super::{Context, cast::plan_cast_copy};

pub(super) fn plan_column_atomic<S: SortScratch>(ctx: &Context<'_, S>) -> Result<ColumnTiling> {
    let shape = ctx.shape;
    let (indices, cols) = (shape.indices_count, shape.var_cols);
    let (update_bytes, index_bytes) = (shape.updates_bytes(), shape.indices_bytes());
    let align = ctx.align();
    let units = ctx.units().get();
    let mem = ctx.fast_mem;
    let col_align = non_zero(align.get() / update_bytes, "column alignment")?;

    // Widest column batch for a single double-buffered row.
    let single_row = reserve(mem, 2 * (align.get() + index_bytes))?;
    let mut max_base_col = floor_align(single_row / 2 / update_bytes, col_align);

    let occupancy = |base_col: u64| -> Result<(u64, u64)> {
        let col_blocks = ceil_div(cols, non_zero(base_col, "column batch")?);
        Ok((col_blocks, units.min(indices.saturating_mul(col_blocks))))
    };
    let (mut col_blocks, mut target) = occupancy(max_base_col)?;
    while target <= units / 2 && max_base_col > ctx.config.min_col_size {
        max_base_col = ceil_align(max_base_col / 2, col_align);
        (col_blocks, target) = occupancy(max_base_col)?;
    }

    let factors = factorize(&FactorProblem {
        rows: indices,
        col_blocks,
        target: NonZeroU64::new(target).unwrap_or(NonZeroU64::MIN),
        allow_col_split: cols > max_base_col,
        tie_break: TieBreak::FewerRowSplits,
    });
    let grid = TileGrid::from_factorization(indices, cols, factors, col_align)?;

    let ub_factor_col = grid.cols.per_unit.min(max_base_col);
    let footprint = AtomicRows { cols: ub_factor_col, update_bytes, index_bytes, align };
    let ub_factor_row = reserve(mem, 2 * align.get())? / 2 / (ub_factor_col * update_bytes + index_bytes);
    let ub_factor_row = non_zero(ub_factor_row, "row batch")?.get();

    debug!(
        row_tiles = grid.rows.units,
        col_tiles = grid.cols.units,
        ub_factor_row,
        ub_factor_col,
        "Planned column-parallel atomic grid"
    );
    let memory = MemoryUse { footprint: footprint.bytes(ub_factor_row), budget: mem };
    Ok(ColumnTiling { grid, ub_factor_row, ub_factor_col, memory })
}

pub(super) fn plan_column_sorted<S: SortScratch>(ctx: &Context<'_, S>) -> Result<ColumnSortTiling> {
    let shape = ctx.shape;
    let config = ctx.config;
    let (indices, cols) = (shape.indices_count, shape.var_cols);
    let (update_bytes, index_bytes) = (shape.updates_bytes(), shape.indices_bytes());
    let align = ctx.align();
    let col_align = non_zero(align.get() / update_bytes, "column alignment")?;

    let base_col = non_zero(config.column_base_bytes / update_bytes, "column base block")?;
    let col_blocks = ceil_div(cols, base_col);
    let work = indices.saturating_mul(col_blocks).saturating_mul(config.column_base_bytes);
    let target = ctx.units().get().min(work / non_zero(config.min_unit_block_bytes, "minimum unit block")?);

    let factors = factorize(&FactorProblem {
        rows: indices,
        col_blocks,
        target: NonZeroU64::new(target).unwrap_or(NonZeroU64::MIN),
        allow_col_split: cols.saturating_mul(update_bytes) > config.column_limit_bytes,
        tie_break: TieBreak::FewerColSplits,
    });
    let grid = TileGrid::from_factorization(indices, cols, factors, col_align)?;

    let mut ub_factor_col = if grid.cols.per_unit.saturating_mul(update_bytes) <= config.column_limit_bytes {
        grid.cols.per_unit
    } else {
        base_col.get()
    };

    let mem = ctx.fast_mem;
    let cast = IndexCast::for_shape(shape);
    let per_row = ub_factor_col * update_bytes + index_bytes + cast.target_bytes();
    let max_base_row = (reserve(mem, align.get())? / per_row).max(1);

    let mut footprint = AtomicSortedRows {
        cols: ub_factor_col,
        update_bytes,
        cast,
        align,
        stat_padding: config.sort_stat_padding,
        scratch: ctx.scratch,
    };
    let mut ub_factor_row = max_fitting(max_base_row, mem, &footprint)?;

    // A unit never sees more rows than its tile; spend the slack on wider columns.
    let core_max_row = grid.rows.per_unit.max(grid.rows.tail);
    if core_max_row < ub_factor_row {
        ub_factor_row = core_max_row;
        let remain = reserve(mem, footprint.index_bytes(ub_factor_row))?;
        let widened = reserve(remain, 2 * align.get())? / 2 / (ub_factor_row * update_bytes);
        ub_factor_col = non_zero(floor_align(widened, col_align), "column batch")?.get();
        footprint.cols = ub_factor_col;
    }

    debug!(
        row_tiles = grid.rows.units,
        col_tiles = grid.cols.units,
        ub_factor_row,
        ub_factor_col,
        cast_mode = cast.mode(),
        "Planned column-parallel sorted grid"
    );
    let memory = MemoryUse { footprint: footprint.bytes(ub_factor_row), budget: mem };
    Ok(ColumnSortTiling { grid, ub_factor_row, ub_factor_col, cast, memory })
}

pub(super) fn plan_column_scalar<S: SortScratch>(ctx: &Context<'_, S>) -> Result<ColumnScalarTiling> {
    let cast = plan_cast_copy(ctx)?;

    let shape = ctx.shape;
    let config = ctx.config;
    let mem = ctx.fast_mem;
    let align = ctx.align();
    let cols = shape.var_cols;
    let index_bytes = shape.indices_bytes();
    let indices = Split::even(shape.indices_count, ctx.units())?;

    // Updates are widened next to their accumulator; a single broadcast value is not staged.
    let update_bytes = if shape.updates_count == 1 { ACCUMULATOR_BYTES } else { ACCUMULATOR_BYTES + shape.var_bytes() };
    let var_block = non_zero(align.get() / shape.var_bytes(), "element block")?;

    let mut updates_factor = ceil_align(cols, var_block);
    let half = reserve(mem, config.min_block_bytes)? / 2;
    let indices_factor = if updates_factor.saturating_mul(update_bytes) > half {
        let staged = config.min_block_bytes.min(indices.per_unit * index_bytes);
        let indices_factor = ceil_align(staged, align) / index_bytes;
        let room = reserve(mem, indices_factor * index_bytes)? / 2 / update_bytes;
        updates_factor = floor_align(cols.min(room), var_block);
        indices_factor
    } else {
        floor_align(reserve(mem, updates_factor * update_bytes * 2)?, align) / index_bytes
    };

    let unit_loop = Loop::over(indices.per_unit, indices_factor, "scatter index batch")?;
    let tail_unit_loop = Loop::over(indices.tail, indices_factor, "scatter index batch")?;
    let updates_loop = Loop::over(cols, updates_factor, "scatter update batch")?;

    debug!(indices_factor, updates_factor, units = indices.units, "Planned column-parallel scatter without atomics");
    let memory = MemoryUse {
        footprint: stream_bytes(updates_factor, update_bytes, 2, indices_factor, index_bytes),
        budget: mem,
    };
    Ok(ColumnScalarTiling { cast, indices, unit_loop, tail_unit_loop, updates_loop, memory })
}
