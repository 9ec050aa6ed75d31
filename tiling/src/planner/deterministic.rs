//! Deterministic plans.
//!
//! Floating-point accumulation order must not depend on scheduling. Two layouts
//! achieve that:
//!
//! * Column partitioning, used for wide rows or few indices. Every unit owns a
//!   disjoint column range and scans all indices in order, so no two units touch
//!   the same element.
//! * Sort and quantize, used otherwise. Indices are partitioned, sorted and
//!   accumulated into an integer workspace whose sums are order independent, then a
//!   dequantize pass writes the rows back either by index or by row.

use tracing::debug;

use crate::budget::{Footprint, max_fitting};
use crate::error::Result;
use crate::footprint::{DequantizeRows, DeterministicBatch, stream_bytes};
use crate::math::{ceil_align, floor_align, non_zero, reserve};
use crate::plan::{
    DequantizeBranch, DequantizePlan, DeterministicColumnTiling, DeterministicSortTiling, DeterministicTiling, Loop,
    MemoryUse, Split,
};
use crate::platform::SortScratch;

use super::Context;

pub(super) fn plan_deterministic<S: SortScratch>(ctx: &Context<'_, S>) -> Result<DeterministicTiling> {
    let shape = ctx.shape;
    let config = ctx.config;
    if shape.row_bytes() > config.determin_mid_bytes || shape.indices_count < config.determin_indices_threshold {
        plan_by_columns(ctx).map(DeterministicTiling::Column)
    } else {
        plan_sorted(ctx).map(DeterministicTiling::Sorted)
    }
}

fn plan_by_columns<S: SortScratch>(ctx: &Context<'_, S>) -> Result<DeterministicColumnTiling> {
    let shape = ctx.shape;
    let mem = ctx.fast_mem;
    let align = ctx.align();
    let (index_bytes, update_bytes) = (shape.indices_bytes(), shape.updates_bytes());
    let min_block = ctx.config.min_block_bytes;

    let cols = Split::even(shape.var_cols, ctx.units())?;
    let col_block = non_zero(align.get() / shape.var_bytes(), "element block")?;

    let (updates_factor, indices_factor) = if cols.per_unit.saturating_mul(shape.var_bytes()) > reserve(mem, min_block)? {
        let staged = min_block.min(shape.indices_count * index_bytes);
        let indices_factor = ceil_align(staged, align) / index_bytes;
        let room = reserve(mem, indices_factor * index_bytes)? / update_bytes;
        (floor_align(cols.per_unit.min(room), col_block), indices_factor)
    } else {
        let updates_factor = ceil_align(cols.per_unit, col_block);
        (updates_factor, floor_align(reserve(mem, updates_factor * update_bytes)?, align) / index_bytes)
    };

    let indices_loop = Loop::over(shape.indices_count, indices_factor, "deterministic index batch")?;
    let updates_loop = Loop::over(cols.per_unit, updates_factor, "deterministic column batch")?;
    let tail_updates_loop = Loop::over(cols.tail, updates_factor, "deterministic column batch")?;

    debug!(units = cols.units, indices_factor, updates_factor, "Planned deterministic column partition");
    let memory = MemoryUse {
        footprint: stream_bytes(updates_factor, update_bytes, 1, indices_factor, index_bytes),
        budget: mem,
    };
    Ok(DeterministicColumnTiling { cols, indices_loop, updates_loop, tail_updates_loop, memory })
}

fn plan_sorted<S: SortScratch>(ctx: &Context<'_, S>) -> Result<DeterministicSortTiling> {
    let shape = ctx.shape;
    let align = ctx.align();
    // Sort and dequantize phases each get half of fast memory.
    let half = ctx.fast_mem / 2;

    let indices = Split::even(shape.indices_count, ctx.units())?;
    let footprint = DeterministicBatch {
        var_cols: shape.var_cols,
        var_bytes: shape.var_bytes(),
        indices: shape.indices_dtype,
        align,
        scratch: ctx.scratch,
    };
    let batch = max_fitting(indices.per_unit, half, &footprint)?;
    let unit_loop = Loop::over(indices.per_unit, batch, "deterministic sort batch")?;
    let tail_unit_loop = Loop::over(indices.tail, batch, "deterministic sort batch")?;

    let branch = dequantize_branch(ctx);
    let (rows, dequantize_footprint) = match branch {
        DequantizeBranch::ByIndex => (
            indices,
            DequantizeRows { var_cols: shape.var_cols, index_bytes: Some(shape.indices_bytes()), align },
        ),
        DequantizeBranch::ByRow => (
            Split::even(shape.var_rows, ctx.units())?,
            DequantizeRows { var_cols: shape.var_cols, index_bytes: None, align },
        ),
    };
    let rows_in_ub = max_fitting(rows.per_unit, half, &dequantize_footprint)?;
    let dequantize = DequantizePlan {
        branch,
        rows,
        rows_in_ub,
        memory: MemoryUse { footprint: dequantize_footprint.bytes(rows_in_ub), budget: half },
    };

    debug!(
        units = indices.units,
        batch,
        branch = %branch,
        rows_in_ub,
        "Planned deterministic sort with dequantize"
    );
    Ok(DeterministicSortTiling {
        indices,
        unit_loop,
        tail_unit_loop,
        updates_factor: shape.var_cols,
        dequantize,
        memory: MemoryUse { footprint: footprint.bytes(batch), budget: half },
    })
}

/// Dequantize by index when indices per row fall below a row-width dependent
/// threshold, by row otherwise.
fn dequantize_branch<S: SortScratch>(ctx: &Context<'_, S>) -> DequantizeBranch {
    let shape = ctx.shape;
    let config = ctx.config;
    let hits_per_row = (shape.indices_count / shape.var_rows) as f64;
    let row_bytes = shape.row_bytes();
    let threshold = if row_bytes >= config.determin_mid_bytes {
        config.dequant_scale
    } else {
        row_bytes as f64 / (config.determin_bot_bytes as f64 * config.dequant_scale)
    };

    if hits_per_row < threshold { DequantizeBranch::ByIndex } else { DequantizeBranch::ByRow }
}
