//! Cast-copy pass for element types without hardware atomic add.
//!
//! `var` is widened into an `f32` workspace, scattered there, then narrowed back.
//! Both copies stream the flat element range with the same tiling.

use crate::error::Result;
use crate::footprint::{ACCUMULATOR_BYTES, cast_copy_bytes};
use crate::math::{ceil_div, floor_align, non_zero};
use crate::plan::{CastCopyTiling, Loop, MemoryUse, Split};
use crate::platform::SortScratch;

use super::Context;

pub(super) fn plan_cast_copy<S: SortScratch>(ctx: &Context<'_, S>) -> Result<CastCopyTiling> {
    let shape = ctx.shape;
    let var_bytes = shape.var_bytes();

    // Accumulator and element staging, double-buffered.
    let staged = ACCUMULATOR_BYTES + var_bytes;
    let ub_factor = floor_align(ctx.fast_mem / 2 / staged, ctx.align());

    let min_share = ctx.config.min_block_bytes / var_bytes;
    let per_unit = ceil_div(shape.var_elements, ctx.units()).max(min_share);
    let elements = Split::with_block(shape.var_elements, non_zero(per_unit, "cast block")?);

    let unit_loop = Loop::over(elements.per_unit, ub_factor, "cast batch")?;
    let tail_unit_loop = Loop::over(elements.tail, ub_factor, "cast batch")?;
    let memory = MemoryUse { footprint: cast_copy_bytes(ub_factor, var_bytes), budget: ctx.fast_mem };

    Ok(CastCopyTiling { elements, unit_loop, tail_unit_loop, memory })
}
