//! Row-parallel sorted plan.
//!
//! Indices are processed in batches of `batch`; each batch is sorted so duplicate
//! rows are reduced locally before the atomic write. Batches are dealt to units in
//! contiguous runs.

use std::num::NonZeroU64;

use tracing::debug;

use crate::budget::{Footprint, max_fitting};
use crate::error::Result;
use crate::footprint::SortedBatch;
use crate::math::{ceil_div, non_zero};
use crate::plan::{MemoryUse, RowSortTiling, Split};
use crate::platform::SortScratch;
use crate::strategy::IndexCast;

use super::Context;

pub(super) fn plan_row_sorted<S: SortScratch>(ctx: &Context<'_, S>) -> Result<RowSortTiling> {
    let shape = ctx.shape;
    let indices = shape.indices_count;
    let units = ctx.units();
    let cast = IndexCast::for_shape(shape);

    let footprint = SortedBatch {
        var_cols: shape.var_cols,
        update_bytes: shape.updates_bytes(),
        cast,
        align: ctx.align(),
        scratch: ctx.scratch,
    };
    let mut batch = max_fitting(indices, ctx.fast_mem, &footprint)?;
    let mut loops = deal_batches(indices, batch, units)?;

    // Shrink batches until at least half the units have work.
    while loops.units <= units.get() / 2 && batch > 1 {
        batch /= 2;
        loops = deal_batches(indices, batch, units)?;
    }

    let tail_batch = indices - batch * (loops.total - 1);
    debug!(batch, batches = loops.total, units = loops.units, cast = ?cast.target, "Planned row-parallel sort");

    let memory = MemoryUse { footprint: footprint.bytes(batch), budget: ctx.fast_mem };
    Ok(RowSortTiling { batch, loops, tail_batch, cast, memory })
}

fn deal_batches(indices: u64, batch: u64, units: NonZeroU64) -> Result<Split> {
    let batches = ceil_div(indices, non_zero(batch, "sort batch")?);
    Split::even(batches, units)
}
