//! Self-check run on every plan before it is encoded.
//!
//! Verifies that every split and loop covers its extent exactly, that no split asks
//! for more units than the platform has, and that every phase fits its fast-memory
//! budget.

use snafu::ensure;

use crate::error::{InvariantViolatedSnafu, Result};
use crate::plan::{Loop, Split, Strategy, TilePlan};
use crate::platform::PlatformProfile;

pub fn check(plan: &TilePlan, platform: &PlatformProfile) -> Result<()> {
    let unit_count = platform.units();
    ensure!(
        (1..=unit_count).contains(&plan.units_to_launch),
        InvariantViolatedSnafu {
            invariant: format!("launching {} units on a {unit_count}-unit platform", plan.units_to_launch)
        }
    );

    for (name, split) in plan.strategy.splits() {
        check_split(name, &split, unit_count)?;
    }
    for (name, batches) in plan.strategy.loops() {
        check_loop(name, &batches)?;
    }
    for (name, memory) in plan.strategy.memory() {
        ensure!(
            memory.fits() && memory.budget <= plan.fast_mem_bytes,
            InvariantViolatedSnafu {
                invariant: format!(
                    "{name} needs {} bytes of a {} byte budget ({} usable)",
                    memory.footprint, memory.budget, plan.fast_mem_bytes
                )
            }
        );
    }

    let shape = &plan.shape;
    match &plan.strategy {
        Strategy::RowSorted(t) => {
            ensure!(
                t.covered() == shape.indices_count && (1..=t.batch).contains(&t.tail_batch),
                InvariantViolatedSnafu {
                    invariant: format!(
                        "sorted batches cover {} of {} indices (tail batch {})",
                        t.covered(),
                        shape.indices_count,
                        t.tail_batch
                    )
                }
            );
        }
        Strategy::ColumnAtomic(t) => {
            check_grid_extent(t.grid.rows.total, shape.indices_count, t.grid.cols.total, shape.var_cols)?;
            check_grid_units(t.grid.units(), unit_count)?;
        }
        Strategy::ColumnSorted(t) => {
            check_grid_extent(t.grid.rows.total, shape.indices_count, t.grid.cols.total, shape.var_cols)?;
            check_grid_units(t.grid.units(), unit_count)?;
        }
        _ => {}
    }
    Ok(())
}

fn check_split(name: &str, split: &Split, unit_count: u64) -> Result<()> {
    let covered = split.per_unit * split.units.saturating_sub(1) + split.tail;
    ensure!(
        split.units >= 1
            && split.units <= unit_count
            && covered == split.total
            && split.tail >= 1
            && split.tail <= split.per_unit,
        InvariantViolatedSnafu { invariant: format!("{name} split {split:?} does not cover its extent") }
    );
    Ok(())
}

fn check_loop(name: &str, batches: &Loop) -> Result<()> {
    if batches.extent == 0 {
        ensure!(
            batches.count == 0,
            InvariantViolatedSnafu { invariant: format!("{name} iterates over an empty extent") }
        );
        return Ok(());
    }

    let covered = batches.factor * batches.count.saturating_sub(1) + batches.tail;
    ensure!(
        batches.factor >= 1 && covered == batches.extent && batches.tail >= 1 && batches.tail <= batches.factor,
        InvariantViolatedSnafu { invariant: format!("{name} loop {batches:?} does not cover its extent") }
    );
    Ok(())
}

fn check_grid_extent(rows: u64, indices: u64, cols: u64, var_cols: u64) -> Result<()> {
    ensure!(
        rows == indices && cols == var_cols,
        InvariantViolatedSnafu { invariant: format!("grid spans {rows}x{cols}, problem is {indices}x{var_cols}") }
    );
    Ok(())
}

fn check_grid_units(units: u64, unit_count: u64) -> Result<()> {
    ensure!(
        units <= unit_count,
        InvariantViolatedSnafu { invariant: format!("grid needs {units} units, platform has {unit_count}") }
    );
    Ok(())
}
