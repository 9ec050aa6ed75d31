//! Capacity search: the largest batch whose fast-memory footprint fits a budget.

use snafu::ensure;
use tracing::trace;

use crate::error::{DegenerateBudgetSnafu, InsufficientFastMemorySnafu, Result};

/// Fast-memory bytes a kernel needs to process a batch of `n` items.
///
/// Implementations must be non-decreasing in `n`.
pub trait Footprint {
    fn bytes(&self, n: u64) -> u64;
}

impl<F: Fn(u64) -> u64> Footprint for F {
    fn bytes(&self, n: u64) -> u64 {
        self(n)
    }
}

/// Largest `n` in `[1, upper]` with `footprint(n) <= budget`.
///
/// Fails with `InsufficientFastMemory` when even a single item does not fit, and with
/// `DegenerateBudget` when `upper` is zero. Costs `O(log upper)` footprint evaluations.
pub fn max_fitting(upper: u64, budget: u64, footprint: &impl Footprint) -> Result<u64> {
    ensure!(upper > 0, DegenerateBudgetSnafu { what: "batch upper bound" });

    let smallest = footprint.bytes(1);
    ensure!(smallest <= budget, InsufficientFastMemorySnafu { required: smallest, available: budget });

    // Invariant: footprint(lo) fits, and hi is either upper + 1 or known not to fit.
    let (mut lo, mut hi) = (1u64, upper.saturating_add(1));
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if footprint.bytes(mid) <= budget {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    trace!(upper, budget, batch = lo, "Capacity search finished");
    Ok(lo)
}
