//! Division and alignment helpers.
//!
//! Every quotient in the planner is taken through [`ceil_div`], [`floor_div`] or the
//! alignment helpers, which only accept a [`NonZeroU64`] divisor. Raw values become
//! divisors through [`non_zero`], so a zero denominator surfaces as
//! [`PlanError::DegenerateBudget`] instead of a panic.

use std::num::NonZeroU64;

use snafu::OptionExt;

use crate::error::{DegenerateBudgetSnafu, InsufficientFastMemorySnafu, Result};

/// Validate a divisor, naming it for diagnostics.
#[inline]
pub fn non_zero(value: u64, what: &'static str) -> Result<NonZeroU64> {
    NonZeroU64::new(value).context(DegenerateBudgetSnafu { what })
}

#[inline]
pub fn ceil_div(value: u64, divisor: NonZeroU64) -> u64 {
    value.div_ceil(divisor.get())
}

#[inline]
pub fn floor_div(value: u64, divisor: NonZeroU64) -> u64 {
    value / divisor
}

/// Round `value` up to the next multiple of `align`.
#[inline]
pub fn ceil_align(value: u64, align: NonZeroU64) -> u64 {
    ceil_div(value, align).saturating_mul(align.get())
}

/// Round `value` down to a multiple of `align`.
#[inline]
pub fn floor_align(value: u64, align: NonZeroU64) -> u64 {
    floor_div(value, align) * align.get()
}

/// Subtract a fixed reservation from a memory budget.
#[inline]
pub fn reserve(available: u64, reserved: u64) -> Result<u64> {
    available.checked_sub(reserved).context(InsufficientFastMemorySnafu { required: reserved, available })
}
