//! Target resource profile and the sort-library scratch contract.
//!
//! The planner never queries hardware itself. Callers describe the target with a
//! [`PlatformProfile`] and, when they link a sort library with different scratch
//! requirements, a [`SortScratch`] implementation.

use std::num::NonZeroU64;

use bon::bon;
use tilecraft_dtype::ScalarDType;

use crate::error::Result;
use crate::math::non_zero;

const fn nz(value: u64) -> NonZeroU64 {
    match NonZeroU64::new(value) {
        Some(value) => value,
        None => panic!("platform preset constants must be non-zero"),
    }
}

/// Parallel units and fast per-unit memory of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlatformProfile {
    /// Parallel execution units the plan may occupy.
    pub unit_count: NonZeroU64,
    /// Size of each unit's fast scratch memory in bytes.
    pub fast_mem_bytes: NonZeroU64,
    /// Minimum transfer and alignment granule of fast memory in bytes.
    pub alignment_bytes: NonZeroU64,
}

#[bon]
impl PlatformProfile {
    /// Create a validated profile.
    ///
    /// Fails with `DegenerateBudget` when any quantity is zero.
    #[builder]
    pub fn builder(unit_count: u64, fast_mem_bytes: u64, #[builder(default = 32)] alignment_bytes: u64) -> Result<Self> {
        Ok(Self {
            unit_count: non_zero(unit_count, "unit count")?,
            fast_mem_bytes: non_zero(fast_mem_bytes, "fast memory size")?,
            alignment_bytes: non_zero(alignment_bytes, "alignment granule")?,
        })
    }
}

impl PlatformProfile {
    /// Vector accelerator with 64 units, 248 KiB scratch and 32-byte blocks.
    pub const fn vector_accelerator() -> Self {
        Self { unit_count: nz(64), fast_mem_bytes: nz(248 * 1024), alignment_bytes: nz(32) }
    }

    /// Smaller part of the same family with 40 units and 192 KiB scratch.
    pub const fn vector_accelerator_lite() -> Self {
        Self { unit_count: nz(40), fast_mem_bytes: nz(192 * 1024), alignment_bytes: nz(32) }
    }

    pub const fn units(&self) -> u64 {
        self.unit_count.get()
    }

    pub const fn fast_mem(&self) -> u64 {
        self.fast_mem_bytes.get()
    }

    pub const fn align(&self) -> u64 {
        self.alignment_bytes.get()
    }
}

/// Scratch memory the on-device sort routine needs for one batch.
///
/// Implementations must be non-decreasing in `count`; the capacity search relies on it.
pub trait SortScratch {
    fn scratch_bytes(&self, key: ScalarDType, count: u64) -> u64;
}

/// Estimate for an 8-bit-digit radix sort that also emits source positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadixSortScratch;

impl RadixSortScratch {
    const BUCKETS: u64 = 256;
    const COUNTER_BYTES: u64 = 4;
    const POSITION_BYTES: u64 = 4;
    const GRANULE: u64 = 32;
}

impl SortScratch for RadixSortScratch {
    fn scratch_bytes(&self, key: ScalarDType, count: u64) -> u64 {
        // Ping-pong keys and positions plus a double-buffered histogram.
        let buffers = count.saturating_mul(key.bytes() + Self::POSITION_BYTES);
        let histogram = Self::BUCKETS * Self::COUNTER_BYTES * 2;
        buffers.saturating_add(histogram).checked_next_multiple_of(Self::GRANULE).unwrap_or(u64::MAX)
    }
}

impl<F: Fn(ScalarDType, u64) -> u64> SortScratch for F {
    fn scratch_bytes(&self, key: ScalarDType, count: u64) -> u64 {
        self(key, count)
    }
}
