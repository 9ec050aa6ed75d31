//! Fast-memory footprints of the kernel variants.
//!
//! Each footprint mirrors the buffers one kernel allocates for a batch, rounded the
//! way the kernel's allocator rounds them. All arithmetic saturates so that absurd
//! batch sizes compare as "does not fit" instead of wrapping.

use std::num::NonZeroU64;

use tilecraft_dtype::ScalarDType;

use crate::budget::Footprint;
use crate::platform::SortScratch;
use crate::strategy::IndexCast;

/// Bytes of the `u32` position emitted per sorted key.
pub const POSITION_BYTES: u64 = 4;
/// Bytes of the `f32` accumulator used by deterministic kernels.
pub const ACCUMULATOR_BYTES: u64 = 4;
/// Fixed offset padding the deterministic kernels keep per shifted buffer.
pub const SHIFT_OFFSET_BYTES: u64 = 32;

#[inline]
fn ca(value: u64, align: NonZeroU64) -> u64 {
    value.div_ceil(align.get()).saturating_mul(align.get())
}

#[inline]
fn mul(a: u64, b: u64) -> u64 {
    a.saturating_mul(b)
}

/// Staging buffers of the cast-copy pass: `f32` accumulator plus the element itself,
/// double-buffered.
pub fn cast_copy_bytes(factor: u64, var_bytes: u64) -> u64 {
    mul(mul(2, factor), ACCUMULATOR_BYTES + var_bytes)
}

/// Streaming kernels without sort: `buffers` copies of the update batch plus one
/// index batch.
pub fn stream_bytes(updates: u64, update_bytes: u64, buffers: u64, indices: u64, index_bytes: u64) -> u64 {
    mul(mul(updates, update_bytes), buffers).saturating_add(mul(indices, index_bytes))
}

/// Column-parallel atomic rows: double-buffered `rows x cols` updates with their indices.
#[derive(Debug, Clone, Copy)]
pub struct AtomicRows {
    pub cols: u64,
    pub update_bytes: u64,
    pub index_bytes: u64,
    pub align: NonZeroU64,
}

impl Footprint for AtomicRows {
    fn bytes(&self, rows: u64) -> u64 {
        let row = mul(self.cols, self.update_bytes).saturating_add(self.index_bytes);
        mul(2, self.align.get()).saturating_add(mul(2, mul(rows, row)))
    }
}

/// Column-parallel atomic rows that are sorted by index first.
#[derive(Debug, Clone, Copy)]
pub struct AtomicSortedRows<'a, S: SortScratch + ?Sized> {
    pub cols: u64,
    pub update_bytes: u64,
    pub cast: IndexCast,
    pub align: NonZeroU64,
    pub stat_padding: u64,
    pub scratch: &'a S,
}

impl<S: SortScratch + ?Sized> AtomicSortedRows<'_, S> {
    /// Double-buffered update tile of `rows x cols`.
    pub fn update_bytes(&self, rows: u64, cols: u64) -> u64 {
        mul(2, ca(mul(mul(rows, cols), self.update_bytes), self.align))
    }

    /// Everything except the update tile.
    pub fn index_bytes(&self, rows: u64) -> u64 {
        let key = self.cast.key_dtype();
        let keys = mul(2, ca(mul(rows, key.bytes()), self.align));
        let positions = mul(2, ca(mul(rows, POSITION_BYTES), self.align));
        let staged = if self.cast.is_active() { ca(mul(rows, self.cast.source.bytes()), self.align) } else { 0 };
        let sort = ca(self.scratch.scratch_bytes(key, rows), self.align);

        keys.saturating_add(positions)
            .saturating_add(mul(2, self.stat_padding))
            .saturating_add(staged)
            .saturating_add(sort)
    }
}

impl<S: SortScratch + ?Sized> Footprint for AtomicSortedRows<'_, S> {
    fn bytes(&self, rows: u64) -> u64 {
        self.update_bytes(rows, self.cols).saturating_add(self.index_bytes(rows))
    }
}

/// Row-parallel sorted batch of `n` indices with their full update rows.
#[derive(Debug, Clone, Copy)]
pub struct SortedBatch<'a, S: SortScratch + ?Sized> {
    pub var_cols: u64,
    pub update_bytes: u64,
    pub cast: IndexCast,
    pub align: NonZeroU64,
    pub scratch: &'a S,
}

impl<S: SortScratch + ?Sized> Footprint for SortedBatch<'_, S> {
    fn bytes(&self, n: u64) -> u64 {
        let align = self.align;
        let key = self.cast.key_dtype();
        let keys = mul(2, ca(mul(n, key.bytes()), align));
        let staged = if self.cast.is_active() { ca(mul(n, self.cast.source.bytes()), align) } else { 0 };
        // Sorted positions and unique-run offsets, each with two blocks of padding.
        let positions = mul(2, ca(mul(n, POSITION_BYTES), align).saturating_add(mul(2, align.get())));
        let sort = ca(self.scratch.scratch_bytes(key, n), align);
        let updates = ca(mul(mul(n, self.var_cols), self.update_bytes), align);

        keys.saturating_add(staged).saturating_add(positions).saturating_add(sort).saturating_add(updates)
    }
}

/// Deterministic sort-and-accumulate batch of `n` indices.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicBatch<'a, S: SortScratch + ?Sized> {
    pub var_cols: u64,
    pub var_bytes: u64,
    pub indices: ScalarDType,
    pub align: NonZeroU64,
    pub scratch: &'a S,
}

impl<S: SortScratch + ?Sized> Footprint for DeterministicBatch<'_, S> {
    fn bytes(&self, n: u64) -> u64 {
        let align = self.align;
        let updates = mul(n, ca(mul(self.var_bytes, self.var_cols), align));
        let accumulators = mul(n, ca(mul(ACCUMULATOR_BYTES, self.var_cols), align));
        let indices = mul(3, ca(mul(n, self.indices.bytes()), align));
        let positions = ca(mul(n, POSITION_BYTES), align);
        let padding = 6 * SHIFT_OFFSET_BYTES;
        let sort = self.scratch.scratch_bytes(self.indices, n);
        let row = ca(mul(ACCUMULATOR_BYTES, self.var_cols), align);

        updates
            .saturating_add(accumulators)
            .saturating_add(indices)
            .saturating_add(positions)
            .saturating_add(padding)
            .saturating_add(sort)
            .saturating_add(row)
    }
}

/// Dequantize pass over `rows` accumulated rows.
///
/// When `index_bytes` is set the pass walks the sorted indices and also stages them.
#[derive(Debug, Clone, Copy)]
pub struct DequantizeRows {
    pub var_cols: u64,
    pub index_bytes: Option<u64>,
    pub align: NonZeroU64,
}

impl Footprint for DequantizeRows {
    fn bytes(&self, rows: u64) -> u64 {
        let row = ca(mul(ACCUMULATOR_BYTES, self.var_cols), self.align);
        let indices = self.index_bytes.map_or(0, |b| ca(mul(b, rows), self.align));
        mul(mul(2, rows), row)
            .saturating_add(2 * SHIFT_OFFSET_BYTES)
            .saturating_add(row)
            .saturating_add(indices)
    }
}
