//! Planner tunables.
//!
//! Thresholds below were tuned on one accelerator family and have no closed-form
//! derivation. They live here as named fields so a different resource profile can be
//! recalibrated without touching the planning code. Defaults reproduce the tuned values.

use bon::bon;

const KIB: u64 = 1024;

/// Tunable thresholds and fixed reservations used by the scatter-add planner.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannerConfig {
    // Strategy selection
    /// Rows narrower than this many bytes are planned row-parallel.
    pub thin_row_bytes: u64,
    /// Sort when `indices > rows * sort_ratio`.
    pub sort_ratio: u64,
    /// Lowered sort ratio for very wide rows.
    pub sort_ratio_large_row: u64,
    /// Column count at which a row counts as very wide.
    pub large_row_cols: u64,
    /// Minimum index count before the lowered ratio applies.
    pub min_sort_indices: u64,

    // Deterministic planning
    /// Row width in bytes above which the deterministic plan partitions columns.
    pub determin_mid_bytes: u64,
    /// Divisor of the row-width scaled dequantize threshold.
    pub determin_bot_bytes: u64,
    /// Scale factor of the dequantize threshold.
    pub dequant_scale: f64,
    /// Index counts below this are planned column-partitioned.
    pub determin_indices_threshold: u64,

    // Block sizes
    /// Column base block of the sorted column-parallel path, in bytes.
    pub column_base_bytes: u64,
    /// Minimum per-unit work of the sorted column-parallel path, in bytes.
    pub min_unit_block_bytes: u64,
    /// Rows no wider than this are never split along columns, in bytes.
    pub column_limit_bytes: u64,
    /// Column halving stops at this many columns.
    pub min_col_size: u64,
    /// Floor of per-unit element and index blocks, in bytes.
    pub min_block_bytes: u64,
    /// Padding reserved for sort statistics, in bytes.
    pub sort_stat_padding: u64,

    // Memory reservations
    /// Scratch the launch tooling always needs in device memory.
    pub tools_workspace_bytes: u64,
    /// Data cache reserved by row-parallel kernels without sort.
    pub row_cache_reserve: u64,
    /// Data cache reserved by row-parallel kernels with sort.
    pub row_sort_cache_reserve: u64,
    /// Compiler stack reserved by vector kernels.
    pub stack_reserve: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            thin_row_bytes: 128,
            sort_ratio: 10,
            sort_ratio_large_row: 3,
            large_row_cols: 100_000,
            min_sort_indices: 128,
            determin_mid_bytes: 128,
            determin_bot_bytes: 16,
            dequant_scale: 0.8,
            determin_indices_threshold: 4096,
            column_base_bytes: 512,
            min_unit_block_bytes: 1024,
            column_limit_bytes: 1024,
            min_col_size: 256,
            min_block_bytes: 1024,
            sort_stat_padding: 64,
            tools_workspace_bytes: 16 * KIB * KIB,
            row_cache_reserve: 128 * KIB,
            row_sort_cache_reserve: 32 * KIB,
            stack_reserve: 8 * KIB,
        }
    }
}

#[bon]
impl PlannerConfig {
    /// Create a planner configuration with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default = 128)] thin_row_bytes: u64,
        #[builder(default = 10)] sort_ratio: u64,
        #[builder(default = 3)] sort_ratio_large_row: u64,
        #[builder(default = 100_000)] large_row_cols: u64,
        #[builder(default = 128)] min_sort_indices: u64,
        #[builder(default = 128)] determin_mid_bytes: u64,
        #[builder(default = 16)] determin_bot_bytes: u64,
        #[builder(default = 0.8)] dequant_scale: f64,
        #[builder(default = 4096)] determin_indices_threshold: u64,
        #[builder(default = 512)] column_base_bytes: u64,
        #[builder(default = 1024)] min_unit_block_bytes: u64,
        #[builder(default = 1024)] column_limit_bytes: u64,
        #[builder(default = 256)] min_col_size: u64,
        #[builder(default = 1024)] min_block_bytes: u64,
        #[builder(default = 64)] sort_stat_padding: u64,
        #[builder(default = 16 * KIB * KIB)] tools_workspace_bytes: u64,
        #[builder(default = 128 * KIB)] row_cache_reserve: u64,
        #[builder(default = 32 * KIB)] row_sort_cache_reserve: u64,
        #[builder(default = 8 * KIB)] stack_reserve: u64,
    ) -> Self {
        Self {
            thin_row_bytes,
            sort_ratio,
            sort_ratio_large_row,
            large_row_cols,
            min_sort_indices,
            determin_mid_bytes,
            determin_bot_bytes,
            dequant_scale,
            determin_indices_threshold,
            column_base_bytes,
            min_unit_block_bytes,
            column_limit_bytes,
            min_col_size,
            min_block_bytes,
            sort_stat_padding,
            tools_workspace_bytes,
            row_cache_reserve,
            row_sort_cache_reserve,
            stack_reserve,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `TILECRAFT_SORT_RATIO` - Index/row ratio that triggers sorting (default: 10)
    /// * `TILECRAFT_SORT_RATIO_LARGE_ROW` - Ratio used for very wide rows (default: 3)
    /// * `TILECRAFT_THIN_ROW_BYTES` - Row-parallel cutoff in bytes (default: 128)
    /// * `TILECRAFT_DEQUANT_SCALE` - Dequantize branch scale factor (default: 0.8)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let sort_ratio = env_or("TILECRAFT_SORT_RATIO", defaults.sort_ratio);
        let sort_ratio_large_row = env_or("TILECRAFT_SORT_RATIO_LARGE_ROW", defaults.sort_ratio_large_row);
        let thin_row_bytes = env_or("TILECRAFT_THIN_ROW_BYTES", defaults.thin_row_bytes);
        let dequant_scale = env_or("TILECRAFT_DEQUANT_SCALE", defaults.dequant_scale);

        Self { sort_ratio, sort_ratio_large_row, thin_row_bytes, dequant_scale, ..defaults }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
