//! Plan encoding: dispatch key, kernel argument record, workspace and launch size.

use std::fmt;
use std::num::NonZeroU64;

use tracing::debug;

use crate::config::PlannerConfig;
use crate::footprint::ACCUMULATOR_BYTES;
use crate::math::ceil_align;
use crate::plan::{CastCopyTiling, DeterministicTiling, Strategy, TileGrid, TilePlan};
use crate::shape::ShapeDescriptor;
use crate::strategy::{ExecutionModel, StrategyDecision};

// ============================================================================
// Dispatch key
// ============================================================================

/// Kernel template family selected by the execution model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr, strum::Display)]
#[repr(u64)]
pub enum TemplateKey {
    RowParallel = 0,
    ColumnParallel = 1,
}

impl From<ExecutionModel> for TemplateKey {
    fn from(model: ExecutionModel) -> Self {
        match model {
            ExecutionModel::RowParallel => Self::RowParallel,
            ExecutionModel::ColumnParallel => Self::ColumnParallel,
        }
    }
}

/// Compile-time switches of the kernel binary to launch.
///
/// Encoded as decimal digits, least significant first: sort, template, wide
/// addressing, scalar update, then five reserved slots pinned to `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub use_sort: bool,
    pub template: TemplateKey,
    /// Offsets exceed `i32` and need 64-bit addressing (row-parallel kernels only).
    pub wide_addressing: bool,
    pub update_is_scalar: bool,
}

impl DispatchKey {
    const DIGITS: usize = 9;
    const RESERVED: u64 = 3;
    const RESERVED_FROM: usize = 4;

    pub fn for_plan(plan: &TilePlan) -> Option<Self> {
        let decision = plan.decision?;
        let shape = &plan.shape;
        let wide_addressing = decision.execution_model == ExecutionModel::RowParallel
            && (shape.var_cols.saturating_mul(shape.indices_count) > i32::MAX as u64
                || shape.var_elements > i32::MAX as u64);
        Some(Self {
            use_sort: decision.use_sort,
            template: decision.execution_model.into(),
            wide_addressing,
            update_is_scalar: shape.update_is_scalar,
        })
    }

    fn digits(&self) -> [u64; Self::DIGITS] {
        let mut digits = [Self::RESERVED; Self::DIGITS];
        digits[0] = self.use_sort as u64;
        digits[1] = self.template as u64;
        digits[2] = self.wide_addressing as u64;
        digits[3] = self.update_is_scalar as u64;
        digits
    }

    pub fn encode(&self) -> u64 {
        self.digits().iter().rev().fold(0, |key, digit| key * 10 + digit)
    }

    /// Inverse of [`DispatchKey::encode`]; `None` for keys no plan produces.
    pub fn decode(key: u64) -> Option<Self> {
        let mut digits = [0u64; Self::DIGITS];
        let mut rest = key;
        for digit in &mut digits {
            *digit = rest % 10;
            rest /= 10;
        }
        if rest != 0 || digits[Self::RESERVED_FROM..].iter().any(|&d| d != Self::RESERVED) {
            return None;
        }

        let flag = |d: u64| match d {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        };
        Some(Self {
            use_sort: flag(digits[0])?,
            template: TemplateKey::from_repr(digits[1])?,
            wide_addressing: flag(digits[2])?,
            update_is_scalar: flag(digits[3])?,
        })
    }
}

/// Kernel entry point a plan is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum KernelVariant {
    Empty,
    RowAtomic,
    RowAtomicCast,
    RowSorted,
    ColumnAtomic,
    ColumnSorted,
    ColumnScalar,
    DeterministicColumn,
    DeterministicSorted,
}

impl From<&Strategy> for KernelVariant {
    fn from(strategy: &Strategy) -> Self {
        match strategy {
            Strategy::Empty => Self::Empty,
            Strategy::RowAtomic { cast: None } => Self::RowAtomic,
            Strategy::RowAtomic { cast: Some(_) } => Self::RowAtomicCast,
            Strategy::RowSorted(_) => Self::RowSorted,
            Strategy::ColumnAtomic(_) => Self::ColumnAtomic,
            Strategy::ColumnSorted(_) => Self::ColumnSorted,
            Strategy::ColumnScalar(_) => Self::ColumnScalar,
            Strategy::Deterministic(DeterministicTiling::Column(_)) => Self::DeterministicColumn,
            Strategy::Deterministic(DeterministicTiling::Sorted(_)) => Self::DeterministicSorted,
        }
    }
}

// ============================================================================
// Kernel argument record
// ============================================================================

macro_rules! tiling_record {
    ($($field:ident => $wire:literal),* $(,)?) => {
        /// Flat kernel argument block, one `u64` word per field in wire order.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct TilingRecord {
            $(pub $field: u64,)*
        }

        impl TilingRecord {
            /// Wire names in serialization order.
            pub const FIELD_NAMES: &'static [&'static str] = &[$($wire),*];
            pub const WORDS: usize = Self::FIELD_NAMES.len();

            pub fn to_words(&self) -> [u64; Self::WORDS] {
                [$(self.$field),*]
            }
        }
    };
}

tiling_record! {
    block_factor => "blockFactor",
    tail_block_factor => "tailBlockFactor",
    ub_factor => "ubFactor",
    tail_ub_factor => "tailUbFactor",
    tail_core_tail_ub_factor => "tailCoreTailUbFactor",
    indices_size => "indicesSize",
    var_rows => "varRows",
    var_cols => "varCols",
    indices_ub_factor => "indicesUbFactor",
    indices_loop_size => "indicesLoopSize",
    indices_tail_ub_factor => "indicesTailUbFactor",
    tail_core_indices_loop_size => "tailCoreIndicesLoopSize",
    tail_core_indices_tail_ub_factor => "tailCoreIndicesTailUbFactor",
    updates_ub_factor => "updatesUbFactor",
    updates_loop_size => "updatesLoopSize",
    updates_tail_ub_factor => "updatesTailUbFactor",
    copy_core_num => "copyCoreNum",
    per_core_handle_var => "perCoreHandleVar",
    atomic_add_core_num => "atomicAddCoreNum",
    per_core_handle_indices => "perCoreHandleIndices",
    post_axis_size => "postAxisSize",
    per_core_handle_col => "perCoreHandleCol",
    logic_core_num => "logicCoreNum",
    is_deterministic => "isDeterministic",
    tail_core_handle_col => "tailCoreHandleCol",
    tail_core_cols_loop_size => "tailCoreColsLoopSize",
    tail_core_cols_tail_ub_factor => "tailCoreColsTailUbFactor",
    per_core_handle_rows => "perCoreHandleRows",
    tail_core_handle_rows => "tailCoreHandleRows",
    rows_in_ub => "rowsInUb",
    dequantize_core_num => "deQuantizeCoreNum",
    is_determin_template => "isDeterminTemplate",
    dequantize_branch => "dequantizeBranch",
    norm_block_indices => "normBlockIndices",
    indices_factor => "indicesFactor",
    norm_block_loop => "normBlockLoop",
    tail_block_loop => "tailBlockLoop",
    tail_block_tail => "tailBlockTail",
    sort_core_num => "sortCoreNum",
    row_tile_num => "rowTileNum",
    col_tile_num => "colTileNum",
    norm_block_row => "normBlockRow",
    tail_block_row => "tailBlockRow",
    norm_block_col => "normBlockCol",
    tail_block_col => "tailBlockCol",
    ub_factor_row => "ubFactorRow",
    ub_factor_col => "ubFactorCol",
    indices_cast_mode => "indicesCastMode",
}

impl TilingRecord {
    pub fn from_plan(plan: &TilePlan) -> Self {
        let shape = &plan.shape;
        let mut record = Self {
            indices_size: shape.indices_count,
            var_rows: shape.var_rows,
            var_cols: shape.var_cols,
            is_determin_template: plan.decision.is_some_and(|d| d.deterministic) as u64,
            ..Self::default()
        };

        if let Some(cast) = plan.strategy.cast_copy() {
            record.fill_cast_copy(cast);
        }

        match &plan.strategy {
            Strategy::Empty => record.sort_core_num = 1,
            Strategy::RowAtomic { .. } => {}
            Strategy::RowSorted(t) => {
                record.indices_factor = t.batch;
                record.norm_block_loop = t.loops.per_unit;
                record.tail_block_loop = t.loops.tail;
                record.tail_block_tail = t.tail_batch;
                record.norm_block_indices = t.indices_per_unit();
                record.sort_core_num = t.loops.units;
                record.indices_cast_mode = t.cast.mode();
            }
            Strategy::ColumnAtomic(t) => record.fill_grid(&t.grid, t.ub_factor_row, t.ub_factor_col),
            Strategy::ColumnSorted(t) => {
                record.fill_grid(&t.grid, t.ub_factor_row, t.ub_factor_col);
                record.indices_cast_mode = t.cast.mode();
            }
            Strategy::ColumnScalar(t) => {
                record.atomic_add_core_num = t.indices.units;
                record.per_core_handle_indices = t.indices.per_unit;
                record.post_axis_size = shape.var_cols;
                record.indices_ub_factor = t.unit_loop.factor;
                record.indices_loop_size = t.unit_loop.count;
                record.indices_tail_ub_factor = t.unit_loop.tail;
                record.tail_core_indices_loop_size = t.tail_unit_loop.count;
                record.tail_core_indices_tail_ub_factor = t.tail_unit_loop.tail;
                record.updates_ub_factor = t.updates_loop.factor;
                record.updates_loop_size = t.updates_loop.count;
                record.updates_tail_ub_factor = t.updates_loop.tail;
            }
            Strategy::Deterministic(DeterministicTiling::Column(t)) => {
                record.per_core_handle_col = t.cols.per_unit;
                record.logic_core_num = t.cols.units;
                record.tail_core_handle_col = t.cols.tail;
                record.indices_ub_factor = t.indices_loop.factor;
                record.indices_loop_size = t.indices_loop.count;
                record.indices_tail_ub_factor = t.indices_loop.tail;
                record.updates_ub_factor = t.updates_loop.factor;
                record.updates_loop_size = t.updates_loop.count;
                record.updates_tail_ub_factor = t.updates_loop.tail;
                record.tail_core_cols_loop_size = t.tail_updates_loop.count;
                record.tail_core_cols_tail_ub_factor = t.tail_updates_loop.tail;
            }
            Strategy::Deterministic(DeterministicTiling::Sorted(t)) => {
                record.is_deterministic = 1;
                record.per_core_handle_indices = t.indices.per_unit;
                record.logic_core_num = t.indices.units;
                record.indices_ub_factor = t.unit_loop.factor;
                record.indices_loop_size = t.unit_loop.count;
                record.indices_tail_ub_factor = t.unit_loop.tail;
                record.tail_core_indices_loop_size = t.tail_unit_loop.count;
                record.tail_core_indices_tail_ub_factor = t.tail_unit_loop.tail;
                record.updates_ub_factor = t.updates_factor;
                record.dequantize_branch = t.dequantize.branch.code();
                record.per_core_handle_rows = t.dequantize.rows.per_unit;
                record.tail_core_handle_rows = t.dequantize.rows.tail;
                record.rows_in_ub = t.dequantize.rows_in_ub;
                record.dequantize_core_num = t.dequantize.rows.units;
            }
        }
        record
    }

    fn fill_cast_copy(&mut self, cast: &CastCopyTiling) {
        self.ub_factor = cast.ub_factor();
        self.block_factor = cast.unit_loop.count;
        self.tail_ub_factor = cast.unit_loop.tail;
        self.tail_block_factor = cast.tail_unit_loop.count;
        self.tail_core_tail_ub_factor = cast.tail_unit_loop.tail;
        self.copy_core_num = cast.elements.units;
        self.per_core_handle_var = cast.elements.per_unit;
    }

    fn fill_grid(&mut self, grid: &TileGrid, ub_factor_row: u64, ub_factor_col: u64) {
        self.atomic_add_core_num = grid.units();
        self.row_tile_num = grid.rows.units;
        self.col_tile_num = grid.cols.units;
        self.norm_block_row = grid.rows.per_unit;
        self.tail_block_row = grid.rows.tail;
        self.norm_block_col = grid.cols.per_unit;
        self.tail_block_col = grid.cols.tail;
        self.ub_factor_row = ub_factor_row;
        self.ub_factor_col = ub_factor_col;
    }

    /// Little-endian wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_words().iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

impl fmt::Display for TilingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in Self::FIELD_NAMES.iter().zip(self.to_words()) {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Launch parameters
// ============================================================================

/// Device scratch the launch needs: tooling reserve, the `f32` staging copy of
/// `var` for cast-copy plans, and the quantized workspace of deterministic sorts.
pub fn workspace_bytes(shape: &ShapeDescriptor, strategy: &Strategy, config: &PlannerConfig, align: NonZeroU64) -> u64 {
    let mut bytes = config.tools_workspace_bytes;
    if strategy.cast_copy().is_some() {
        bytes = bytes.saturating_add(ACCUMULATOR_BYTES.saturating_mul(shape.var_elements));
    }

    if let Strategy::Deterministic(DeterministicTiling::Sorted(t)) = strategy {
        let staged = t.indices.units.saturating_mul(t.indices.per_unit);
        let row_words = ceil_align(shape.var_cols.saturating_mul(ACCUMULATOR_BYTES), align) / ACCUMULATOR_BYTES;
        // Sorted indices, accumulated rows, quantized sums with their scales, row flags.
        let extra = staged
            .saturating_mul(shape.indices_bytes())
            .saturating_add(staged.saturating_mul(row_words).saturating_mul(ACCUMULATOR_BYTES))
            .saturating_add(shape.var_elements.saturating_mul(2 * 4))
            .saturating_add(shape.var_rows.saturating_mul(4));
        bytes = bytes.saturating_add(extra);
    }
    bytes
}

/// Units the kernel is launched on.
pub fn units_to_launch(strategy: &Strategy, unit_count: u64) -> u64 {
    match strategy {
        Strategy::Empty => 1,
        Strategy::RowSorted(t) => t.loops.units,
        Strategy::ColumnAtomic(t) => t.grid.units(),
        Strategy::ColumnSorted(t) => t.grid.units(),
        Strategy::ColumnScalar(t) => t.cast.elements.units.max(t.indices.units),
        Strategy::RowAtomic { .. } | Strategy::Deterministic(_) => unit_count,
    }
}

// ============================================================================
// Encoded plan
// ============================================================================

/// A plan together with everything a launcher hands to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPlan {
    pub plan: TilePlan,
    pub dispatch: Option<DispatchKey>,
    pub variant: KernelVariant,
    pub record: TilingRecord,
}

impl EncodedPlan {
    pub fn encode(plan: TilePlan) -> Self {
        let dispatch = DispatchKey::for_plan(&plan);
        let variant = KernelVariant::from(&plan.strategy);
        let record = TilingRecord::from_plan(&plan);

        debug!(
            tiling_key = dispatch.map_or(0, |k| k.encode()),
            variant = %variant,
            units = plan.units_to_launch,
            workspace = plan.workspace_bytes,
            "Encoded scatter-add plan"
        );
        debug!("Tiling record:\n{record}");
        Self { plan, dispatch, variant, record }
    }

    /// Dispatch key, `0` for the empty plan.
    pub fn tiling_key(&self) -> u64 {
        self.dispatch.map_or(0, |k| k.encode())
    }

    pub fn decision(&self) -> Option<StrategyDecision> {
        self.plan.decision
    }

    pub fn units_to_launch(&self) -> u64 {
        self.plan.units_to_launch
    }

    pub fn workspace_bytes(&self) -> u64 {
        self.plan.workspace_bytes
    }

    pub fn fast_mem_bytes(&self) -> u64 {
        self.plan.fast_mem_bytes
    }
}
