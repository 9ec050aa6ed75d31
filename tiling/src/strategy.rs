//! Strategy selection: execution model, atomic support, sorting and determinism.

use enumset::EnumSet;
use tilecraft_dtype::ScalarDType;
use tracing::debug;

use crate::config::PlannerConfig;
use crate::shape::ShapeDescriptor;

/// How work is distributed across units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionModel {
    /// Each lane handles whole short rows.
    RowParallel,
    /// Lanes cooperate along the columns of wide rows.
    ColumnParallel,
}

impl ExecutionModel {
    pub fn classify(shape: &ShapeDescriptor, config: &PlannerConfig) -> Self {
        if shape.row_bytes() < config.thin_row_bytes { Self::RowParallel } else { Self::ColumnParallel }
    }

    /// Element types the model cannot accumulate with hardware atomics.
    pub const fn atomic_unsupported(self) -> EnumSet<ScalarDType> {
        match self {
            Self::RowParallel => enumset::enum_set!(ScalarDType::Int8 | ScalarDType::UInt8),
            Self::ColumnParallel => enumset::enum_set!(ScalarDType::UInt8),
        }
    }
}

/// Floating types the deterministic sort-and-reduce kernels support.
pub const DETERMINISTIC_DTYPES: EnumSet<ScalarDType> =
    enumset::enum_set!(ScalarDType::Float32 | ScalarDType::Float16 | ScalarDType::BFloat16);

/// Branch-selecting booleans of one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrategyDecision {
    pub execution_model: ExecutionModel,
    pub atomic_supported: bool,
    pub use_sort: bool,
    pub deterministic: bool,
}

impl StrategyDecision {
    /// Decide the planning branch for a non-empty shape.
    ///
    /// Sorting is only considered when atomics are available. A deterministic request
    /// is honoured for float element types with non-scalar updates and disables sorting.
    pub fn select(shape: &ShapeDescriptor, config: &PlannerConfig, deterministic_requested: bool) -> Self {
        let execution_model = ExecutionModel::classify(shape, config);
        let atomic_supported = !execution_model.atomic_unsupported().contains(shape.var_dtype);
        let mut use_sort = atomic_supported && sort_pays_off(shape, config);

        let deterministic = deterministic_requested
            && !shape.update_is_scalar
            && DETERMINISTIC_DTYPES.contains(shape.var_dtype);
        if deterministic {
            use_sort = false;
        }

        let decision = Self { execution_model, atomic_supported, use_sort, deterministic };
        debug!(decision = ?decision, row_bytes = shape.row_bytes(), "Selected scatter-add strategy");
        decision
    }
}

fn sort_pays_off(shape: &ShapeDescriptor, config: &PlannerConfig) -> bool {
    let ratio = if shape.var_cols >= config.large_row_cols && shape.indices_count > config.min_sort_indices {
        config.sort_ratio_large_row
    } else {
        config.sort_ratio
    };
    shape.indices_count > shape.var_rows.saturating_mul(ratio)
}

/// Narrowing of the index stream before it is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexCast {
    pub source: ScalarDType,
    pub target: Option<ScalarDType>,
}

impl IndexCast {
    /// Narrowest key type able to address every row of `var`.
    pub fn for_shape(shape: &ShapeDescriptor) -> Self {
        Self { source: shape.indices_dtype, target: shape.indices_dtype.narrow_index(shape.var_rows) }
    }

    /// Type of the keys handed to the sort routine.
    pub fn key_dtype(&self) -> ScalarDType {
        self.target.unwrap_or(self.source)
    }

    /// Bytes of one narrowed key, zero when no narrowing happens.
    pub fn target_bytes(&self) -> u64 {
        self.target.map_or(0, |t| t.bytes())
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    /// Kernel-side mode code of the narrowing.
    pub fn mode(&self) -> u64 {
        use ScalarDType::*;
        match (self.source, self.target) {
            (Int32, Some(Int16)) => 1,
            (Int64, Some(Int32)) => 2,
            (Int64, Some(Int16)) => 3,
            (Int32, Some(UInt8)) => 4,
            (Int64, Some(UInt8)) => 5,
            _ => 0,
        }
    }
}
