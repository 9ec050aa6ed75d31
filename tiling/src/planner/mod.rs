//! Scatter-add planning pipeline.
//!
//! # Pipeline
//!
//! 1. **Shape analysis** - validate operands, flatten `var` to rows x columns
//! 2. **Empty check** - a zero-sized problem gets a one-unit plan and stops here
//! 3. **Strategy selection** - execution model, atomics, sort, determinism
//! 4. **Fast memory** - subtract the fixed reservations of the chosen kernel family
//! 5. **Branch planning** - exactly one planner produces the [`Strategy`] variant
//! 6. **Self-check** - [`invariants::check`](crate::invariants::check)
//! 7. **Encoding** - dispatch key, tiling record, workspace and launch size
//!
//! Planning is a pure function of its inputs: the same shapes, platform, config and
//! flag always produce the same plan.

mod cast;
mod column;
mod deterministic;
mod row;

use std::num::NonZeroU64;

use bon::bon;
use snafu::ensure;
use tracing::{debug, error};

use crate::config::PlannerConfig;
use crate::encode::{self, EncodedPlan};
use crate::error::{InsufficientFastMemorySnafu, Result};
use crate::invariants;
use crate::math::reserve;
use crate::plan::{Strategy, TilePlan};
use crate::platform::{PlatformProfile, RadixSortScratch, SortScratch};
use crate::shape::{self, ScatterAddInputs, ShapeDescriptor};
use crate::strategy::{ExecutionModel, StrategyDecision};

/// Everything a branch planner reads.
pub(crate) struct Context<'a, S> {
    pub shape: &'a ShapeDescriptor,
    pub config: &'a PlannerConfig,
    pub platform: &'a PlatformProfile,
    pub scratch: &'a S,
    /// Fast memory left after the kernel family's reservations.
    pub fast_mem: u64,
}

impl<S> Context<'_, S> {
    pub fn units(&self) -> NonZeroU64 {
        self.platform.unit_count
    }

    pub fn align(&self) -> NonZeroU64 {
        self.platform.alignment_bytes
    }
}

/// Reusable scatter-add planner for one platform.
#[derive(Debug, Clone)]
pub struct ScatterAddPlanner<S = RadixSortScratch> {
    platform: PlatformProfile,
    config: PlannerConfig,
    scratch: S,
}

#[bon]
impl ScatterAddPlanner<RadixSortScratch> {
    #[builder]
    pub fn builder(platform: PlatformProfile, #[builder(default)] config: PlannerConfig) -> Self {
        Self { platform, config, scratch: RadixSortScratch }
    }
}

impl<S: SortScratch> ScatterAddPlanner<S> {
    /// Swap the sort scratch estimator for one matching the linked sort routine.
    pub fn with_scratch<T: SortScratch>(self, scratch: T) -> ScatterAddPlanner<T> {
        ScatterAddPlanner { platform: self.platform, config: self.config, scratch }
    }

    pub fn platform(&self) -> &PlatformProfile {
        &self.platform
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Validate the operands, plan and encode.
    pub fn plan(&self, inputs: &ScatterAddInputs, deterministic: bool) -> Result<EncodedPlan> {
        let plan = shape::analyze(inputs)
            .and_then(|shape| self.tile(&shape, deterministic))
            .inspect_err(|err| error!(error = %err, "Scatter-add planning failed"))?;
        Ok(EncodedPlan::encode(plan))
    }

    /// Plan an already analyzed shape without encoding it.
    #[tracing::instrument(
        skip_all,
        fields(rows = shape.var_rows, cols = shape.var_cols, indices = shape.indices_count, deterministic = deterministic)
    )]
    pub fn tile(&self, shape: &ShapeDescriptor, deterministic: bool) -> Result<TilePlan> {
        let platform = &self.platform;
        let config = &self.config;

        let plan = if shape.is_empty() {
            debug!("Empty scatter-add, planning a single idle unit");
            TilePlan {
                shape: *shape,
                decision: None,
                strategy: Strategy::Empty,
                fast_mem_bytes: platform.fast_mem(),
                workspace_bytes: encode::workspace_bytes(shape, &Strategy::Empty, config, platform.alignment_bytes),
                units_to_launch: 1,
            }
        } else {
            let decision = StrategyDecision::select(shape, config, deterministic);
            let fast_mem = usable_fast_memory(&decision, platform, config)?;
            let ctx = Context { shape, config, platform, scratch: &self.scratch, fast_mem };
            let strategy = plan_strategy(&ctx, &decision)?;

            TilePlan {
                shape: *shape,
                decision: Some(decision),
                workspace_bytes: encode::workspace_bytes(shape, &strategy, config, platform.alignment_bytes),
                units_to_launch: encode::units_to_launch(&strategy, platform.units()),
                strategy,
                fast_mem_bytes: fast_mem,
            }
        };

        invariants::check(&plan, platform)?;
        debug!(strategy = plan.strategy.name(), units = plan.units_to_launch, "Planned scatter-add");
        Ok(plan)
    }
}

fn plan_strategy<S: SortScratch>(ctx: &Context<'_, S>, decision: &StrategyDecision) -> Result<Strategy> {
    use ExecutionModel::*;

    if decision.deterministic {
        return deterministic::plan_deterministic(ctx).map(Strategy::Deterministic);
    }

    let strategy = match (decision.execution_model, decision.atomic_supported, decision.use_sort) {
        (RowParallel, true, true) => Strategy::RowSorted(row::plan_row_sorted(ctx)?),
        (RowParallel, true, false) => Strategy::RowAtomic { cast: None },
        (RowParallel, false, _) => Strategy::RowAtomic { cast: Some(cast::plan_cast_copy(ctx)?) },
        (ColumnParallel, false, _) => Strategy::ColumnScalar(column::plan_column_scalar(ctx)?),
        (ColumnParallel, true, true) => Strategy::ColumnSorted(column::plan_column_sorted(ctx)?),
        (ColumnParallel, true, false) => Strategy::ColumnAtomic(column::plan_column_atomic(ctx)?),
    };
    Ok(strategy)
}

/// Fast memory left once the kernel family's caches and stack are reserved.
pub fn usable_fast_memory(decision: &StrategyDecision, platform: &PlatformProfile, config: &PlannerConfig) -> Result<u64> {
    let fast_mem = platform.fast_mem();
    match (decision.execution_model, decision.use_sort) {
        (ExecutionModel::RowParallel, true) => {
            reserve(fast_mem, config.row_sort_cache_reserve.saturating_add(config.stack_reserve))
        }
        (ExecutionModel::RowParallel, false) => {
            let cache = config.row_cache_reserve;
            ensure!(fast_mem > cache, InsufficientFastMemorySnafu { required: cache + 1, available: fast_mem });
            Ok(fast_mem - cache)
        }
        // Atomic column paths reserve the stack twice.
        (ExecutionModel::ColumnParallel, _) if decision.atomic_supported && !decision.deterministic => {
            reserve(fast_mem, config.stack_reserve.saturating_mul(2))
        }
        (ExecutionModel::ColumnParallel, _) => reserve(fast_mem, config.stack_reserve),
    }
}

/// Plan a scatter-add with default tunables and the radix sort scratch estimate.
///
/// See [`ScatterAddPlanner`] for reuse across calls or custom configuration.
pub fn plan(inputs: &ScatterAddInputs, platform: &PlatformProfile, deterministic: bool) -> Result<EncodedPlan> {
    plan_with_config(inputs, platform, &PlannerConfig::default(), deterministic)
}

pub fn plan_with_config(
    inputs: &ScatterAddInputs,
    platform: &PlatformProfile,
    config: &PlannerConfig,
    deterministic: bool,
) -> Result<EncodedPlan> {
    ScatterAddPlanner::builder().platform(*platform).config(config.clone()).build().plan(inputs, deterministic)
}
