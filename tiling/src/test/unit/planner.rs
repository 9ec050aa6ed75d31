use test_case::test_case;
use tilecraft_dtype::ScalarDType;

use crate::budget::Footprint;
use crate::config::PlannerConfig;
use crate::encode::KernelVariant;
use crate::error::PlanError;
use crate::footprint::AtomicSortedRows;
use crate::plan::{Loop, Split, Strategy};
use crate::planner::{ScatterAddPlanner, plan, usable_fast_memory};
use crate::platform::{PlatformProfile, RadixSortScratch};
use crate::strategy::{ExecutionModel, StrategyDecision};
use crate::test::helpers::{RESERVED_KEY, plan_f32, planner, scatter};

const FAST_MEM: u64 = 248 * 1024;
const TOOLS_WORKSPACE: u64 = 16 * 1024 * 1024;

#[test]
fn test_empty_var() {
    let encoded = plan_f32(&[0, 16], &[8], false);

    assert_eq!(encoded.plan.strategy, Strategy::Empty);
    assert_eq!(encoded.plan.decision, None);
    assert_eq!(encoded.tiling_key(), 0);
    assert_eq!(encoded.units_to_launch(), 1);
    assert_eq!(encoded.workspace_bytes(), TOOLS_WORKSPACE);
    assert_eq!(encoded.record.sort_core_num, 1);
    assert_eq!(encoded.record.var_rows, 0);
    assert_eq!(encoded.record.var_cols, 16);
}

#[test]
fn test_empty_indices() {
    let encoded = plan_f32(&[10, 16], &[0], false);
    assert!(encoded.plan.is_empty());
    assert_eq!(encoded.variant, KernelVariant::Empty);
}

#[test]
fn test_empty_plan_ignores_memory_limits() {
    let tiny = PlatformProfile::builder().unit_count(4).fast_mem_bytes(1024).build().unwrap();
    let inputs = scatter(&[0, 8], &[3], ScalarDType::Float32, ScalarDType::Int32);
    assert_eq!(plan(&inputs, &tiny, false).unwrap().units_to_launch(), 1);
}

#[test]
fn test_row_atomic() {
    let encoded = plan_f32(&[1000, 8], &[500], false);

    assert_eq!(encoded.plan.strategy, Strategy::RowAtomic { cast: None });
    assert_eq!(encoded.units_to_launch(), 64);
    assert_eq!(encoded.fast_mem_bytes(), FAST_MEM - 128 * 1024);
    assert_eq!(encoded.tiling_key(), RESERVED_KEY);
    assert_eq!(encoded.workspace_bytes(), TOOLS_WORKSPACE);
}

#[test]
fn test_row_atomic_with_cast_copy() {
    let inputs = scatter(&[1000, 8], &[500], ScalarDType::Int8, ScalarDType::Int32);
    let encoded = planner().plan(&inputs, false).unwrap();

    let Strategy::RowAtomic { cast: Some(cast) } = encoded.plan.strategy else {
        panic!("expected a cast copy, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(cast.elements, Split { total: 8000, per_unit: 1024, units: 8, tail: 832 });
    assert_eq!(cast.unit_loop, Loop { extent: 1024, factor: 12288, count: 1, tail: 1024 });
    assert_eq!(cast.tail_unit_loop, Loop { extent: 832, factor: 12288, count: 1, tail: 832 });

    assert_eq!(encoded.variant, KernelVariant::RowAtomicCast);
    assert_eq!(encoded.units_to_launch(), 64);
    assert_eq!(encoded.workspace_bytes(), TOOLS_WORKSPACE + 4 * 8000);

    let record = encoded.record;
    assert_eq!(record.ub_factor, 12288);
    assert_eq!(record.copy_core_num, 8);
    assert_eq!(record.per_core_handle_var, 1024);
    assert_eq!(record.tail_core_tail_ub_factor, 832);
}

#[test]
fn test_row_sorted() {
    let encoded = plan_f32(&[100, 4], &[100_000], false);

    let Strategy::RowSorted(tiling) = encoded.plan.strategy else {
        panic!("expected a row sort, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.covered(), 100_000);
    assert_eq!(tiling.cast.mode(), 4);
    // Batches shrink until more than half of the units are busy.
    assert!(tiling.loops.units > 32 || tiling.batch == 1);
    assert!(tiling.memory.footprint <= FAST_MEM - 40 * 1024);

    assert_eq!(encoded.units_to_launch(), tiling.loops.units);
    assert_eq!(encoded.tiling_key(), RESERVED_KEY + 1);
    assert_eq!(encoded.record.sort_core_num, tiling.loops.units);
    assert_eq!(encoded.record.norm_block_indices, tiling.batch * tiling.loops.per_unit);
    assert_eq!(encoded.record.indices_cast_mode, 4);
}

#[test]
fn test_column_atomic_splits_rows() {
    let encoded = plan_f32(&[1000, 4096], &[200], false);

    let Strategy::ColumnAtomic(tiling) = encoded.plan.strategy else {
        panic!("expected a column grid, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.grid.rows, Split { total: 200, per_unit: 4, units: 50, tail: 4 });
    assert_eq!(tiling.grid.cols, Split { total: 4096, per_unit: 4096, units: 1, tail: 4096 });
    assert_eq!((tiling.ub_factor_row, tiling.ub_factor_col), (7, 4096));
    assert_eq!(tiling.memory.budget, encoded.fast_mem_bytes());
    assert_eq!(encoded.fast_mem_bytes(), FAST_MEM - 16 * 1024);

    assert_eq!(encoded.units_to_launch(), 50);
    assert_eq!(encoded.tiling_key(), RESERVED_KEY + 10);
    assert_eq!(encoded.record.atomic_add_core_num, 50);
    assert_eq!(encoded.record.row_tile_num, 50);
}

#[test]
fn test_column_atomic_splits_columns() {
    let encoded = plan_f32(&[10, 100_000], &[2], false);

    let Strategy::ColumnAtomic(tiling) = encoded.plan.strategy else {
        panic!("expected a column grid, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.grid.rows, Split { total: 2, per_unit: 1, units: 2, tail: 1 });
    assert_eq!(tiling.grid.cols, Split { total: 100_000, per_unit: 3704, units: 27, tail: 3696 });
    assert_eq!((tiling.ub_factor_row, tiling.ub_factor_col), (8, 3704));
    assert_eq!(encoded.units_to_launch(), 54);
}

#[test]
fn test_column_sorted_batch_is_maximal() {
    let encoded = plan_f32(&[100, 1024], &[2000], false);

    let Strategy::ColumnSorted(tiling) = encoded.plan.strategy else {
        panic!("expected a sorted column grid, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.grid.rows, Split { total: 2000, per_unit: 250, units: 8, tail: 250 });
    assert_eq!(tiling.grid.cols, Split { total: 1024, per_unit: 128, units: 8, tail: 128 });
    assert_eq!(tiling.ub_factor_col, 128);
    assert_eq!(tiling.cast.mode(), 4);

    let budget = FAST_MEM - 16 * 1024;
    assert_eq!(encoded.fast_mem_bytes(), budget);
    let footprint = AtomicSortedRows {
        cols: 128,
        update_bytes: 4,
        cast: tiling.cast,
        align: PlatformProfile::vector_accelerator().alignment_bytes,
        stat_padding: 64,
        scratch: &RadixSortScratch,
    };
    assert!(footprint.bytes(tiling.ub_factor_row) <= budget);
    assert!(footprint.bytes(tiling.ub_factor_row + 1) > budget);

    assert_eq!(encoded.units_to_launch(), 64);
    assert_eq!(encoded.tiling_key(), RESERVED_KEY + 11);
}

#[test]
fn test_column_sorted_widens_columns_for_short_tiles() {
    let encoded = plan_f32(&[100, 256], &[1500], false);

    let Strategy::ColumnSorted(tiling) = encoded.plan.strategy else {
        panic!("expected a sorted column grid, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.grid.rows, Split { total: 1500, per_unit: 24, units: 63, tail: 12 });
    assert_eq!(tiling.grid.cols.units, 1);
    assert_eq!(tiling.ub_factor_row, 24);
    assert_eq!(tiling.ub_factor_col, 1216);
    assert_eq!(encoded.units_to_launch(), 63);
}

#[test]
fn test_column_scalar_for_uint8() {
    let inputs = scatter(&[1000, 256], &[300], ScalarDType::UInt8, ScalarDType::Int32);
    let encoded = planner().plan(&inputs, false).unwrap();

    let Strategy::ColumnScalar(tiling) = encoded.plan.strategy else {
        panic!("expected a scalar column plan, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.cast.elements, Split { total: 256_000, per_unit: 4000, units: 64, tail: 4000 });
    assert_eq!(tiling.cast.ub_factor(), 24576);
    assert_eq!(tiling.indices, Split { total: 300, per_unit: 5, units: 60, tail: 5 });
    assert_eq!(tiling.unit_loop, Loop { extent: 5, factor: 60800, count: 1, tail: 5 });
    assert_eq!(tiling.updates_loop, Loop { extent: 256, factor: 256, count: 1, tail: 256 });

    assert_eq!(encoded.units_to_launch(), 64);
    assert_eq!(encoded.workspace_bytes(), TOOLS_WORKSPACE + 4 * 256_000);
    assert_eq!(encoded.tiling_key(), RESERVED_KEY + 10);

    let record = encoded.record;
    assert_eq!(record.atomic_add_core_num, 60);
    assert_eq!(record.post_axis_size, 256);
    assert_eq!(record.indices_ub_factor, 60800);
    assert_eq!(record.copy_core_num, 64);
}

#[test]
fn test_scalar_update_key() {
    let inputs = crate::test::helpers::scatter_scalar(&[1000, 8], &[500], ScalarDType::Float32);
    let encoded = planner().plan(&inputs, false).unwrap();
    assert_eq!(encoded.tiling_key(), RESERVED_KEY + 1000);
}

#[test_case(ExecutionModel::RowParallel, true, true, false, FAST_MEM - 40 * 1024 ; "row sorted")]
#[test_case(ExecutionModel::RowParallel, true, false, false, FAST_MEM - 128 * 1024 ; "row atomic")]
#[test_case(ExecutionModel::ColumnParallel, true, false, false, FAST_MEM - 16 * 1024 ; "column atomic")]
#[test_case(ExecutionModel::ColumnParallel, true, true, false, FAST_MEM - 16 * 1024 ; "column sorted")]
#[test_case(ExecutionModel::ColumnParallel, false, false, false, FAST_MEM - 8 * 1024 ; "column scalar")]
#[test_case(ExecutionModel::ColumnParallel, true, false, true, FAST_MEM - 8 * 1024 ; "column deterministic")]
fn test_usable_fast_memory(
    execution_model: ExecutionModel,
    atomic_supported: bool,
    use_sort: bool,
    deterministic: bool,
    expected: u64,
) {
    let decision = StrategyDecision { execution_model, atomic_supported, use_sort, deterministic };
    let usable =
        usable_fast_memory(&decision, &PlatformProfile::vector_accelerator(), &PlannerConfig::default()).unwrap();
    assert_eq!(usable, expected);
}

#[test]
fn test_row_parallel_needs_data_cache() {
    let small = PlatformProfile::builder().unit_count(8).fast_mem_bytes(100 * 1024).build().unwrap();
    let inputs = scatter(&[1000, 8], &[500], ScalarDType::Float32, ScalarDType::Int32);

    assert_eq!(
        plan(&inputs, &small, false),
        Err(PlanError::InsufficientFastMemory { required: 128 * 1024 + 1, available: 100 * 1024 })
    );
}

#[test]
fn test_smaller_data_cache_reserve_fits_small_platform() {
    let small = PlatformProfile::builder().unit_count(8).fast_mem_bytes(100 * 1024).build().unwrap();
    let config = PlannerConfig::builder().row_cache_reserve(64 * 1024).build();
    let inputs = scatter(&[1000, 8], &[500], ScalarDType::Float32, ScalarDType::Int32);

    let encoded = ScatterAddPlanner::builder().platform(small).config(config).build().plan(&inputs, false).unwrap();
    assert_eq!(encoded.fast_mem_bytes(), 36 * 1024);
}

#[test]
fn test_degenerate_platform() {
    let err = PlatformProfile::builder().unit_count(0).fast_mem_bytes(1024).build().unwrap_err();
    assert_eq!(err, PlanError::DegenerateBudget { what: "unit count" });
}

#[test]
fn test_shape_errors_propagate() {
    let mut inputs = scatter(&[100, 16], &[8], ScalarDType::Float32, ScalarDType::Int32);
    inputs.updates.dims[1] = 15;
    assert!(matches!(planner().plan(&inputs, false), Err(PlanError::ShapeMismatch { .. })));
}

#[test]
fn test_oversized_shape_is_rejected() {
    let inputs = scatter(&[1 << 33, 1 << 33], &[1], ScalarDType::Float32, ScalarDType::Int32);
    assert!(matches!(planner().plan(&inputs, false), Err(PlanError::ShapeMismatch { .. })));
}

#[test]
fn test_single_unit_platform() {
    let single = PlatformProfile::builder().unit_count(1).fast_mem_bytes(FAST_MEM).build().unwrap();
    let encoded = plan(&scatter(&[1000, 4096], &[200], ScalarDType::Float32, ScalarDType::Int32), &single, false)
        .unwrap();
    assert_eq!(encoded.units_to_launch(), 1);
}

#[test]
fn test_planning_is_repeatable() {
    let planner = planner();
    let inputs = scatter(&[100, 1024], &[2000], ScalarDType::Float16, ScalarDType::Int64);
    let first = planner.plan(&inputs, false).unwrap();
    let second = planner.plan(&inputs, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.record.to_bytes(), second.record.to_bytes());
}

#[test]
fn test_custom_sort_scratch() {
    let generous = ScatterAddPlanner::builder()
        .platform(PlatformProfile::vector_accelerator())
        .config(PlannerConfig::default())
        .build();
    let stingy = generous.clone().with_scratch(|_: ScalarDType, count: u64| count * 64);

    let inputs = scatter(&[100, 4], &[100_000], ScalarDType::Float32, ScalarDType::Int32);
    let (Strategy::RowSorted(a), Strategy::RowSorted(b)) =
        (generous.plan(&inputs, false).unwrap().plan.strategy, stingy.plan(&inputs, false).unwrap().plan.strategy)
    else {
        panic!("expected row sorts");
    };
    assert!(b.memory.footprint <= b.memory.budget);
    assert_ne!(a, b);
}

#[test]
#[tracing_test::traced_test]
fn test_decisions_are_logged() {
    plan_f32(&[100, 4], &[100_000], false);
    assert!(logs_contain("Selected scatter-add strategy"));
    assert!(logs_contain("Planned row-parallel sort"));
}
