use tilecraft_dtype::ScalarDType;

use crate::encode::KernelVariant;
use crate::plan::{DequantizeBranch, DeterministicTiling, Loop, Split, Strategy};
use crate::test::helpers::{RESERVED_KEY, plan_f32, planner, scatter};

#[test]
fn test_few_indices_partition_columns() {
    let encoded = plan_f32(&[100, 64], &[50], true);

    let Strategy::Deterministic(DeterministicTiling::Column(tiling)) = encoded.plan.strategy else {
        panic!("expected a column partition, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.cols, Split { total: 64, per_unit: 1, units: 64, tail: 1 });
    assert_eq!(tiling.updates_loop.factor, 8);
    assert_eq!(tiling.indices_loop, Loop { extent: 50, factor: 61432, count: 1, tail: 50 });

    assert_eq!(encoded.variant, KernelVariant::DeterministicColumn);
    assert_eq!(encoded.units_to_launch(), 64);
    assert_eq!(encoded.tiling_key(), RESERVED_KEY + 10);
    assert_eq!(encoded.record.is_determin_template, 1);
    assert_eq!(encoded.record.is_deterministic, 0);
    assert_eq!(encoded.record.logic_core_num, 64);
}

#[test]
fn test_wide_rows_partition_columns() {
    let encoded = plan_f32(&[100, 1024], &[10_000], true);
    assert_eq!(encoded.variant, KernelVariant::DeterministicColumn);
}

#[test]
fn test_sorted_dequantize_by_row() {
    let encoded = plan_f32(&[1000, 16], &[8192], true);

    let Strategy::Deterministic(DeterministicTiling::Sorted(tiling)) = encoded.plan.strategy else {
        panic!("expected a sorted plan, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.indices, Split { total: 8192, per_unit: 128, units: 64, tail: 128 });
    assert_eq!(tiling.unit_loop.factor, 128);
    assert_eq!(tiling.dequantize.branch, DequantizeBranch::ByRow);
    assert_eq!(tiling.dequantize.rows, Split { total: 1000, per_unit: 16, units: 63, tail: 8 });
    assert_eq!(tiling.dequantize.rows_in_ub, 16);
    assert!(tiling.memory.budget <= encoded.fast_mem_bytes() / 2);

    assert_eq!(encoded.fast_mem_bytes(), 122_880);
    assert_eq!(encoded.workspace_bytes(), 17_466_272);
    assert_eq!(encoded.tiling_key(), RESERVED_KEY);
    assert_eq!(encoded.units_to_launch(), 64);

    let record = encoded.record;
    assert_eq!(record.is_deterministic, 1);
    assert_eq!(record.is_determin_template, 1);
    assert_eq!(record.dequantize_branch, 0);
    assert_eq!(record.updates_ub_factor, 16);
    assert_eq!(record.dequantize_core_num, 63);
}

#[test]
fn test_sorted_dequantize_by_index() {
    let encoded = plan_f32(&[10_000, 16], &[8192], true);

    let Strategy::Deterministic(DeterministicTiling::Sorted(tiling)) = encoded.plan.strategy else {
        panic!("expected a sorted plan, got {:?}", encoded.plan.strategy);
    };
    assert_eq!(tiling.dequantize.branch, DequantizeBranch::ByIndex);
    assert_eq!(tiling.dequantize.rows, tiling.indices);
    assert_eq!(tiling.dequantize.rows_in_ub, 128);
    assert_eq!(encoded.record.dequantize_core_num, 64);
    assert_eq!(encoded.record.dequantize_branch, 1);
}

#[test]
fn test_integer_var_ignores_determinism_request() {
    let inputs = scatter(&[1000, 8], &[500], ScalarDType::Int32, ScalarDType::Int32);
    let encoded = planner().plan(&inputs, true).unwrap();

    assert_eq!(encoded.variant, KernelVariant::RowAtomic);
    assert_eq!(encoded.decision().map(|d| d.deterministic), Some(false));
    assert_eq!(encoded.record.is_determin_template, 0);
}

#[test]
fn test_deterministic_plans_repeat() {
    let first = plan_f32(&[1000, 16], &[8192], true);
    let second = plan_f32(&[1000, 16], &[8192], true);
    assert_eq!(first.record.to_words(), second.record.to_words());
}
