use test_case::test_case;
use tilecraft_dtype::ScalarDType;

use crate::config::PlannerConfig;
use crate::strategy::{ExecutionModel, IndexCast, StrategyDecision};
use crate::test::helpers::descriptor;

fn select(rows: u64, cols: u64, indices: u64, dtype: ScalarDType, deterministic: bool) -> StrategyDecision {
    StrategyDecision::select(&descriptor(rows, cols, indices, dtype), &PlannerConfig::default(), deterministic)
}

#[test_case(31, ScalarDType::Float32, ExecutionModel::RowParallel ; "124 byte rows")]
#[test_case(32, ScalarDType::Float32, ExecutionModel::ColumnParallel ; "128 byte rows")]
#[test_case(127, ScalarDType::Int8, ExecutionModel::RowParallel ; "127 byte rows")]
#[test_case(64, ScalarDType::BFloat16, ExecutionModel::ColumnParallel ; "bf16 128 byte rows")]
fn test_execution_model(cols: u64, dtype: ScalarDType, expected: ExecutionModel) {
    assert_eq!(select(100, cols, 10, dtype, false).execution_model, expected);
}

#[test_case(8, ScalarDType::Int8, false ; "row parallel int8")]
#[test_case(8, ScalarDType::UInt8, false ; "row parallel uint8")]
#[test_case(8, ScalarDType::Int32, true ; "row parallel int32")]
#[test_case(256, ScalarDType::Int8, true ; "column parallel int8")]
#[test_case(256, ScalarDType::UInt8, false ; "column parallel uint8")]
#[test_case(256, ScalarDType::Float16, true ; "column parallel f16")]
fn test_atomic_support(cols: u64, dtype: ScalarDType, expected: bool) {
    assert_eq!(select(100, cols, 10, dtype, false).atomic_supported, expected);
}

#[test_case(100, 64, 1000, false ; "ratio exactly ten")]
#[test_case(100, 64, 1001, true ; "ratio just above ten")]
#[test_case(100, 100_000, 300, false ; "wide rows ratio exactly three")]
#[test_case(100, 100_000, 301, true ; "wide rows ratio just above three")]
#[test_case(100, 99_999, 301, false ; "just below wide row threshold")]
#[test_case(13, 100_000, 128, false ; "too few indices for lowered ratio")]
#[test_case(1000, 100_000, 2000, false ; "wide rows ratio two")]
#[test_case(1000, 100_000, 3000, false ; "wide rows ratio three")]
#[test_case(1000, 100_000, 4000, true ; "wide rows ratio four")]
#[test_case(1000, 100_000, 50_000, true ; "wide rows ratio fifty")]
#[test_case(1000, 64, 4000, false ; "narrow rows ratio four")]
fn test_sort_threshold(rows: u64, cols: u64, indices: u64, expected: bool) {
    assert_eq!(select(rows, cols, indices, ScalarDType::Float32, false).use_sort, expected);
}

#[test]
fn test_thin_rows_with_many_indices_sort() {
    let decision = select(1000, 8, 50_000, ScalarDType::Float32, false);
    assert_eq!(decision.execution_model, ExecutionModel::RowParallel);
    assert!(decision.use_sort);
    assert!(!decision.deterministic);
}

#[test]
fn test_no_sort_without_atomics() {
    let decision = select(10, 8, 1_000_000, ScalarDType::UInt8, false);
    assert!(!decision.atomic_supported);
    assert!(!decision.use_sort);
}

#[test_case(ScalarDType::Float32, true ; "f32")]
#[test_case(ScalarDType::Float16, true ; "f16")]
#[test_case(ScalarDType::BFloat16, true ; "bf16")]
#[test_case(ScalarDType::Int32, false ; "i32")]
#[test_case(ScalarDType::Int8, false ; "i8")]
fn test_deterministic_only_for_floats(dtype: ScalarDType, expected: bool) {
    let decision = select(10, 8, 100_000, dtype, true);
    assert_eq!(decision.deterministic, expected);
    if decision.deterministic {
        assert!(!decision.use_sort);
    }
}

#[test]
fn test_deterministic_not_requested() {
    let decision = select(10, 8, 100_000, ScalarDType::Float32, false);
    assert!(!decision.deterministic);
    assert!(decision.use_sort);
}

#[test]
fn test_scalar_updates_are_never_deterministic() {
    let mut shape = descriptor(10, 8, 100, ScalarDType::Float32);
    shape.update_is_scalar = true;
    shape.updates_count = 1;
    assert!(!StrategyDecision::select(&shape, &PlannerConfig::default(), true).deterministic);
}

#[test]
fn test_config_moves_sort_threshold() {
    let config = PlannerConfig::builder().sort_ratio(20).build();
    let shape = descriptor(100, 64, 1500, ScalarDType::Float32);
    assert!(StrategyDecision::select(&shape, &PlannerConfig::default(), false).use_sort);
    assert!(!StrategyDecision::select(&shape, &config, false).use_sort);
}

#[test_case(ScalarDType::Int32, 254, Some(ScalarDType::UInt8), 4 ; "i32 to u8")]
#[test_case(ScalarDType::Int32, 255, Some(ScalarDType::Int16), 1 ; "i32 to i16 at u8 max")]
#[test_case(ScalarDType::Int32, 32_767, None, 0 ; "i32 kept at i16 max")]
#[test_case(ScalarDType::Int64, 10, Some(ScalarDType::UInt8), 5 ; "i64 to u8")]
#[test_case(ScalarDType::Int64, 1000, Some(ScalarDType::Int16), 3 ; "i64 to i16")]
#[test_case(ScalarDType::Int64, 40_000, Some(ScalarDType::Int32), 2 ; "i64 to i32")]
#[test_case(ScalarDType::Int64, i32::MAX as u64, None, 0 ; "i64 kept at i32 max")]
fn test_index_cast(indices: ScalarDType, rows: u64, target: Option<ScalarDType>, mode: u64) {
    let mut shape = descriptor(rows, 16, 10, ScalarDType::Float32);
    shape.indices_dtype = indices;

    let cast = IndexCast::for_shape(&shape);
    assert_eq!(cast.target, target);
    assert_eq!(cast.mode(), mode);
    assert_eq!(cast.key_dtype(), target.unwrap_or(indices));
    assert_eq!(cast.target_bytes(), target.map_or(0, |t| t.bytes()));
}

#[test]
fn test_deterministic_dtypes_are_the_supported_floats() {
    assert_eq!(crate::strategy::DETERMINISTIC_DTYPES, crate::shape::VAR_DTYPES & tilecraft_dtype::FLOATS);
}
