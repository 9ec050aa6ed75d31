use std::num::NonZeroU64;

use test_case::test_case;

use crate::factorize::{FactorProblem, Factorization, TieBreak, factorize};

fn problem(rows: u64, col_blocks: u64, target: u64, allow_col_split: bool, tie_break: TieBreak) -> FactorProblem {
    FactorProblem { rows, col_blocks, target: NonZeroU64::new(target).unwrap(), allow_col_split, tie_break }
}

#[test]
fn test_even_grid_returns_immediately() {
    let f = factorize(&problem(64, 4, 16, true, TieBreak::FewerRowSplits));
    assert_eq!(f, Factorization { row_splits: 4, col_splits: 4, waste: 0 });
}

#[test]
fn test_column_split_forbidden() {
    let f = factorize(&problem(100, 8, 10, false, TieBreak::FewerRowSplits));
    assert_eq!((f.row_splits, f.col_splits), (10, 1));
}

#[test]
fn test_columns_only_when_rows_are_scarce() {
    // Two rows cannot fill 54 units without cutting every row into 27 column blocks.
    let f = factorize(&problem(2, 27, 54, true, TieBreak::FewerRowSplits));
    assert_eq!(f, Factorization { row_splits: 2, col_splits: 27, waste: 0 });
}

// 5x5 over 4 units: 1x4, 2x2 and 4x1 all leave a waste of 5.
#[test_case(TieBreak::FewerRowSplits, (1, 4) ; "prefer fewer row splits")]
#[test_case(TieBreak::FewerColSplits, (4, 1) ; "prefer fewer column splits")]
fn test_tie_break(tie_break: TieBreak, expected: (u64, u64)) {
    let f = factorize(&problem(5, 5, 4, true, tie_break));
    assert_eq!((f.row_splits, f.col_splits), expected);
    assert_eq!(f.waste, 5);
}

#[test]
fn test_falls_back_to_single_tile() {
    let f = factorize(&problem(2, 1, 8, false, TieBreak::FewerRowSplits));
    assert_eq!((f.row_splits, f.col_splits), (1, 1));
}

#[test]
fn test_prefers_balanced_tail() {
    // 64 rows over 6 units: 6 row splits leave tiles of 11 and a tail of 9, 3x2 cannot
    // be used because only one column block exists.
    let f = factorize(&problem(64, 1, 6, true, TieBreak::FewerRowSplits));
    assert_eq!((f.row_splits, f.col_splits), (6, 1));
}
