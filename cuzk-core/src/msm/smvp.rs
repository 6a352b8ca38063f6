use rayon::prelude::*;

use super::config::{DigitEncoding, ExecutionMode};
use super::group::InvertibleGroup;
use super::transpose::CscMatrix;

pub fn column_sum<G: InvertibleGroup>(
    group: &G,
    csc: &CscMatrix<G::Element>,
    col: usize,
) -> G::Element {
    group.sum(csc.column(col))
}

/// Bucket `v` of a subtask from its column sums.
///
/// With signed digits the columns `h + v` and `h - v` hold the points whose digit is `+v`
/// and `-v`, where `h` is the index shift. Since `-v · P = v · (-P)`, both land in bucket `v`
/// once the negative side is negated.
pub fn fold_bucket<G: InvertibleGroup>(
    group: &G,
    encoding: DigitEncoding,
    num_columns: usize,
    v: usize,
    column_sum: impl Fn(usize) -> G::Element,
) -> G::Element {
    if v == 0 {
        return group.identity();
    }
    match encoding {
        DigitEncoding::Unsigned => column_sum(v),
        DigitEncoding::Signed => {
            let h = num_columns / 2;
            group.sub(&column_sum(h + v), &column_sum(h - v))
        }
    }
}

pub fn bucket_value<G: InvertibleGroup>(
    group: &G,
    csc: &CscMatrix<G::Element>,
    encoding: DigitEncoding,
    v: usize,
) -> G::Element {
    fold_bucket(group, encoding, csc.num_columns, v, |col| {
        column_sum(group, csc, col)
    })
}

/// Number of real buckets (excluding slot 0) a matrix with `num_columns` columns folds into.
pub fn num_buckets(num_columns: usize, encoding: DigitEncoding) -> usize {
    match encoding {
        DigitEncoding::Unsigned => num_columns.saturating_sub(1),
        DigitEncoding::Signed => num_columns / 2,
    }
}

/// Sparse matrix-vector product of one subtask: every bucket accumulated independently.
/// Slot 0 of the result is the identity.
#[tracing::instrument(skip_all)]
pub fn smvp<G: InvertibleGroup>(
    group: &G,
    csc: &CscMatrix<G::Element>,
    encoding: DigitEncoding,
    execution: ExecutionMode,
) -> Vec<G::Element> {
    let count = num_buckets(csc.num_columns, encoding);
    let bucket = |v: usize| bucket_value(group, csc, encoding, v);
    match execution {
        ExecutionMode::Serial => (0..=count).map(bucket).collect(),
        ExecutionMode::Parallel => (0..=count).into_par_iter().map(bucket).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msm::config::MsmConfig;
    use crate::msm::decompose::decompose_scalars;
    use crate::msm::group::test_groups::Integers;
    use crate::msm::sparse_matrix::build_sparse_matrix;
    use crate::msm::transpose::transpose;
    use num::BigUint;
    use rand::Rng;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    /// Over the integers, bucket v of subtask j must equal the sum of the points whose j-th
    /// digit is v, for the unsigned digits and for the signed ones.
    #[test]
    fn buckets_hold_points_by_digit_value() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        for encoding in [DigitEncoding::Signed, DigitEncoding::Unsigned] {
            let config = MsmConfig::new(4)
                .with_encoding(encoding)
                .with_scalar_bits(16)
                .with_num_rows(3);
            let scalars: Vec<BigUint> = (0..30).map(|_| BigUint::from(rng.gen::<u16>())).collect();
            let points: Vec<i128> = (0..30).map(|_| rng.gen_range(1..1000)).collect();
            let digits = decompose_scalars(&scalars, &config).unwrap();

            for subtask in 0..config.num_subtasks {
                let indices = digits.subtask(subtask);
                let matrix = build_sparse_matrix(
                    &Integers,
                    &points,
                    indices,
                    config.num_rows,
                    config.num_columns(),
                    ExecutionMode::Serial,
                )
                .unwrap();
                let csc = transpose(&matrix.to_csr());
                let buckets = smvp(&Integers, &csc, encoding, ExecutionMode::Parallel);
                assert_eq!(buckets.len(), config.num_buckets());

                let shift = config.index_shift() as i64;
                let mut expected = vec![0i128; buckets.len()];
                for (point, &index) in points.iter().zip(indices) {
                    let digit = index as i64 - shift;
                    if digit != 0 {
                        expected[digit.unsigned_abs() as usize] += point * digit.signum() as i128;
                    }
                }
                assert_eq!(buckets, expected, "{encoding:?} subtask {subtask}");
            }
        }
    }

    #[test]
    fn serial_and_parallel_agree() {
        let csc = CscMatrix {
            num_rows: 1,
            num_columns: 9,
            col_ptr: vec![0, 0, 1, 2, 2, 4, 4, 5, 6, 7],
            row_idx: vec![0; 7],
            data: vec![3i128, 5, 7, 11, 13, 17, 19],
        };
        let serial = smvp(&Integers, &csc, DigitEncoding::Signed, ExecutionMode::Serial);
        let parallel = smvp(&Integers, &csc, DigitEncoding::Signed, ExecutionMode::Parallel);
        assert_eq!(serial, parallel);
        // h = 4: bucket v = col(4 + v) - col(4 - v); column 4 (digit 0) is never read.
        assert_eq!(serial, vec![0, 0, 13 - 5, 17 - 3, 19]);
    }
}
