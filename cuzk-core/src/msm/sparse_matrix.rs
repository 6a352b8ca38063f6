//! Per-subtask sparse matrices: rows are slices of the input points, columns are bucket
//! indices, and each stored entry is the pre-aggregated sum of a row's points that share a
//! bucket.

use std::collections::HashMap;
use std::ops::Range;

use rayon::prelude::*;

use super::config::ExecutionMode;
use super::group::AdditiveGroup;
use crate::utils::errors::MsmError;

/// Number of points each row holds (the last row may hold fewer).
pub fn row_capacity(num_points: usize, num_rows: usize) -> usize {
    num_points.div_ceil(num_rows.max(1))
}

/// Point indices that make up `row`; empty past the end of the input.
pub fn row_bounds(num_points: usize, num_rows: usize, row: usize) -> Range<usize> {
    let capacity = row_capacity(num_points, num_rows);
    let start = (row * capacity).min(num_points);
    let end = ((row + 1) * capacity).min(num_points);
    start..end
}

/// One row's points grouped by bucket. Clusters with two or more members come first, in
/// order of first appearance, then singletons in order of appearance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowClusters {
    /// Bucket index of each cluster.
    pub buckets: Vec<u32>,
    /// Positions (relative to the row start) of every clustered point, cluster after cluster.
    pub members: Vec<usize>,
    /// `members[boundaries[i]..boundaries[i + 1]]` is cluster `i`.
    pub boundaries: Vec<usize>,
}

impl RowClusters {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn cluster(&self, i: usize) -> &[usize] {
        &self.members[self.boundaries[i]..self.boundaries[i + 1]]
    }
}

/// Walks the row once, skipping bucket 0.
pub fn cluster_row(indices: &[u32]) -> RowClusters {
    let mut first_seen = Vec::new();
    let mut by_bucket: HashMap<u32, Vec<usize>> = HashMap::new();
    for (pos, &bucket) in indices.iter().enumerate() {
        if bucket == 0 {
            continue;
        }
        by_bucket
            .entry(bucket)
            .or_insert_with(|| {
                first_seen.push(bucket);
                Vec::new()
            })
            .push(pos);
    }

    let (multi, single): (Vec<u32>, Vec<u32>) = first_seen
        .into_iter()
        .partition(|bucket| by_bucket[bucket].len() > 1);

    let mut clusters = RowClusters {
        boundaries: vec![0],
        ..Default::default()
    };
    for bucket in multi.into_iter().chain(single) {
        clusters.members.extend_from_slice(&by_bucket[&bucket]);
        clusters.boundaries.push(clusters.members.len());
        clusters.buckets.push(bucket);
    }
    clusters
}

/// Folds each multi-point cluster into one element; singletons pass through unchanged.
/// Returns the row's entries and their bucket indices.
pub fn pre_aggregate<G: AdditiveGroup>(
    group: &G,
    row_points: &[G::Element],
    clusters: &RowClusters,
) -> (Vec<G::Element>, Vec<u32>) {
    let data = (0..clusters.len())
        .map(|i| match clusters.cluster(i) {
            [single] => row_points[*single].clone(),
            [first, rest @ ..] => rest.iter().fold(row_points[*first].clone(), |acc, &j| {
                group.add(&acc, &row_points[j])
            }),
            [] => group.identity(),
        })
        .collect();
    (data, clusters.buckets.clone())
}

/// Padded row-major layout: every row owns `row_capacity` slots and records how many it
/// used. This is what each row worker writes without touching its neighbours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EllMatrix<T> {
    pub num_rows: usize,
    pub num_columns: usize,
    pub row_capacity: usize,
    pub data: Vec<T>,
    pub col_idx: Vec<u32>,
    pub row_len: Vec<u32>,
}

impl<T: Clone> EllMatrix<T> {
    /// Compacts the padded rows into CSR.
    pub fn to_csr(&self) -> CsrMatrix<T> {
        let mut row_ptr = Vec::with_capacity(self.num_rows + 1);
        row_ptr.push(0u32);
        let mut data = Vec::new();
        let mut col_idx = Vec::new();
        for row in 0..self.num_rows {
            let start = row * self.row_capacity;
            let len = self.row_len[row] as usize;
            data.extend_from_slice(&self.data[start..start + len]);
            col_idx.extend_from_slice(&self.col_idx[start..start + len]);
            row_ptr.push(col_idx.len() as u32);
        }
        CsrMatrix {
            num_rows: self.num_rows,
            num_columns: self.num_columns,
            row_ptr,
            col_idx,
            data,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrMatrix<T> {
    pub num_rows: usize,
    pub num_columns: usize,
    pub row_ptr: Vec<u32>,
    pub col_idx: Vec<u32>,
    pub data: Vec<T>,
}

impl<T: Clone> CsrMatrix<T> {
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn row(&self, row: usize) -> Range<usize> {
        self.row_ptr[row] as usize..self.row_ptr[row + 1] as usize
    }

    /// Product with the all-ones vector on the left: one sum per column.
    pub fn column_sums<G: AdditiveGroup<Element = T>>(&self, group: &G) -> Vec<T> {
        let mut sums = vec![group.identity(); self.num_columns];
        for (col, value) in self.col_idx.iter().zip(&self.data) {
            let col = *col as usize;
            sums[col] = group.add(&sums[col], value);
        }
        sums
    }
}

/// Builds one CSR row from the points (and bucket indices) that belong to it.
pub fn build_row<G: AdditiveGroup>(
    group: &G,
    row_points: &[G::Element],
    row_indices: &[u32],
) -> (Vec<G::Element>, Vec<u32>) {
    let clusters = cluster_row(row_indices);
    pre_aggregate(group, row_points, &clusters)
}

/// Builds the matrix of one subtask. `indices` holds one bucket index per point.
#[tracing::instrument(skip_all, fields(n = points.len(), num_rows = num_rows))]
pub fn build_sparse_matrix<G: AdditiveGroup>(
    group: &G,
    points: &[G::Element],
    indices: &[u32],
    num_rows: usize,
    num_columns: usize,
    execution: ExecutionMode,
) -> Result<EllMatrix<G::Element>, MsmError> {
    if points.len() != indices.len() {
        return Err(MsmError::LengthMismatch(points.len(), indices.len()));
    }
    if let Some(&index) = indices.iter().find(|&&i| i as usize >= num_columns) {
        return Err(MsmError::BucketIndexOutOfRange { index, num_columns });
    }

    let n = points.len();
    let capacity = row_capacity(n, num_rows);
    let build = |row: usize| {
        let range = row_bounds(n, num_rows, row);
        build_row(group, &points[range.clone()], &indices[range])
    };
    let rows: Vec<_> = match execution {
        ExecutionMode::Serial => (0..num_rows).map(build).collect(),
        ExecutionMode::Parallel => (0..num_rows).into_par_iter().map(build).collect(),
    };

    let mut matrix = EllMatrix {
        num_rows,
        num_columns,
        row_capacity: capacity,
        data: vec![group.identity(); num_rows * capacity],
        col_idx: vec![0; num_rows * capacity],
        row_len: vec![0; num_rows],
    };
    for (row, (data, cols)) in rows.into_iter().enumerate() {
        let start = row * capacity;
        matrix.row_len[row] = cols.len() as u32;
        matrix.col_idx[start..start + cols.len()].copy_from_slice(&cols);
        for (slot, value) in matrix.data[start..].iter_mut().zip(data) {
            *slot = value;
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{CurveContext, CurveParams};
    use crate::msm::group::test_groups::{sorted, Concat, Integers};
    use num::BigUint;
    use rand::Rng;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn rows_partition_the_points() {
        for (n, rows) in [(8, 4), (10, 4), (3, 8), (0, 2), (17, 1)] {
            let covered: Vec<usize> = (0..rows).flat_map(|r| row_bounds(n, rows, r)).collect();
            assert_eq!(covered, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn clusters_put_multi_member_buckets_first() {
        let clusters = cluster_row(&[5, 2, 0, 5, 9, 2, 5, 3]);
        assert_eq!(clusters.buckets, vec![5, 2, 9, 3]);
        assert_eq!(clusters.cluster(0), &[0, 3, 6]);
        assert_eq!(clusters.cluster(1), &[1, 5]);
        assert_eq!(clusters.cluster(2), &[4]);
        assert_eq!(clusters.cluster(3), &[7]);
        assert_eq!(clusters.boundaries, vec![0, 3, 5, 6, 7]);
    }

    #[test]
    fn pre_aggregation_matches_naive_bucket_sums() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        for _ in 0..20 {
            let n = rng.gen_range(1..40);
            let num_columns = rng.gen_range(2..9);
            let num_rows = rng.gen_range(1..6);
            let labels: Vec<String> = (0..n)
                .map(|i| char::from(b'!' + i as u8).to_string())
                .collect();
            let indices: Vec<u32> = (0..n).map(|_| rng.gen_range(0..num_columns)).collect();

            let matrix = build_sparse_matrix(
                &Concat,
                &labels,
                &indices,
                num_rows,
                num_columns as usize,
                ExecutionMode::Parallel,
            )
            .unwrap();
            let csr = matrix.to_csr();

            // O(n^2) reference: for each (row, bucket), scan the whole row.
            for row in 0..num_rows {
                let range = row_bounds(n, num_rows, row);
                for bucket in 1..num_columns {
                    let expected: String = range
                        .clone()
                        .filter(|&i| indices[i] == bucket)
                        .map(|i| labels[i].clone())
                        .collect();
                    let stored: Vec<&String> = csr
                        .row(row)
                        .filter(|&e| csr.col_idx[e] == bucket)
                        .map(|e| &csr.data[e])
                        .collect();
                    assert!(stored.len() <= 1, "bucket {bucket} stored twice in row {row}");
                    let got = stored.first().map(|s| s.as_str()).unwrap_or("");
                    assert_eq!(sorted(got), sorted(&expected));
                }
            }
        }
    }

    #[test]
    fn serial_and_parallel_builds_agree() {
        let values: Vec<i128> = (1..=50).collect();
        let indices: Vec<u32> = values.iter().map(|v| (v * 7 % 11) as u32).collect();
        let serial =
            build_sparse_matrix(&Integers, &values, &indices, 6, 11, ExecutionMode::Serial)
                .unwrap();
        let parallel =
            build_sparse_matrix(&Integers, &values, &indices, 6, 11, ExecutionMode::Parallel)
                .unwrap();
        assert_eq!(serial, parallel);
        assert_eq!(serial.row_capacity, 9);
        assert!(serial.row_len.iter().all(|&len| len <= 9));
    }

    #[test]
    fn rejects_out_of_range_bucket() {
        assert_eq!(
            build_sparse_matrix(&Integers, &[1, 2], &[1, 4], 1, 4, ExecutionMode::Serial),
            Err(MsmError::BucketIndexOutOfRange {
                index: 4,
                num_columns: 4
            })
        );
        assert_eq!(
            build_sparse_matrix(&Integers, &[1, 2], &[1], 1, 4, ExecutionMode::Serial),
            Err(MsmError::LengthMismatch(2, 1))
        );
    }

    /// Eight copies of the generator with scalars [4, 0, 7, 3, 0, 3, 4, 3], one point per
    /// digit window, four rows.
    #[test]
    fn eight_generator_scenario() {
        let ctx = CurveContext::new(CurveParams::ed_on_bls12_377(), 13).unwrap();
        let curve = ctx.plain_curve();
        let g = curve.from_affine(&ctx.curve.generator);
        let points = vec![g.clone(); 8];
        let scalars = [4u32, 0, 7, 3, 0, 3, 4, 3];

        let matrix =
            build_sparse_matrix(&curve, &points, &scalars, 4, 8, ExecutionMode::Serial).unwrap();
        let sums = matrix.to_csr().column_sums(&curve);

        let times = |k: u32| curve.scalar_mul(&g, &BigUint::from(k));
        assert!(curve.eq_projective(&sums[4], &times(2)));
        assert!(curve.eq_projective(&sums[7], &times(1)));
        assert!(curve.eq_projective(&sums[3], &times(3)));
        for empty in [0, 1, 2, 5, 6] {
            assert!(curve.is_identity(&sums[empty]));
        }
    }
}
