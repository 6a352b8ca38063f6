//! Per-invocation bodies of every stage. An invocation reads any input word it likes and
//! writes only the output slots it was handed.

use super::shader::{KernelKind, KernelParams};
use super::wire::{read_point_at, write_point};
use crate::curve::{EdwardsCurve, ExtendedPoint};
use crate::field::{FieldElement, MontgomeryField};
use crate::msm::decompose::scalar_bucket_indices;
use crate::msm::reduce::{block_bounds, horner, reduce_block};
use crate::msm::smvp::fold_bucket;
use crate::msm::sparse_matrix::{build_row, row_bounds};
use crate::msm::transpose::transpose_indices;

/// State shared read-only by all invocations of one dispatch.
pub struct KernelEnv<'a> {
    pub params: &'a KernelParams,
    pub curve: EdwardsCurve<MontgomeryField<'a>>,
}

impl<'a> KernelEnv<'a> {
    pub fn new(params: &'a KernelParams) -> Self {
        Self {
            params,
            curve: params.ctx.mont_curve_with(params.variant),
        }
    }

    fn point(&self, words: &[u32], index: usize) -> ExtendedPoint {
        read_point_at(words, self.params.num_words(), index)
    }

    fn sum_points(&self, words: &[u32], range: std::ops::Range<usize>) -> ExtendedPoint {
        range.fold(self.curve.identity(), |acc, i| {
            self.curve.add(&acc, &self.point(words, i))
        })
    }
}

/// Runs invocation `id` of `kind`. `outputs` holds this invocation's slot of every write
/// binding, in layout order.
pub fn run(
    kind: KernelKind,
    env: &KernelEnv<'_>,
    id: usize,
    inputs: &[&[u32]],
    outputs: &mut [&mut [u32]],
) {
    match kind {
        KernelKind::ConvertPoints => convert_points(env, id, inputs, outputs),
        KernelKind::DecomposeScalars => decompose_scalars(env, id, inputs, outputs),
        KernelKind::BuildSparseMatrix => build_sparse_matrix(env, id, inputs, outputs),
        KernelKind::Transpose => transpose(env, id, inputs, outputs),
        KernelKind::Smvp => smvp(env, id, inputs, outputs),
        KernelKind::BucketReduction => bucket_reduction(env, id, inputs, outputs),
        KernelKind::ReduceBlocks => reduce_blocks(env, id, inputs, outputs),
        KernelKind::Horner => horner_stage(env, inputs, outputs),
    }
}

/// Standard-form coordinates to Montgomery form.
fn convert_points(env: &KernelEnv, id: usize, inputs: &[&[u32]], outputs: &mut [&mut [u32]]) {
    let nw = env.params.num_words();
    let pw = env.params.point_words();
    let field = env.curve.field();
    let src = &inputs[0][id * pw..(id + 1) * pw];
    for (coord, out) in src.chunks(nw).zip(outputs[0].chunks_mut(nw)) {
        let mont = field.to_montgomery(&FieldElement(coord.to_vec()));
        out.copy_from_slice(&mont.0);
    }
}

/// Writes the scalar's bucket index for every subtask, or raises its carry flag.
fn decompose_scalars(env: &KernelEnv, id: usize, inputs: &[&[u32]], outputs: &mut [&mut [u32]]) {
    let sw = env.params.scalar_words();
    let words = &inputs[0][id * sw..(id + 1) * sw];
    let [digits, flag] = outputs else {
        unreachable!("layout checked at dispatch")
    };
    match scalar_bucket_indices(words, &env.params.config) {
        Some(indices) => {
            digits.copy_from_slice(&indices);
            flag[0] = 0;
        }
        None => {
            digits.fill(0);
            flag[0] = 1;
        }
    }
}

/// One row of one subtask, clustered and pre-aggregated, written as a padded ELL row.
fn build_sparse_matrix(
    env: &KernelEnv,
    id: usize,
    inputs: &[&[u32]],
    outputs: &mut [&mut [u32]],
) {
    let params = env.params;
    let num_rows = params.config.num_rows;
    let k = params.config.num_subtasks;
    let (subtask, row) = (id / num_rows, id % num_rows);
    let range = row_bounds(params.num_points, num_rows, row);

    let points: Vec<_> = range.clone().map(|i| env.point(inputs[0], i)).collect();
    let indices: Vec<u32> = range.map(|i| inputs[1][i * k + subtask]).collect();
    let (data, cols) = build_row(&env.curve, &points, &indices);

    let [ell_data, ell_col, ell_len] = outputs else {
        unreachable!("layout checked at dispatch")
    };
    let pw = params.point_words();
    for (slot, (point, col)) in data.iter().zip(&cols).enumerate() {
        write_point(point, &mut ell_data[slot * pw..(slot + 1) * pw]);
        ell_col[slot] = *col;
    }
    ell_len[0] = cols.len() as u32;
}

/// Counting-sort transpose of one subtask's ELL rows into CSC, copying the points along.
fn transpose(env: &KernelEnv, id: usize, inputs: &[&[u32]], outputs: &mut [&mut [u32]]) {
    let params = env.params;
    let num_rows = params.config.num_rows;
    let cap = params.row_capacity();
    let pw = params.point_words();
    let base = id * params.slots_per_subtask();
    let (ell_col, ell_len, ell_data) = (inputs[0], inputs[1], inputs[2]);

    let mut row_ptr = vec![0u32];
    let mut col_idx = Vec::new();
    let mut slot_of = Vec::new();
    for row in 0..num_rows {
        let len = ell_len[id * num_rows + row] as usize;
        for j in 0..len {
            let slot = base + row * cap + j;
            col_idx.push(ell_col[slot]);
            slot_of.push(slot);
        }
        row_ptr.push(col_idx.len() as u32);
    }
    let t = transpose_indices(params.config.num_columns(), &row_ptr, &col_idx);

    let [col_ptr, row_idx, data] = outputs else {
        unreachable!("layout checked at dispatch")
    };
    col_ptr.copy_from_slice(&t.col_ptr);
    for (k, &entry) in t.source.iter().enumerate() {
        let slot = slot_of[entry as usize];
        row_idx[k] = t.row_idx[k];
        data[k * pw..(k + 1) * pw].copy_from_slice(&ell_data[slot * pw..(slot + 1) * pw]);
    }
}

/// Bucket `v` of one subtask from the CSC columns it folds.
fn smvp(env: &KernelEnv, id: usize, inputs: &[&[u32]], outputs: &mut [&mut [u32]]) {
    let config = &env.params.config;
    let num_buckets = config.num_buckets();
    let num_columns = config.num_columns();
    let (subtask, v) = (id / num_buckets, id % num_buckets);
    let col_ptr = &inputs[0][subtask * (num_columns + 1)..(subtask + 1) * (num_columns + 1)];
    let slots = env.params.slots_per_subtask();
    let pw = env.params.point_words();
    let data = &inputs[1][subtask * slots * pw..(subtask + 1) * slots * pw];

    let bucket = fold_bucket(&env.curve, config.encoding, num_columns, v, |col| {
        env.sum_points(data, col_ptr[col] as usize..col_ptr[col + 1] as usize)
    });
    write_point(&bucket, &mut outputs[0]);
}

/// Running sum of one block of one subtask's buckets, weighted by its offset.
fn bucket_reduction(env: &KernelEnv, id: usize, inputs: &[&[u32]], outputs: &mut [&mut [u32]]) {
    let num_blocks = env.params.num_blocks();
    let num_buckets = env.params.config.num_buckets();
    let (subtask, t) = (id / num_blocks, id % num_blocks);
    let partial = match block_bounds(num_buckets - 1, num_blocks, t) {
        None => env.curve.identity(),
        Some((lo, hi)) => {
            let block: Vec<_> = (lo..=hi)
                .map(|i| env.point(inputs[0], subtask * num_buckets + i))
                .collect();
            reduce_block(&env.curve, &block, lo)
        }
    };
    write_point(&partial, &mut outputs[0]);
}

fn reduce_blocks(env: &KernelEnv, id: usize, inputs: &[&[u32]], outputs: &mut [&mut [u32]]) {
    let num_blocks = env.params.num_blocks();
    let sum = env.sum_points(inputs[0], id * num_blocks..(id + 1) * num_blocks);
    write_point(&sum, &mut outputs[0]);
}

fn horner_stage(env: &KernelEnv, inputs: &[&[u32]], outputs: &mut [&mut [u32]]) {
    let sums: Vec<_> = (0..env.params.config.num_subtasks)
        .map(|s| env.point(inputs[0], s))
        .collect();
    let result = horner(&env.curve, &sums, env.params.config.chunk_size);
    write_point(&result, &mut outputs[0]);
}
