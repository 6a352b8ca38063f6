use rayon::prelude::*;

use super::config::ReductionStrategy;
use super::group::AdditiveGroup;

/// Running sum over a contiguous run of buckets from the top down.
///
/// Returns `(m, g)` where `m = Σ block[j]` and `g = Σ (j + 1) · block[j]`, using two
/// additions per bucket.
pub fn running_sum_block<G: AdditiveGroup>(
    group: &G,
    block: &[G::Element],
) -> (G::Element, G::Element) {
    let mut m = group.identity();
    let mut g = group.identity();
    for bucket in block.iter().rev() {
        m = group.add(&m, bucket);
        g = group.add(&g, &m);
    }
    (m, g)
}

/// Σ i · bucket[i] for i in 1..len. Slot 0 is ignored.
#[tracing::instrument(skip_all, fields(num_buckets = buckets.len()))]
pub fn running_sum<G: AdditiveGroup>(group: &G, buckets: &[G::Element]) -> G::Element {
    match buckets {
        [] => group.identity(),
        [_, rest @ ..] => running_sum_block(group, rest).1,
    }
}

/// Bucket range of block `t` when `num_buckets` real buckets (1-based) are split into
/// `num_blocks` contiguous blocks of `ceil(num_buckets / num_blocks)`; `None` for blocks
/// that fall entirely past the end.
pub fn block_bounds(num_buckets: usize, num_blocks: usize, t: usize) -> Option<(usize, usize)> {
    let size = num_buckets.div_ceil(num_blocks.max(1));
    let lo = 1 + t * size;
    let hi = ((t + 1) * size).min(num_buckets);
    (size > 0 && lo <= hi).then_some((lo, hi))
}

/// Contribution of the block holding buckets `lo..lo + block.len()`: its local grand total
/// plus `(lo - 1) · m`, the weight every bucket in the block inherits from the blocks below.
pub fn reduce_block<G: AdditiveGroup>(group: &G, block: &[G::Element], lo: usize) -> G::Element {
    let (m, g) = running_sum_block(group, block);
    group.add(&g, &group.mul_u64(&m, (lo - 1) as u64))
}

/// Same result as [`running_sum`], with blocks reduced independently on the rayon pool.
#[tracing::instrument(skip_all, fields(num_buckets = buckets.len(), num_blocks = num_blocks))]
pub fn parallel_running_sum<G: AdditiveGroup>(
    group: &G,
    buckets: &[G::Element],
    num_blocks: usize,
) -> G::Element {
    let num_buckets = buckets.len().saturating_sub(1);
    let partials: Vec<G::Element> = (0..num_blocks)
        .into_par_iter()
        .filter_map(|t| block_bounds(num_buckets, num_blocks, t))
        .map(|(lo, hi)| reduce_block(group, &buckets[lo..=hi], lo))
        .collect();
    group.sum(&partials)
}

/// Reference Σ i · bucket[i] with one scalar multiplication per bucket.
pub fn naive_reduce<G: AdditiveGroup>(group: &G, buckets: &[G::Element]) -> G::Element {
    buckets
        .iter()
        .enumerate()
        .skip(1)
        .fold(group.identity(), |acc, (i, bucket)| {
            group.add(&acc, &group.mul_u64(bucket, i as u64))
        })
}

pub fn reduce_buckets<G: AdditiveGroup>(
    group: &G,
    buckets: &[G::Element],
    strategy: ReductionStrategy,
) -> G::Element {
    match strategy {
        ReductionStrategy::RunningSum => running_sum(group, buckets),
        ReductionStrategy::Parallel { num_blocks } => {
            parallel_running_sum(group, buckets, num_blocks)
        }
    }
}

/// Horner's rule in base 2^c over per-window sums, least significant window first.
#[tracing::instrument(skip_all, fields(num_subtasks = window_sums.len()))]
pub fn horner<G: AdditiveGroup>(group: &G, window_sums: &[G::Element], chunk_size: usize) -> G::Element {
    match window_sums.split_last() {
        None => group.identity(),
        Some((top, rest)) => rest.iter().rev().fold(top.clone(), |acc, sum| {
            group.add(&group.mul_pow2(&acc, chunk_size), sum)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{CurveContext, CurveParams};
    use crate::msm::group::test_groups::Integers;
    use num::BigUint;
    use rand::Rng;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn blocks_cover_every_bucket_once() {
        for num_buckets in [0usize, 1, 7, 8, 9, 100, 129] {
            for num_blocks in [1usize, 2, 3, 8, 16, 200] {
                let covered: Vec<usize> = (0..num_blocks)
                    .filter_map(|t| block_bounds(num_buckets, num_blocks, t))
                    .flat_map(|(lo, hi)| lo..=hi)
                    .collect();
                assert_eq!(covered, (1..=num_buckets).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn reductions_agree_over_integers() {
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        for _ in 0..50 {
            let len = rng.gen_range(0..300);
            let buckets: Vec<i128> = (0..len).map(|_| rng.gen_range(-1000..1000)).collect();
            let expected: i128 = buckets
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, b)| i as i128 * b)
                .sum();
            assert_eq!(naive_reduce(&Integers, &buckets), expected);
            assert_eq!(running_sum(&Integers, &buckets), expected);
            for num_blocks in [1, 2, 5, 16, 400] {
                assert_eq!(parallel_running_sum(&Integers, &buckets, num_blocks), expected);
            }
        }
    }

    #[test]
    fn reductions_agree_over_curve_points() {
        let ctx = CurveContext::new(CurveParams::ed_on_bls12_377(), 13).unwrap();
        let curve = ctx.mont_curve();
        let g = curve.from_affine(&ctx.curve.generator);
        let mut rng = ChaCha20Rng::seed_from_u64(34);
        let mut buckets: Vec<_> = (0..33)
            .map(|_| curve.scalar_mul(&g, &BigUint::from(rng.gen::<u32>())))
            .collect();
        buckets[5] = curve.identity();

        let naive = naive_reduce(&curve, &buckets);
        assert!(curve.eq_projective(&running_sum(&curve, &buckets), &naive));
        for num_blocks in [3, 4, 32] {
            let parallel =
                reduce_buckets(&curve, &buckets, ReductionStrategy::Parallel { num_blocks });
            assert!(curve.eq_projective(&parallel, &naive));
        }

        let all_identity = vec![curve.identity(); 17];
        assert!(curve.is_identity(&running_sum(&curve, &all_identity)));
        assert!(curve.is_identity(&parallel_running_sum(&curve, &all_identity, 4)));
    }

    #[test]
    fn horner_combines_windows() {
        assert_eq!(horner(&Integers, &[], 4), 0);
        assert_eq!(horner(&Integers, &[7], 4), 7);
        // 3 + 5·16 + 2·256
        assert_eq!(horner(&Integers, &[3, 5, 2], 4), 3 + 5 * 16 + 2 * 256);
        assert_eq!(horner(&Integers, &[-1, 1], 3), 7);
    }
}
