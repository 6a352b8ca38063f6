use num::BigUint;
use rand_core::RngCore;

use crate::curve::{AffinePoint, CurveContext};

/// Uniform integer with at most `bits` bits.
pub fn random_biguint(rng: &mut impl RngCore, bits: usize) -> BigUint {
    let num_bytes = bits.div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];
    rng.fill_bytes(&mut bytes);
    BigUint::from_bytes_le(&bytes) >> (num_bytes * 8 - bits)
}

/// Integer in [0, modulus) by rejection sampling.
pub fn random_field_element(rng: &mut impl RngCore, modulus: &BigUint) -> BigUint {
    let bits = modulus.bits() as usize;
    loop {
        let candidate = random_biguint(rng, bits);
        if &candidate < modulus {
            return candidate;
        }
    }
}

/// Scalars uniformly below the curve's prime-order subgroup size.
pub fn random_scalars(rng: &mut impl RngCore, ctx: &CurveContext, n: usize) -> Vec<BigUint> {
    (0..n)
        .map(|_| random_field_element(rng, &ctx.curve.scalar_modulus))
        .collect()
}

/// `n` distinct points `start·G, (start+1)·G, ...` for a random `start`.
///
/// Walking the generator's multiples costs one addition per point, which keeps instance
/// generation cheap compared with one scalar multiplication per point.
#[tracing::instrument(skip_all, fields(n = n))]
pub fn random_points(rng: &mut impl RngCore, ctx: &CurveContext, n: usize) -> Vec<AffinePoint> {
    let curve = ctx.plain_curve();
    let generator = curve.from_affine(&ctx.curve.generator);
    let start = random_biguint(rng, 64);
    let mut acc = curve.scalar_mul(&generator, &start);
    let mut points = Vec::with_capacity(n);
    for _ in 0..n {
        acc = curve.add(&acc, &generator);
        points.push(curve.to_affine(&acc));
    }
    debug_assert!(points.iter().all(|p| ctx.is_on_curve(p)));
    points
}
