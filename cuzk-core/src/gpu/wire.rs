//! Host <-> device word layout.
//!
//! A field element is `num_words` u32 words, one limb per word with the payload in the low
//! bits. A point is x, y, t, z concatenated. Scalars are fixed-width little-endian u32 words.

use num::BigUint;

use crate::curve::{AffinePoint, ExtendedPoint};
use crate::field::limbs::to_limbs;
use crate::field::{FieldElement, FieldParams};
use crate::utils::errors::MsmError;

pub fn write_point(point: &ExtendedPoint, out: &mut [u32]) {
    let n = point.x.0.len();
    debug_assert_eq!(out.len(), 4 * n);
    for (coord, chunk) in [&point.x, &point.y, &point.t, &point.z]
        .into_iter()
        .zip(out.chunks_mut(n))
    {
        chunk.copy_from_slice(&coord.0);
    }
}

pub fn read_point(words: &[u32], num_words: usize) -> ExtendedPoint {
    debug_assert_eq!(words.len(), 4 * num_words);
    let coord = |i: usize| FieldElement(words[i * num_words..(i + 1) * num_words].to_vec());
    ExtendedPoint {
        x: coord(0),
        y: coord(1),
        t: coord(2),
        z: coord(3),
    }
}

/// Point `index` of a buffer holding consecutive serialized points.
pub fn read_point_at(words: &[u32], num_words: usize, index: usize) -> ExtendedPoint {
    let pw = 4 * num_words;
    read_point(&words[index * pw..(index + 1) * pw], num_words)
}

pub fn points_to_words(points: &[ExtendedPoint], num_words: usize) -> Vec<u32> {
    let mut out = vec![0u32; points.len() * 4 * num_words];
    for (point, chunk) in points.iter().zip(out.chunks_mut(4 * num_words)) {
        write_point(point, chunk);
    }
    out
}

pub fn points_from_words(words: &[u32], num_words: usize) -> Vec<ExtendedPoint> {
    words
        .chunks(4 * num_words)
        .map(|chunk| read_point(chunk, num_words))
        .collect()
}

/// Affine inputs in standard form with t = xy and z = 1, each coordinate reduced mod p.
pub fn affine_points_to_words(points: &[AffinePoint], field: &FieldParams) -> Vec<u32> {
    let p = &field.modulus;
    let limbs = |x: &BigUint| to_limbs(&(x % p), field.num_words, field.word_size);
    let mut out = Vec::with_capacity(points.len() * 4 * field.num_words);
    for point in points {
        let t = (&point.x * &point.y) % p;
        out.extend(limbs(&point.x));
        out.extend(limbs(&point.y));
        out.extend(limbs(&t));
        out.extend(limbs(&BigUint::from(1u32)));
    }
    out
}

/// `words_per_scalar` little-endian words per scalar.
pub fn scalars_to_words(scalars: &[BigUint], words_per_scalar: usize) -> Result<Vec<u32>, MsmError> {
    let mut out = Vec::with_capacity(scalars.len() * words_per_scalar);
    for (index, scalar) in scalars.iter().enumerate() {
        let mut digits = scalar.to_u32_digits();
        if digits.len() > words_per_scalar {
            return Err(MsmError::ScalarTooLarge {
                index,
                bits: scalar.bits() as usize,
                max_bits: 32 * words_per_scalar,
            });
        }
        digits.resize(words_per_scalar, 0);
        out.extend(digits);
    }
    Ok(out)
}
