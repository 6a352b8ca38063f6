//! Fixed-width limb arithmetic.
//!
//! A limb vector is little-endian; every limb holds at most `word_size` bits except where a
//! routine documents that the top limb may carry overflow. All intermediate sums are written
//! against a 32-bit accumulator, the same budget a GPU kernel has.

use num::{BigUint, Zero};

use crate::utils::math::read_bits;

#[inline]
pub fn word_mask(word_size: usize) -> u32 {
    ((1u64 << word_size) - 1) as u32
}

/// Splits `x` into `num_words` limbs of `word_size` bits.
pub fn to_limbs(x: &BigUint, num_words: usize, word_size: usize) -> Vec<u32> {
    assert!(
        (1..=16).contains(&word_size),
        "word size {word_size} out of range"
    );
    assert!(
        x.bits() as usize <= num_words * word_size,
        "{} bits do not fit in {num_words} limbs of {word_size} bits",
        x.bits()
    );
    let digits = x.to_u32_digits();
    (0..num_words)
        .map(|i| read_bits(&digits, i * word_size, word_size))
        .collect()
}

/// Inverse of [`to_limbs`]. Accepts unnormalised limbs (a limb may exceed the word mask).
pub fn from_limbs(limbs: &[u32], word_size: usize) -> BigUint {
    limbs.iter().rev().fold(BigUint::zero(), |acc, &limb| {
        (acc << word_size) + BigUint::from(limb)
    })
}

/// Lexicographic comparison from the most significant limb; both sides must have equal length.
pub fn gte(a: &[u32], b: &[u32]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        if x != y {
            return x > y;
        }
    }
    true
}

/// `a + b` with carries propagated; the final carry stays in the top limb, which is
/// therefore allowed to exceed the word mask.
pub fn add_unreduced(a: &[u32], b: &[u32], word_size: usize) -> Vec<u32> {
    debug_assert_eq!(a.len(), b.len());
    let mask = word_mask(word_size);
    let last = a.len() - 1;
    let mut out = vec![0u32; a.len()];
    let mut carry = 0u32;
    for i in 0..a.len() {
        let t = a[i] + b[i] + carry;
        if i == last {
            out[i] = t;
        } else {
            out[i] = t & mask;
            carry = t >> word_size;
        }
    }
    out
}

/// `a - b` with borrow propagation. Returns the difference and whether it wrapped.
pub fn sub(a: &[u32], b: &[u32], word_size: usize) -> (Vec<u32>, bool) {
    debug_assert_eq!(a.len(), b.len());
    let base = 1i64 << word_size;
    let mut out = vec![0u32; a.len()];
    let mut borrow = 0i64;
    for i in 0..a.len() {
        let mut t = a[i] as i64 - b[i] as i64 - borrow;
        if t < 0 {
            t += base;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out[i] = t as u32;
    }
    (out, borrow == 1)
}

/// (a + b) mod p for a, b in [0, p).
pub fn add_mod(a: &[u32], b: &[u32], p: &[u32], word_size: usize) -> Vec<u32> {
    let sum = add_unreduced(a, b, word_size);
    if gte(&sum, p) {
        sub(&sum, p, word_size).0
    } else {
        sum
    }
}

/// (a - b) mod p for a, b in [0, p).
pub fn sub_mod(a: &[u32], b: &[u32], p: &[u32], word_size: usize) -> Vec<u32> {
    if gte(a, b) {
        sub(a, b, word_size).0
    } else {
        let shifted = add_unreduced(a, p, word_size);
        sub(&shifted, b, word_size).0
    }
}

/// Schoolbook product with a carry propagated after every partial product.
/// Inputs must be normalised; the output has `a.len() + b.len()` normalised limbs.
pub fn mul_wide(a: &[u32], b: &[u32], word_size: usize) -> Vec<u32> {
    let mask = word_mask(word_size);
    let mut out = vec![0u32; a.len() + b.len()];
    for i in 0..a.len() {
        let mut carry = 0u32;
        for j in 0..b.len() {
            let t = out[i + j] + a[i] * b[j] + carry;
            out[i + j] = t & mask;
            carry = t >> word_size;
        }
        out[i + b.len()] = carry;
    }
    out
}

/// `x >> bits` over normalised limbs.
pub fn shr_bits(x: &[u32], bits: usize, word_size: usize) -> Vec<u32> {
    let mask = word_mask(word_size);
    let skip = bits / word_size;
    let offset = bits % word_size;
    if skip >= x.len() {
        return vec![0];
    }
    let out_len = x.len() - skip;
    (0..out_len)
        .map(|i| {
            let lo = x[skip + i] >> offset;
            let hi = if offset > 0 {
                x.get(skip + i + 1).copied().unwrap_or(0) << (word_size - offset)
            } else {
                0
            };
            (lo | hi) & mask
        })
        .collect()
}

/// Propagates deferred carries so that every limb but the last fits the word mask.
pub fn normalize(limbs: &mut [u32], word_size: usize) {
    let mask = word_mask(word_size);
    for j in 0..limbs.len() - 1 {
        limbs[j + 1] += limbs[j] >> word_size;
        limbs[j] &= mask;
    }
}

/// Zero-extends (or checks-and-truncates) `x` to exactly `len` limbs.
pub fn resize(x: &[u32], len: usize) -> Vec<u32> {
    debug_assert!(x.iter().skip(len).all(|&limb| limb == 0));
    let mut out = x[..x.len().min(len)].to_vec();
    out.resize(len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::{RngCore, SeedableRng};

    fn random_biguint(rng: &mut impl RngCore, bits: usize) -> BigUint {
        let mut bytes = vec![0u8; bits.div_ceil(8)];
        rng.fill_bytes(&mut bytes);
        BigUint::from_bytes_le(&bytes) >> (bytes.len() * 8 - bits)
    }

    #[test]
    fn limbs_round_trip_all_word_sizes() {
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        for word_size in 1..=16 {
            for bits in [0usize, 1, 17, 253, 256] {
                let x = random_biguint(&mut rng, bits);
                let num_words = bits.max(1).div_ceil(word_size);
                let limbs = to_limbs(&x, num_words, word_size);
                assert!(limbs.iter().all(|&l| l <= word_mask(word_size)));
                assert_eq!(from_limbs(&limbs, word_size), x);
            }
        }
    }

    #[test]
    #[should_panic]
    fn to_limbs_rejects_overwide_values() {
        to_limbs(&BigUint::from(1u32 << 26), 2, 13);
    }

    #[test]
    fn modular_add_sub_match_biguint() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let word_size = 11;
        let p = BigUint::parse_bytes(
            b"12ab655e9a2ca55660b44d1e5c37b00159aa76fed00000010a11800000000001",
            16,
        )
        .unwrap();
        let n = (p.bits() as usize).div_ceil(word_size);
        let p_limbs = to_limbs(&p, n, word_size);
        for _ in 0..500 {
            let a = random_biguint(&mut rng, 256) % &p;
            let b = random_biguint(&mut rng, 256) % &p;
            let al = to_limbs(&a, n, word_size);
            let bl = to_limbs(&b, n, word_size);
            assert_eq!(
                from_limbs(&add_mod(&al, &bl, &p_limbs, word_size), word_size),
                (&a + &b) % &p
            );
            assert_eq!(
                from_limbs(&sub_mod(&al, &bl, &p_limbs, word_size), word_size),
                (&a + &p - &b) % &p
            );
        }
    }

    #[test]
    fn mul_wide_and_shift_match_biguint() {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        for word_size in [8, 13, 15] {
            for _ in 0..100 {
                let a = random_biguint(&mut rng, 200);
                let b = random_biguint(&mut rng, 130);
                let al = to_limbs(&a, 200usize.div_ceil(word_size), word_size);
                let bl = to_limbs(&b, 130usize.div_ceil(word_size), word_size);
                let product = mul_wide(&al, &bl, word_size);
                assert_eq!(from_limbs(&product, word_size), &a * &b);
                for shift in [0, 1, word_size, 77, 252] {
                    assert_eq!(
                        from_limbs(&shr_bits(&product, shift, word_size), word_size),
                        (&a * &b) >> shift
                    );
                }
            }
        }
    }

    #[test]
    fn normalize_keeps_value() {
        let word_size = 13;
        let mut lazy = vec![(1 << 20) + 5, 1 << 25, 3, 0];
        let before = from_limbs(&lazy, word_size);
        normalize(&mut lazy, word_size);
        assert!(lazy[..3].iter().all(|&l| l <= word_mask(word_size)));
        assert_eq!(from_limbs(&lazy, word_size), before);
    }
}
