use num::{BigUint, One, Zero};
use num_integer::Integer;

use super::limbs::{gte, to_limbs};
use super::montgomery::MontgomeryVariant;
use crate::utils::errors::MsmError;

/// Width of the native accumulator every limb routine is written against.
pub const ACCUMULATOR_BITS: usize = 32;
pub const MIN_WORD_SIZE: usize = 8;
/// Largest word size for which a 32-bit accumulator can absorb `x_i * y_j + q * p_j` plus a carry.
pub const MAX_WORD_SIZE: usize = 15;

/// Every constant the limb arithmetic needs, derived once from `(p, word_size)`.
///
/// This is the only place these constants are computed: the CPU field objects and the
/// kernel parameter generator both read them from here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldParams {
    pub modulus: BigUint,
    pub modulus_bits: usize,
    pub word_size: usize,
    pub num_words: usize,
    pub mask: u32,
    /// R mod p, where R = 2^(num_words * word_size).
    pub r: BigUint,
    pub r_squared: BigUint,
    pub rinv: BigUint,
    /// -p^{-1} mod 2^word_size
    pub n0: u32,
    /// Max number of `x_i * y_j + q * p_j` pairs a 32-bit accumulator absorbs without overflow.
    pub nsafe: usize,
    /// floor(2^(2 * modulus_bits) / p)
    pub barrett_m: BigUint,
    pub modulus_limbs: Vec<u32>,
    pub r_limbs: Vec<u32>,
    pub r_squared_limbs: Vec<u32>,
    pub barrett_m_limbs: Vec<u32>,
}

impl FieldParams {
    pub fn new(modulus: BigUint, word_size: usize) -> Result<Self, MsmError> {
        if !(MIN_WORD_SIZE..=MAX_WORD_SIZE).contains(&word_size) {
            return Err(MsmError::UnsupportedWordSize(word_size));
        }
        if modulus.is_even() || modulus <= BigUint::from(2u32) {
            return Err(MsmError::InvalidModulus(format!(
                "{modulus:#x} must be an odd prime"
            )));
        }

        let modulus_bits = modulus.bits() as usize;
        let num_words = calc_num_words(word_size, &modulus);
        if num_words < 2 {
            return Err(MsmError::InvalidModulus(format!(
                "{modulus:#x} must span at least two {word_size}-bit limbs"
            )));
        }
        let mask = ((1u64 << word_size) - 1) as u32;

        let big_r = BigUint::one() << (num_words * word_size);
        let r = &big_r % &modulus;
        let r_squared = (&r * &r) % &modulus;
        let rinv = r.modpow(&(&modulus - 2u32), &modulus);
        if (&r * &rinv) % &modulus != BigUint::one() {
            return Err(MsmError::InvalidModulus(format!(
                "{modulus:#x} is not prime, R has no inverse"
            )));
        }

        let p0 = modulus.to_u32_digits()[0] & mask;
        let n0 = neg_inverse_mod_word(p0, word_size);
        let nsafe = calc_nsafe(word_size);

        let barrett_m = (BigUint::one() << (2 * modulus_bits)) / &modulus;
        let barrett_m_words = (barrett_m.bits() as usize).div_ceil(word_size);

        Ok(Self {
            modulus_limbs: to_limbs(&modulus, num_words, word_size),
            r_limbs: to_limbs(&r, num_words, word_size),
            r_squared_limbs: to_limbs(&r_squared, num_words, word_size),
            barrett_m_limbs: to_limbs(&barrett_m, barrett_m_words, word_size),
            modulus,
            modulus_bits,
            word_size,
            num_words,
            mask,
            r,
            r_squared,
            rinv,
            n0,
            nsafe,
            barrett_m,
        })
    }

    /// Picks the multiply-reduce routine from how `nsafe` compares to `num_words`.
    pub fn montgomery_variant(&self) -> MontgomeryVariant {
        match self.nsafe.cmp(&self.num_words) {
            std::cmp::Ordering::Greater => MontgomeryVariant::Optimized,
            std::cmp::Ordering::Less => MontgomeryVariant::Modified,
            std::cmp::Ordering::Equal => MontgomeryVariant::Iterative,
        }
    }

    pub fn to_montgomery(&self, x: &BigUint) -> BigUint {
        (x * &self.r) % &self.modulus
    }

    pub fn from_montgomery(&self, x: &BigUint) -> BigUint {
        (x * &self.rinv) % &self.modulus
    }

    /// True if `limbs` is a canonical `num_words`-limb encoding of a value in [0, p).
    pub fn is_reduced(&self, limbs: &[u32]) -> bool {
        limbs.len() == self.num_words
            && limbs.iter().all(|&limb| limb <= self.mask)
            && !gte(limbs, &self.modulus_limbs)
    }

    pub fn zero_limbs(&self) -> Vec<u32> {
        vec![0; self.num_words]
    }

    pub fn is_zero(&self, limbs: &[u32]) -> bool {
        limbs.iter().all(Zero::is_zero)
    }
}

pub fn calc_num_words(word_size: usize, modulus: &BigUint) -> usize {
    (modulus.bits() as usize).div_ceil(word_size)
}

/// Largest k with k * 2^(2w) <= 2^32 is found by stepping past it; half of it counts
/// `x * y + q * p` pairs.
pub fn calc_nsafe(word_size: usize) -> usize {
    let max_int = 1u64 << ACCUMULATOR_BITS;
    let product_bound = 1u64 << (2 * word_size);
    let mut k = 1u64;
    while k * product_bound <= max_int {
        k += 1;
    }
    (k / 2) as usize
}

/// Newton iteration for p0^{-1} mod 2^w, then negated.
fn neg_inverse_mod_word(p0: u32, word_size: usize) -> u32 {
    debug_assert!(p0 & 1 == 1);
    let modulus = 1u64 << word_size;
    let p0 = p0 as u64;
    let mut inv = 1u64;
    for _ in 0..5 {
        inv = (inv * (2 + modulus * modulus - (p0 * inv) % (modulus * modulus))) % modulus;
    }
    debug_assert_eq!((inv * p0) % modulus, 1);
    ((modulus - inv) % modulus) as u32
}
