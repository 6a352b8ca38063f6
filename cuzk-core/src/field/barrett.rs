use num::BigUint;

use super::limbs::{from_limbs, gte, mul_wide, resize, shr_bits, sub, to_limbs};
use super::{FieldElement, FieldOps, FieldParams};

/// (a * b) mod p by Barrett-Domb reduction.
///
/// `a` and `b` are `num_words` normalised limbs of at most `modulus_bits` bits each; they need
/// not be reduced mod p. With `n = modulus_bits` and `m = floor(2^(2n) / p)`, the quotient
/// estimate `((ab >> (n - 1)) * m) >> (n + 1)` undershoots the true quotient by at most two,
/// so at most two final subtractions are needed.
pub fn barrett_domb_mul(params: &FieldParams, a: &[u32], b: &[u32]) -> Vec<u32> {
    let w = params.word_size;
    let n = params.modulus_bits;
    debug_assert_eq!(a.len(), params.num_words);
    debug_assert_eq!(b.len(), params.num_words);
    debug_assert!(a.iter().chain(b).all(|&limb| limb <= params.mask));

    let x = mul_wide(a, b, w);
    let wide = x.len();

    let q1 = shr_bits(&x, n - 1, w);
    let q2 = mul_wide(&q1, &params.barrett_m_limbs, w);
    let q3 = shr_bits(&q2, n + 1, w);
    let q3p = resize(&mul_wide(&q3, &params.modulus_limbs, w), wide);

    let (mut r, borrowed) = sub(&x, &q3p, w);
    debug_assert!(!borrowed, "Barrett quotient estimate overshot");

    let p = resize(&params.modulus_limbs, wide);
    let mut subtractions = 0;
    while gte(&r, &p) {
        r = sub(&r, &p, w).0;
        subtractions += 1;
    }
    debug_assert!(subtractions <= 2);
    resize(&r, params.num_words)
}

/// Field elements held in standard form; multiplication reduces with Barrett-Domb.
#[derive(Clone, Copy, Debug)]
pub struct PlainField<'a> {
    params: &'a FieldParams,
}

impl<'a> PlainField<'a> {
    pub fn new(params: &'a FieldParams) -> Self {
        Self { params }
    }
}

impl FieldOps for PlainField<'_> {
    fn params(&self) -> &FieldParams {
        self.params
    }

    fn from_biguint(&self, x: &BigUint) -> FieldElement {
        FieldElement(to_limbs(
            &(x % &self.params.modulus),
            self.params.num_words,
            self.params.word_size,
        ))
    }

    fn to_biguint(&self, x: &FieldElement) -> BigUint {
        from_limbs(&x.0, self.params.word_size)
    }

    fn one(&self) -> FieldElement {
        let mut limbs = self.params.zero_limbs();
        limbs[0] = 1;
        FieldElement(limbs)
    }

    fn mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        FieldElement(barrett_domb_mul(self.params, &a.0, &b.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::ED_ON_BLS12_377_BASE_MODULUS;
    use crate::field::params::{MAX_WORD_SIZE, MIN_WORD_SIZE};
    use crate::utils::random::random_biguint;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn modulus() -> BigUint {
        BigUint::parse_bytes(ED_ON_BLS12_377_BASE_MODULUS.as_bytes(), 16).unwrap()
    }

    fn check(params: &FieldParams, a: &BigUint, b: &BigUint) {
        let al = to_limbs(a, params.num_words, params.word_size);
        let bl = to_limbs(b, params.num_words, params.word_size);
        let out = barrett_domb_mul(params, &al, &bl);
        assert_eq!(
            from_limbs(&out, params.word_size),
            (a * b) % &params.modulus
        );
    }

    #[test]
    fn known_vector() {
        let a = BigUint::parse_bytes(
            b"12606796758224846727326035948803889824738128609730484894316100840265045196027",
            10,
        )
        .unwrap();
        let b = BigUint::parse_bytes(
            b"14276552610056165753848820256553331055663673083569154091093918058913504134283",
            10,
        )
        .unwrap();
        let params = FieldParams::new(modulus(), 13).unwrap();
        let al = to_limbs(&a, params.num_words, params.word_size);
        let bl = to_limbs(&b, params.num_words, params.word_size);
        assert_eq!(
            from_limbs(&barrett_domb_mul(&params, &al, &bl), params.word_size).to_string(),
            "5196997864680493929220107003718532085676665306684703877609972787012085602856"
        );
    }

    #[test]
    fn randomized_against_biguint() {
        let mut rng = ChaCha20Rng::seed_from_u64(2024);
        for word_size in MIN_WORD_SIZE..=MAX_WORD_SIZE {
            let params = FieldParams::new(modulus(), word_size).unwrap();
            let trials = if word_size == 13 { 1000 } else { 100 };
            for _ in 0..trials {
                let a = random_biguint(&mut rng, params.modulus_bits);
                let b = random_biguint(&mut rng, params.modulus_bits);
                check(&params, &a, &b);
            }
            let max = (BigUint::from(1u32) << params.modulus_bits) - 1u32;
            check(&params, &max, &max);
            check(&params, &params.modulus, &max);
        }
    }
}
