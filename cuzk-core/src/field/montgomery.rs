use num::BigUint;
use strum_macros::{EnumIter, IntoStaticStr};

use super::limbs::{from_limbs, gte, normalize, sub, to_limbs};
use super::{FieldElement, FieldOps, FieldParams};

/// The three CIOS multiply-reduce routines. They differ only in how often carries are
/// propagated, which is bounded by how many partial products a 32-bit accumulator absorbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum MontgomeryVariant {
    /// Carry propagated after every partial product. Always safe for word sizes <= 15.
    Iterative,
    /// No carries inside the loop, one normalisation at the end. Requires nsafe > num_words.
    Optimized,
    /// Carries injected every `nsafe` outer iterations.
    Modified,
}

/// Returns x * y * R^{-1} mod p for x, y < p in `num_words`-limb form.
///
/// Panics if either input is not reduced mod p; feeding unreduced values is a caller bug,
/// not a recoverable condition.
pub fn mont_mul(
    params: &FieldParams,
    variant: MontgomeryVariant,
    x: &[u32],
    y: &[u32],
) -> Vec<u32> {
    assert!(
        params.is_reduced(x) && params.is_reduced(y),
        "Montgomery multiplication inputs must be reduced mod p"
    );
    match variant {
        MontgomeryVariant::Iterative => mont_mul_iterative(params, x, y),
        MontgomeryVariant::Optimized => {
            assert!(
                params.nsafe > params.num_words,
                "optimized Montgomery needs nsafe ({}) > num_words ({})",
                params.nsafe,
                params.num_words
            );
            mont_mul_lazy(params, x, y, None)
        }
        MontgomeryVariant::Modified => mont_mul_lazy(params, x, y, Some(params.nsafe)),
    }
}

fn mont_mul_iterative(params: &FieldParams, x: &[u32], y: &[u32]) -> Vec<u32> {
    let n = params.num_words;
    let w = params.word_size;
    let mask = params.mask;
    let p = &params.modulus_limbs;

    let mut s = vec![0u32; n];
    for i in 0..n {
        let t = s[0] + x[i] * y[0];
        let q = ((t & mask) * params.n0) & mask;
        let mut carry = (t + q * p[0]) >> w;
        for j in 1..n {
            let t = s[j] + x[i] * y[j] + q * p[j] + carry;
            s[j - 1] = t & mask;
            carry = t >> w;
        }
        s[n - 1] = carry;
    }
    conditional_reduce(params, s)
}

/// Shared body of the optimized and modified routines: partial products accumulate without
/// carry propagation, and `carry_interval` (if any) bounds how many outer iterations may pass
/// before the accumulator must be normalised.
fn mont_mul_lazy(
    params: &FieldParams,
    x: &[u32],
    y: &[u32],
    carry_interval: Option<usize>,
) -> Vec<u32> {
    let n = params.num_words;
    let w = params.word_size;
    let mask = params.mask;
    let p = &params.modulus_limbs;

    let mut s = vec![0u32; n];
    for i in 0..n {
        let t = s[0] + x[i] * y[0];
        let q = ((t & mask) * params.n0) & mask;
        let carry = (t + q * p[0]) >> w;
        s[0] = s[1] + x[i] * y[1] + q * p[1] + carry;
        for j in 2..n {
            s[j - 1] = s[j] + x[i] * y[j] + q * p[j];
        }
        s[n - 1] = 0;

        if let Some(interval) = carry_interval {
            if (i + 1) % interval == 0 && i + 1 < n {
                normalize(&mut s, w);
            }
        }
    }
    normalize(&mut s, w);
    conditional_reduce(params, s)
}

/// `s < 2p` on entry; subtracts p once if needed.
fn conditional_reduce(params: &FieldParams, s: Vec<u32>) -> Vec<u32> {
    if gte(&s, &params.modulus_limbs) {
        sub(&s, &params.modulus_limbs, params.word_size).0
    } else {
        s
    }
}

/// Field elements held in Montgomery form; multiplication never leaves the limb domain.
#[derive(Clone, Copy, Debug)]
pub struct MontgomeryField<'a> {
    params: &'a FieldParams,
    variant: MontgomeryVariant,
}

impl<'a> MontgomeryField<'a> {
    pub fn new(params: &'a FieldParams) -> Self {
        Self::with_variant(params, params.montgomery_variant())
    }

    pub fn with_variant(params: &'a FieldParams, variant: MontgomeryVariant) -> Self {
        Self { params, variant }
    }

    pub fn variant(&self) -> MontgomeryVariant {
        self.variant
    }

    /// Standard-form limbs to Montgomery form: x * R^2 * R^{-1} = xR.
    pub fn to_montgomery(&self, x: &FieldElement) -> FieldElement {
        FieldElement(mont_mul(
            self.params,
            self.variant,
            &x.0,
            &self.params.r_squared_limbs,
        ))
    }

    /// Montgomery form back to standard-form limbs: xR * 1 * R^{-1} = x.
    pub fn from_montgomery(&self, x: &FieldElement) -> FieldElement {
        let mut one = self.params.zero_limbs();
        one[0] = 1;
        FieldElement(mont_mul(self.params, self.variant, &x.0, &one))
    }
}

impl FieldOps for MontgomeryField<'_> {
    fn params(&self) -> &FieldParams {
        self.params
    }

    fn from_biguint(&self, x: &BigUint) -> FieldElement {
        let reduced = x % &self.params.modulus;
        FieldElement(to_limbs(
            &self.params.to_montgomery(&reduced),
            self.params.num_words,
            self.params.word_size,
        ))
    }

    fn to_biguint(&self, x: &FieldElement) -> BigUint {
        self.params
            .from_montgomery(&from_limbs(&x.0, self.params.word_size))
    }

    fn one(&self) -> FieldElement {
        FieldElement(self.params.r_limbs.clone())
    }

    fn mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        FieldElement(mont_mul(self.params, self.variant, &a.0, &b.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::ED_ON_BLS12_377_BASE_MODULUS;
    use crate::field::params::{MAX_WORD_SIZE, MIN_WORD_SIZE};
    use crate::utils::random::random_field_element;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;
    use strum::IntoEnumIterator;

    fn modulus() -> BigUint {
        BigUint::parse_bytes(ED_ON_BLS12_377_BASE_MODULUS.as_bytes(), 16).unwrap()
    }

    fn check_variant(params: &FieldParams, variant: MontgomeryVariant, trials: usize) {
        let mut rng = ChaCha20Rng::seed_from_u64(params.word_size as u64);
        let p = &params.modulus;
        let big_r = BigUint::from(1u32) << (params.num_words * params.word_size);
        let mut inputs = vec![
            (BigUint::from(0u32), p - 1u32),
            (p - 1u32, p - 1u32),
            (BigUint::from(1u32), BigUint::from(1u32)),
        ];
        inputs.extend(
            (0..trials).map(|_| (random_field_element(&mut rng, p), random_field_element(&mut rng, p))),
        );
        for (a, b) in inputs {
            let a_mont = params.to_montgomery(&a);
            let b_mont = params.to_montgomery(&b);
            let x = to_limbs(&a_mont, params.num_words, params.word_size);
            let y = to_limbs(&b_mont, params.num_words, params.word_size);
            let out = mont_mul(params, variant, &x, &y);
            assert!(params.is_reduced(&out));
            assert_eq!(
                from_limbs(&out, params.word_size),
                (&a * &b * &big_r) % p,
                "{variant:?} with word size {}",
                params.word_size
            );
        }
    }

    #[test]
    fn all_variants_at_word_size_13() {
        let params = FieldParams::new(modulus(), 13).unwrap();
        for variant in MontgomeryVariant::iter() {
            check_variant(&params, variant, 300);
        }
    }

    #[test]
    fn selected_variant_for_every_word_size() {
        for word_size in MIN_WORD_SIZE..=MAX_WORD_SIZE {
            let params = FieldParams::new(modulus(), word_size).unwrap();
            check_variant(&params, MontgomeryVariant::Iterative, 50);
            check_variant(&params, params.montgomery_variant(), 50);
            check_variant(&params, MontgomeryVariant::Modified, 50);
        }
    }

    #[test]
    #[should_panic(expected = "reduced mod p")]
    fn unreduced_input_aborts() {
        let params = FieldParams::new(modulus(), 13).unwrap();
        let one = to_limbs(&BigUint::from(1u32), params.num_words, params.word_size);
        mont_mul(
            &params,
            MontgomeryVariant::Iterative,
            &params.modulus_limbs,
            &one,
        );
    }

    #[test]
    fn conversion_round_trip() {
        let params = FieldParams::new(modulus(), 13).unwrap();
        let field = MontgomeryField::new(&params);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..50 {
            let a = random_field_element(&mut rng, &params.modulus);
            let plain = FieldElement(to_limbs(&a, params.num_words, params.word_size));
            let mont = field.to_montgomery(&plain);
            assert_eq!(mont, field.from_biguint(&a));
            assert_eq!(field.from_montgomery(&mont), plain);
            assert_eq!(field.to_biguint(&mont), a);
        }
    }
}
