use num::BigUint;

pub mod barrett;
pub mod limbs;
pub mod montgomery;
pub mod params;

pub use barrett::{barrett_domb_mul, PlainField};
pub use montgomery::{mont_mul, MontgomeryField, MontgomeryVariant};
pub use params::FieldParams;

use crate::utils::math::bits_le;

/// `num_words` little-endian limbs. Whether the value is in standard or Montgomery form is
/// a property of the [`FieldOps`] implementation that produced it, not of this type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldElement(pub Vec<u32>);

impl FieldElement {
    pub fn limbs(&self) -> &[u32] {
        &self.0
    }
}

/// Modular arithmetic over limbs, implemented once per representation.
///
/// Curve formulas are written against this trait so the same code runs over standard-form
/// elements (CPU reference path) and Montgomery-form elements (kernel path).
pub trait FieldOps: Send + Sync {
    fn params(&self) -> &FieldParams;

    /// Maps a standard-form integer into this representation, reducing mod p first.
    fn from_biguint(&self, x: &BigUint) -> FieldElement;

    /// Maps an element of this representation back to a standard-form integer.
    fn to_biguint(&self, x: &FieldElement) -> BigUint;

    fn one(&self) -> FieldElement;

    fn mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement;

    fn zero(&self) -> FieldElement {
        FieldElement(self.params().zero_limbs())
    }

    fn is_zero(&self, a: &FieldElement) -> bool {
        self.params().is_zero(&a.0)
    }

    fn add(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let params = self.params();
        FieldElement(limbs::add_mod(
            &a.0,
            &b.0,
            &params.modulus_limbs,
            params.word_size,
        ))
    }

    fn sub(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        let params = self.params();
        FieldElement(limbs::sub_mod(
            &a.0,
            &b.0,
            &params.modulus_limbs,
            params.word_size,
        ))
    }

    fn neg(&self, a: &FieldElement) -> FieldElement {
        self.sub(&self.zero(), a)
    }

    fn double(&self, a: &FieldElement) -> FieldElement {
        self.add(a, a)
    }

    fn square(&self, a: &FieldElement) -> FieldElement {
        self.mul(a, a)
    }

    fn pow(&self, a: &FieldElement, exponent: &BigUint) -> FieldElement {
        let mut acc = self.one();
        for bit in bits_le(exponent).rev() {
            acc = self.square(&acc);
            if bit {
                acc = self.mul(&acc, a);
            }
        }
        acc
    }

    /// Fermat inversion, `None` for zero.
    fn inverse(&self, a: &FieldElement) -> Option<FieldElement> {
        if self.is_zero(a) {
            return None;
        }
        let exponent = &self.params().modulus - 2u32;
        Some(self.pow(a, &exponent))
    }
}
