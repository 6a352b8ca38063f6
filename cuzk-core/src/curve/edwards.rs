//! Extended twisted Edwards coordinates (X : Y : T : Z) with x = X/Z, y = Y/Z, xy = T/Z.
//!
//! Formulas follow the Hisil-Wong-Carter-Dawson paper as catalogued in the EFD:
//! `add-2008-hwcd` for general `a`, `add-2008-hwcd-3` for `a = -1` and `dbl-2008-hwcd`.

use num::BigUint;

use super::{AffinePoint, CurveParams};
use crate::field::{FieldElement, FieldOps};
use crate::utils::math::bits_le;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExtendedPoint {
    pub x: FieldElement,
    pub y: FieldElement,
    pub t: FieldElement,
    pub z: FieldElement,
}

/// Point arithmetic generic over the field representation. The same formulas run over
/// standard-form and Montgomery-form limbs; only the `F` instance differs.
#[derive(Clone, Debug)]
pub struct EdwardsCurve<F: FieldOps> {
    field: F,
    a: FieldElement,
    d: FieldElement,
    two_d: FieldElement,
    a_is_minus_one: bool,
}

impl<F: FieldOps> EdwardsCurve<F> {
    pub fn new(field: F, curve: &CurveParams) -> Self {
        let a = field.from_biguint(&curve.a);
        let d = field.from_biguint(&curve.d);
        let two_d = field.double(&d);
        Self {
            field,
            a,
            d,
            two_d,
            a_is_minus_one: curve.a_is_minus_one(),
        }
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn identity(&self) -> ExtendedPoint {
        ExtendedPoint {
            x: self.field.zero(),
            y: self.field.one(),
            t: self.field.zero(),
            z: self.field.one(),
        }
    }

    pub fn from_affine(&self, point: &AffinePoint) -> ExtendedPoint {
        let x = self.field.from_biguint(&point.x);
        let y = self.field.from_biguint(&point.y);
        let t = self.field.mul(&x, &y);
        ExtendedPoint {
            x,
            y,
            t,
            z: self.field.one(),
        }
    }

    /// Divides through by Z. Z never vanishes for points produced by the complete formulas.
    pub fn to_affine(&self, point: &ExtendedPoint) -> AffinePoint {
        let z_inv = self.field.inverse(&point.z);
        debug_assert!(z_inv.is_some(), "extended point with Z = 0");
        let z_inv = z_inv.unwrap_or_else(|| self.field.zero());
        AffinePoint {
            x: self.field.to_biguint(&self.field.mul(&point.x, &z_inv)),
            y: self.field.to_biguint(&self.field.mul(&point.y, &z_inv)),
        }
    }

    pub fn add(&self, p: &ExtendedPoint, q: &ExtendedPoint) -> ExtendedPoint {
        if self.a_is_minus_one {
            self.add_a_minus_one(p, q)
        } else {
            self.add_unified(p, q)
        }
    }

    /// Unified addition for any `a` (9M + 1 multiplication by a).
    pub fn add_unified(&self, p: &ExtendedPoint, q: &ExtendedPoint) -> ExtendedPoint {
        let f = &self.field;
        let a = f.mul(&p.x, &q.x);
        let b = f.mul(&p.y, &q.y);
        let c = f.mul(&f.mul(&p.t, &self.d), &q.t);
        let d = f.mul(&p.z, &q.z);
        let e = f.sub(
            &f.sub(&f.mul(&f.add(&p.x, &p.y), &f.add(&q.x, &q.y)), &a),
            &b,
        );
        let ff = f.sub(&d, &c);
        let g = f.add(&d, &c);
        let h = f.sub(&b, &f.mul(&self.a, &a));
        Self::finish(f, &e, &ff, &g, &h)
    }

    /// Addition specialised to a = -1 (8M, with 2d precomputed).
    pub fn add_a_minus_one(&self, p: &ExtendedPoint, q: &ExtendedPoint) -> ExtendedPoint {
        debug_assert!(self.a_is_minus_one);
        let f = &self.field;
        let a = f.mul(&f.sub(&p.y, &p.x), &f.sub(&q.y, &q.x));
        let b = f.mul(&f.add(&p.y, &p.x), &f.add(&q.y, &q.x));
        let c = f.mul(&f.mul(&p.t, &self.two_d), &q.t);
        let d = f.double(&f.mul(&p.z, &q.z));
        let e = f.sub(&b, &a);
        let ff = f.sub(&d, &c);
        let g = f.add(&d, &c);
        let h = f.add(&b, &a);
        Self::finish(f, &e, &ff, &g, &h)
    }

    pub fn double(&self, p: &ExtendedPoint) -> ExtendedPoint {
        let f = &self.field;
        let a = f.square(&p.x);
        let b = f.square(&p.y);
        let c = f.double(&f.square(&p.z));
        let d = f.mul(&self.a, &a);
        let e = f.sub(&f.sub(&f.square(&f.add(&p.x, &p.y)), &a), &b);
        let g = f.add(&d, &b);
        let ff = f.sub(&g, &c);
        let h = f.sub(&d, &b);
        Self::finish(f, &e, &ff, &g, &h)
    }

    #[inline]
    fn finish(
        f: &F,
        e: &FieldElement,
        ff: &FieldElement,
        g: &FieldElement,
        h: &FieldElement,
    ) -> ExtendedPoint {
        ExtendedPoint {
            x: f.mul(e, ff),
            y: f.mul(g, h),
            t: f.mul(e, h),
            z: f.mul(ff, g),
        }
    }

    pub fn neg(&self, p: &ExtendedPoint) -> ExtendedPoint {
        ExtendedPoint {
            x: self.field.neg(&p.x),
            y: p.y.clone(),
            t: self.field.neg(&p.t),
            z: p.z.clone(),
        }
    }

    pub fn sub(&self, p: &ExtendedPoint, q: &ExtendedPoint) -> ExtendedPoint {
        self.add(p, &self.neg(q))
    }

    /// Double-and-add from the most significant bit. Not constant time.
    pub fn scalar_mul(&self, p: &ExtendedPoint, scalar: &BigUint) -> ExtendedPoint {
        let mut acc = self.identity();
        for bit in bits_le(scalar).rev() {
            acc = self.double(&acc);
            if bit {
                acc = self.add(&acc, p);
            }
        }
        acc
    }

    /// `2^k · p` by `k` doublings.
    pub fn mul_pow2(&self, p: &ExtendedPoint, k: usize) -> ExtendedPoint {
        (0..k).fold(p.clone(), |acc, _| self.double(&acc))
    }

    /// Equality of the represented points, independent of the projective scaling.
    pub fn eq_projective(&self, p: &ExtendedPoint, q: &ExtendedPoint) -> bool {
        let f = &self.field;
        f.mul(&p.x, &q.z) == f.mul(&q.x, &p.z) && f.mul(&p.y, &q.z) == f.mul(&q.y, &p.z)
    }

    pub fn is_identity(&self, p: &ExtendedPoint) -> bool {
        self.field.is_zero(&p.x) && p.y == p.z
    }
}
