use crate::curve::{EdwardsCurve, ExtendedPoint};
use crate::field::FieldOps;

/// The capability every bucket-method stage needs from its elements: an identity and an
/// associative, commutative addition. Stages are written against this trait so they can be
/// exercised with cheap stand-in groups as well as curve points.
pub trait AdditiveGroup: Sync {
    type Element: Clone + Send + Sync;

    fn identity(&self) -> Self::Element;

    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    fn double(&self, a: &Self::Element) -> Self::Element {
        self.add(a, a)
    }

    /// `k · a` by double-and-add.
    fn mul_u64(&self, a: &Self::Element, k: u64) -> Self::Element {
        let mut acc = self.identity();
        for bit in (0..64 - k.leading_zeros()).rev() {
            acc = self.double(&acc);
            if (k >> bit) & 1 == 1 {
                acc = self.add(&acc, a);
            }
        }
        acc
    }

    /// `2^k · a`
    fn mul_pow2(&self, a: &Self::Element, k: usize) -> Self::Element {
        (0..k).fold(a.clone(), |acc, _| self.double(&acc))
    }

    fn sum<'a, I>(&self, items: I) -> Self::Element
    where
        I: IntoIterator<Item = &'a Self::Element>,
        Self::Element: 'a,
    {
        items
            .into_iter()
            .fold(self.identity(), |acc, x| self.add(&acc, x))
    }
}

/// Groups with cheap negation, which is what signed-digit bucket folding relies on.
pub trait InvertibleGroup: AdditiveGroup {
    fn neg(&self, a: &Self::Element) -> Self::Element;

    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.add(a, &self.neg(b))
    }
}

impl<F: FieldOps> AdditiveGroup for EdwardsCurve<F> {
    type Element = ExtendedPoint;

    fn identity(&self) -> ExtendedPoint {
        EdwardsCurve::identity(self)
    }

    fn add(&self, a: &ExtendedPoint, b: &ExtendedPoint) -> ExtendedPoint {
        EdwardsCurve::add(self, a, b)
    }

    fn double(&self, a: &ExtendedPoint) -> ExtendedPoint {
        EdwardsCurve::double(self, a)
    }
}

impl<F: FieldOps> InvertibleGroup for EdwardsCurve<F> {
    fn neg(&self, a: &ExtendedPoint) -> ExtendedPoint {
        EdwardsCurve::neg(self, a)
    }
}
