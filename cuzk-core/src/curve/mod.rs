use num::{BigUint, One, Zero};
use strum_macros::{EnumIter, IntoStaticStr};

pub mod edwards;

pub use edwards::{EdwardsCurve, ExtendedPoint};

use crate::field::{FieldParams, MontgomeryField, MontgomeryVariant, PlainField};
use crate::utils::errors::MsmError;

/// The BLS12-377 scalar field, which is the base field of Ed-on-BLS12-377.
pub const ED_ON_BLS12_377_BASE_MODULUS: &str =
    "12ab655e9a2ca55660b44d1e5c37b00159aa76fed00000010a11800000000001";
pub const ED_ON_BLS12_377_SCALAR_MODULUS: &str =
    "2111115437357092606062206234695386632838870926408408195193685246394721360383";
const ED_ON_BLS12_377_GENERATOR: (&str, &str) = (
    "4497879464030519973909970603271755437257548612157028181994697785683032656389",
    "4357141146396347889246900916607623952598927460421559113092863576544024487809",
);

/// The BN254 scalar field, which is the base field of Baby Jubjub.
pub const BABY_JUBJUB_BASE_MODULUS: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";
pub const BABY_JUBJUB_SCALAR_MODULUS: &str =
    "2736030358979909402780800718157159386076813972158567259200215660948447373041";
const BABY_JUBJUB_BASE8: (&str, &str) = (
    "5299619240641551281634865583518297030282874472190772894086521144482721001553",
    "16950150798460657717958625567821834550301663161624707787222815936182638968203",
);

fn dec(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 10).unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CurvePreset {
    EdOnBls12_377,
    BabyJubjub,
}

/// Affine point in standard form. The identity is (0, 1).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AffinePoint {
    pub x: BigUint,
    pub y: BigUint,
}

impl AffinePoint {
    pub fn new(x: BigUint, y: BigUint) -> Self {
        Self { x, y }
    }

    pub fn identity() -> Self {
        Self {
            x: BigUint::zero(),
            y: BigUint::one(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.x.is_zero() && self.y.is_one()
    }
}

/// Twisted Edwards curve a·x^2 + y^2 = 1 + d·x^2·y^2 over F_p.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurveParams {
    pub name: &'static str,
    pub base_modulus: BigUint,
    /// Order of the prime-order subgroup the generator spans.
    pub scalar_modulus: BigUint,
    /// Reduced mod p, so a = -1 is stored as p - 1.
    pub a: BigUint,
    pub d: BigUint,
    pub generator: AffinePoint,
}

impl CurveParams {
    pub fn ed_on_bls12_377() -> Self {
        let p = BigUint::parse_bytes(ED_ON_BLS12_377_BASE_MODULUS.as_bytes(), 16)
            .unwrap_or_default();
        Self {
            name: "ed_on_bls12_377",
            a: &p - 1u32,
            d: BigUint::from(3021u32),
            scalar_modulus: dec(ED_ON_BLS12_377_SCALAR_MODULUS),
            generator: AffinePoint::new(
                dec(ED_ON_BLS12_377_GENERATOR.0),
                dec(ED_ON_BLS12_377_GENERATOR.1),
            ),
            base_modulus: p,
        }
    }

    pub fn baby_jubjub() -> Self {
        Self {
            name: "baby_jubjub",
            base_modulus: dec(BABY_JUBJUB_BASE_MODULUS),
            scalar_modulus: dec(BABY_JUBJUB_SCALAR_MODULUS),
            a: BigUint::from(168700u32),
            d: BigUint::from(168696u32),
            generator: AffinePoint::new(dec(BABY_JUBJUB_BASE8.0), dec(BABY_JUBJUB_BASE8.1)),
        }
    }

    pub fn from_preset(preset: CurvePreset) -> Self {
        match preset {
            CurvePreset::EdOnBls12_377 => Self::ed_on_bls12_377(),
            CurvePreset::BabyJubjub => Self::baby_jubjub(),
        }
    }

    pub fn a_is_minus_one(&self) -> bool {
        self.a == &self.base_modulus - 1u32
    }

    pub fn scalar_bits(&self) -> usize {
        self.scalar_modulus.bits() as usize
    }
}

/// Everything an MSM needs to know about its curve, built once and shared read-only by
/// every stage and every kernel invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurveContext {
    pub curve: CurveParams,
    pub field: FieldParams,
}

impl CurveContext {
    pub fn new(curve: CurveParams, word_size: usize) -> Result<Self, MsmError> {
        let field = FieldParams::new(curve.base_modulus.clone(), word_size)?;
        Ok(Self { curve, field })
    }

    /// Point arithmetic over standard-form limbs with Barrett-Domb multiplication.
    pub fn plain_curve(&self) -> EdwardsCurve<PlainField<'_>> {
        EdwardsCurve::new(PlainField::new(&self.field), &self.curve)
    }

    /// Point arithmetic over Montgomery-form limbs with the variant `nsafe` selects.
    pub fn mont_curve(&self) -> EdwardsCurve<MontgomeryField<'_>> {
        self.mont_curve_with(self.field.montgomery_variant())
    }

    pub fn mont_curve_with(
        &self,
        variant: MontgomeryVariant,
    ) -> EdwardsCurve<MontgomeryField<'_>> {
        EdwardsCurve::new(
            MontgomeryField::with_variant(&self.field, variant),
            &self.curve,
        )
    }

    pub fn is_on_curve(&self, point: &AffinePoint) -> bool {
        let p = &self.field.modulus;
        if &point.x >= p || &point.y >= p {
            return false;
        }
        let x2 = (&point.x * &point.x) % p;
        let y2 = (&point.y * &point.y) % p;
        let lhs = (&self.curve.a * &x2 + &y2) % p;
        let rhs = (BigUint::one() + &self.curve.d * &x2 % p * &y2) % p;
        lhs == rhs
    }

    pub fn check_points(&self, points: &[AffinePoint]) -> Result<(), MsmError> {
        match points.iter().position(|point| !self.is_on_curve(point)) {
            Some(index) => Err(MsmError::PointNotOnCurve { index }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn presets_are_consistent() {
        for preset in CurvePreset::iter() {
            let ctx = CurveContext::new(CurveParams::from_preset(preset), 13).unwrap();
            assert!(ctx.is_on_curve(&ctx.curve.generator), "{preset:?}");
            assert!(ctx.is_on_curve(&AffinePoint::identity()));
            assert!(!ctx.is_on_curve(&AffinePoint::new(
                BigUint::from(1u32),
                BigUint::from(1u32)
            )));

            let curve = ctx.plain_curve();
            let g = curve.from_affine(&ctx.curve.generator);
            let order_times_g = curve.scalar_mul(&g, &ctx.curve.scalar_modulus);
            assert!(curve.to_affine(&order_times_g).is_identity(), "{preset:?}");
        }
    }

    #[test]
    fn a_minus_one_detection() {
        assert!(CurveParams::ed_on_bls12_377().a_is_minus_one());
        assert!(!CurveParams::baby_jubjub().a_is_minus_one());
        assert_eq!(CurveParams::ed_on_bls12_377().scalar_bits(), 251);
    }

    #[test]
    fn check_points_reports_first_bad_index() {
        let ctx = CurveContext::new(CurveParams::ed_on_bls12_377(), 13).unwrap();
        let good = ctx.curve.generator.clone();
        let bad = AffinePoint::new(BigUint::from(2u32), BigUint::from(3u32));
        assert_eq!(ctx.check_points(&[good.clone(), good.clone()]), Ok(()));
        assert_eq!(
            ctx.check_points(&[good, bad]),
            Err(MsmError::PointNotOnCurve { index: 1 })
        );
    }
}
