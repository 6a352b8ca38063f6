use num::BigUint;
use rayon::prelude::*;

pub mod config;
pub mod cuzk;
pub mod decompose;
pub mod group;
pub mod reduce;
pub mod smvp;
pub mod sparse_matrix;
pub mod transpose;

pub use config::{DigitEncoding, ExecutionMode, MsmConfig, ReductionStrategy};
pub use cuzk::{cuzk_msm, cuzk_pipeline};
pub use group::{AdditiveGroup, InvertibleGroup};

use crate::curve::{AffinePoint, CurveContext};
use crate::utils::errors::MsmError;

/// Σ scalars[i] · points[i] by independent double-and-add per term. Slow, but shares no
/// code with the bucket pipeline, which makes it the reference the pipeline is checked
/// against.
#[tracing::instrument(skip_all, fields(n = points.len()))]
pub fn naive_msm(
    ctx: &CurveContext,
    points: &[AffinePoint],
    scalars: &[BigUint],
) -> Result<AffinePoint, MsmError> {
    (points.len() == scalars.len())
        .then(|| {
            let curve = ctx.plain_curve();
            let terms: Vec<_> = points
                .par_iter()
                .zip(scalars)
                .map(|(point, scalar)| curve.scalar_mul(&curve.from_affine(point), scalar))
                .collect();
            let sum = terms
                .iter()
                .fold(curve.identity(), |acc, term| curve.add(&acc, term));
            curve.to_affine(&sum)
        })
        .ok_or(MsmError::LengthMismatch(points.len(), scalars.len()))
}
