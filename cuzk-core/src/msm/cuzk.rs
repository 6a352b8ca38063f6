use num::BigUint;
use rayon::prelude::*;
use tracing::{span, Level};

use super::config::MsmConfig;
use super::decompose::{decompose_scalars, ScalarDigits};
use super::group::InvertibleGroup;
use super::reduce::{horner, reduce_buckets};
use super::smvp::smvp;
use super::sparse_matrix::build_sparse_matrix;
use super::transpose::transpose;
use crate::curve::{AffinePoint, CurveContext, EdwardsCurve};
use crate::field::FieldOps;
use crate::utils::errors::MsmError;

/// Runs every subtask through build -> transpose -> SMVP -> reduction and folds the
/// per-subtask sums with Horner's rule.
pub fn cuzk_pipeline<G: InvertibleGroup>(
    group: &G,
    points: &[G::Element],
    digits: &ScalarDigits,
    config: &MsmConfig,
) -> Result<G::Element, MsmError> {
    if points.len() != digits.num_points {
        return Err(MsmError::LengthMismatch(points.len(), digits.num_points));
    }
    let window_sums = (0..digits.num_subtasks)
        .map(|subtask| {
            let _guard = span!(Level::DEBUG, "subtask", subtask).entered();
            let ell = build_sparse_matrix(
                group,
                points,
                digits.subtask(subtask),
                config.num_rows,
                config.num_columns(),
                config.execution,
            )?;
            let csc = transpose(&ell.to_csr());
            let buckets = smvp(group, &csc, config.encoding, config.execution);
            Ok::<_, MsmError>(reduce_buckets(group, &buckets, config.reduction))
        })
        .collect::<Result<Vec<_>, MsmError>>()?;
    Ok(horner(group, &window_sums, config.chunk_size))
}

fn msm_over<F: FieldOps>(
    curve: &EdwardsCurve<F>,
    points: &[AffinePoint],
    digits: &ScalarDigits,
    config: &MsmConfig,
) -> Result<AffinePoint, MsmError> {
    let points: Vec<_> = points.par_iter().map(|p| curve.from_affine(p)).collect();
    let result = cuzk_pipeline(curve, &points, digits, config)?;
    Ok(curve.to_affine(&result))
}

/// Sparse-matrix MSM on the CPU: Σ scalars[i] · points[i].
///
/// Runs over standard-form limbs unless the config pins a Montgomery variant.
#[tracing::instrument(skip_all, name = "cuzk_msm", fields(n = points.len(), c = config.chunk_size))]
pub fn cuzk_msm(
    ctx: &CurveContext,
    points: &[AffinePoint],
    scalars: &[BigUint],
    config: &MsmConfig,
) -> Result<AffinePoint, MsmError> {
    if points.len() != scalars.len() {
        return Err(MsmError::LengthMismatch(points.len(), scalars.len()));
    }
    config.validate()?;
    let digits = decompose_scalars(scalars, config)?;
    match config.montgomery_variant {
        None => msm_over(&ctx.plain_curve(), points, &digits, config),
        Some(variant) => msm_over(&ctx.mont_curve_with(variant), points, &digits, config),
    }
}
