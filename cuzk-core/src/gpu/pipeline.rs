//! The cuZK pipeline as a sequence of compute dispatches.
//!
//! Every intermediate lives in a backend buffer. The host touches the data only to upload
//! inputs, to check the decomposition carry flags, and to read back the final point.

use std::cell::RefCell;

use num::BigUint;
use strum::IntoEnumIterator;
use tracing::{span, Level};

use super::backend::{Binding, BufferId, ComputeBackend, Grid};
use super::shader::{Access, KernelKind, KernelManifest, KernelParams, WORKGROUP_SIZE};
use super::wire::{affine_points_to_words, read_point, scalars_to_words};
use crate::curve::{AffinePoint, CurveContext};
use crate::msm::config::MsmConfig;
use crate::msm::decompose::check_scalar_widths;
use crate::utils::errors::MsmError;

/// Owns every buffer the pipeline allocates and releases them all when dropped, whether the
/// run finished or bailed out part way.
struct Stages<'a, B: ComputeBackend> {
    backend: &'a B,
    params: KernelParams,
    allocated: RefCell<Vec<BufferId>>,
}

impl<'a, B: ComputeBackend> Stages<'a, B> {
    fn new(backend: &'a B, params: KernelParams) -> Self {
        Self {
            backend,
            params,
            allocated: RefCell::new(Vec::new()),
        }
    }

    fn track(&self, buffer: BufferId) -> BufferId {
        self.allocated.borrow_mut().push(buffer);
        buffer
    }

    fn upload(&self, words: &[u32]) -> Result<BufferId, MsmError> {
        let buffer = self.track(self.backend.create_buffer(words.len())?);
        self.backend.write_buffer(buffer, words)?;
        Ok(buffer)
    }

    /// Dispatches `kind` over `reads` and returns its freshly allocated outputs in layout
    /// order.
    fn run<const N: usize>(
        &self,
        kind: KernelKind,
        reads: &[BufferId],
    ) -> Result<[BufferId; N], MsmError> {
        let _guard = span!(Level::INFO, "stage", kernel = %kind).entered();
        let kernel = self
            .backend
            .compile(&KernelManifest::new(kind, &self.params)?)?;

        let mut bindings: Vec<Binding> = reads.iter().copied().map(Binding::Read).collect();
        let mut outputs = Vec::with_capacity(N);
        for (index, slot) in self.params.layout(kind).iter().enumerate() {
            if let Access::Write { stride } = slot.access {
                let len = self.params.output_len(kind, index);
                let buffer = self.track(self.backend.create_buffer(len)?);
                bindings.push(Binding::Write { buffer, stride });
                outputs.push(buffer);
            }
        }

        let grid = Grid::covering(self.params.invocations(kind), WORKGROUP_SIZE);
        self.backend.dispatch(kernel, &bindings, grid)?;
        outputs
            .try_into()
            .map_err(|_| MsmError::Backend(format!("{kind} does not write {N} buffers")))
    }
}

impl<B: ComputeBackend> Drop for Stages<'_, B> {
    fn drop(&mut self) {
        for buffer in self.allocated.get_mut().drain(..) {
            if let Err(err) = self.backend.release_buffer(buffer) {
                tracing::warn!(buffer = buffer.0, %err, "failed to release buffer");
            }
        }
    }
}

/// Σ scalars[i] · points[i] with every stage executed by `backend`.
#[tracing::instrument(skip_all, name = "gpu_msm", fields(backend = backend.name(), n = points.len()))]
pub fn gpu_msm<B: ComputeBackend>(
    backend: &B,
    ctx: &CurveContext,
    points: &[AffinePoint],
    scalars: &[BigUint],
    config: &MsmConfig,
) -> Result<AffinePoint, MsmError> {
    if points.len() != scalars.len() {
        return Err(MsmError::LengthMismatch(points.len(), scalars.len()));
    }
    config.validate()?;
    if points.is_empty() {
        return Ok(AffinePoint::identity());
    }
    check_scalar_widths(scalars, config)?;

    let stages = Stages::new(backend, KernelParams::new(ctx, config, points.len())?);
    let params = &stages.params;
    tracing::debug!(
        stages = KernelKind::iter().count(),
        num_words = params.num_words(),
        variant = ?params.variant,
        "launching pipeline"
    );

    let points_in = stages.upload(&affine_points_to_words(points, &ctx.field))?;
    let scalars_in = stages.upload(&scalars_to_words(scalars, params.scalar_words())?)?;

    let [points] = stages.run::<1>(KernelKind::ConvertPoints, &[points_in])?;
    let [digits, carry_flags] = stages.run::<2>(KernelKind::DecomposeScalars, &[scalars_in])?;
    if let Some(index) = backend.read_buffer(carry_flags)?.iter().position(|&f| f != 0) {
        return Err(MsmError::FinalCarry { index });
    }

    let [ell_data, ell_col_idx, ell_row_len] =
        stages.run::<3>(KernelKind::BuildSparseMatrix, &[points, digits])?;
    let [col_ptr, _row_idx, csc_data] = stages.run::<3>(
        KernelKind::Transpose,
        &[ell_col_idx, ell_row_len, ell_data],
    )?;
    let [buckets] = stages.run::<1>(KernelKind::Smvp, &[col_ptr, csc_data])?;
    let [block_sums] = stages.run::<1>(KernelKind::BucketReduction, &[buckets])?;
    let [window_sums] = stages.run::<1>(KernelKind::ReduceBlocks, &[block_sums])?;
    let [result] = stages.run::<1>(KernelKind::Horner, &[window_sums])?;

    let words = backend.read_buffer(result)?;
    let point = read_point(&words, params.num_words());
    Ok(ctx.mont_curve_with(params.variant).to_affine(&point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveParams;
    use crate::field::MontgomeryVariant;
    use crate::gpu::host::HostBackend;
    use crate::msm::config::{DigitEncoding, ReductionStrategy};
    use crate::msm::{cuzk_msm, naive_msm};
    use crate::utils::random::{random_points, random_scalars};
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn host_pipeline_matches_cpu() {
        let mut rng = ChaCha20Rng::seed_from_u64(71);
        let backend = HostBackend::new(None).unwrap();
        let configs = [
            MsmConfig::new(5).with_num_rows(4),
            MsmConfig::new(4)
                .with_encoding(DigitEncoding::Unsigned)
                .with_num_rows(3),
            MsmConfig::new(6)
                .with_num_rows(2)
                .with_reduction(ReductionStrategy::Parallel { num_blocks: 5 })
                .with_montgomery_variant(MontgomeryVariant::Iterative),
        ];
        for curve in [CurveParams::ed_on_bls12_377(), CurveParams::baby_jubjub()] {
            let ctx = CurveContext::new(curve, 13).unwrap();
            let points = random_points(&mut rng, &ctx, 21);
            let scalars = random_scalars(&mut rng, &ctx, 21);
            let expected = naive_msm(&ctx, &points, &scalars).unwrap();
            for config in &configs {
                let config = config.clone().with_scalar_bits(ctx.curve.scalar_bits());
                assert_eq!(
                    gpu_msm(&backend, &ctx, &points, &scalars, &config).unwrap(),
                    expected
                );
                assert_eq!(
                    cuzk_msm(&ctx, &points, &scalars, &config).unwrap(),
                    expected
                );
            }
        }
    }

    #[test]
    fn single_point_and_empty_input() {
        let backend = HostBackend::new(Some(1)).unwrap();
        let ctx = CurveContext::new(CurveParams::ed_on_bls12_377(), 14).unwrap();
        let g = ctx.curve.generator.clone();
        let config = MsmConfig::new(8).with_num_rows(1);

        let one = gpu_msm(&backend, &ctx, &[g.clone()], &[BigUint::from(1u32)], &config);
        assert_eq!(one.unwrap(), g);
        let zero = gpu_msm(&backend, &ctx, &[g.clone()], &[BigUint::from(0u32)], &config);
        assert!(zero.unwrap().is_identity());
        assert!(gpu_msm(&backend, &ctx, &[], &[], &config)
            .unwrap()
            .is_identity());
        assert_eq!(
            gpu_msm(&backend, &ctx, &[g], &[], &config),
            Err(MsmError::LengthMismatch(1, 0))
        );
    }

    #[test]
    fn carry_flags_surface_as_errors() {
        let backend = HostBackend::new(Some(1)).unwrap();
        let ctx = CurveContext::new(CurveParams::ed_on_bls12_377(), 13).unwrap();
        let g = ctx.curve.generator.clone();
        // Two 2-bit windows cannot hold 15 in signed form.
        let config = MsmConfig::new(2).with_scalar_bits(4).with_num_subtasks(2);
        let scalars = [BigUint::from(1u32), BigUint::from(15u32)];
        assert_eq!(
            gpu_msm(&backend, &ctx, &[g.clone(), g], &scalars, &config),
            Err(MsmError::FinalCarry { index: 1 })
        );
        assert_eq!(backend.live_buffers().unwrap(), 0);
    }

    #[test]
    fn repeated_runs_reuse_kernels_and_free_buffers() {
        let mut rng = ChaCha20Rng::seed_from_u64(72);
        let backend = HostBackend::new(Some(2)).unwrap();
        let ctx = CurveContext::new(CurveParams::ed_on_bls12_377(), 13).unwrap();
        let points = random_points(&mut rng, &ctx, 16);
        let scalars = random_scalars(&mut rng, &ctx, 16);
        let config = MsmConfig::for_input_size(16).with_scalar_bits(ctx.curve.scalar_bits());
        let expected = naive_msm(&ctx, &points, &scalars).unwrap();

        for _ in 0..3 {
            assert_eq!(
                gpu_msm(&backend, &ctx, &points, &scalars, &config).unwrap(),
                expected
            );
            assert_eq!(backend.live_buffers().unwrap(), 0);
            assert_eq!(backend.num_kernels().unwrap(), KernelKind::iter().count());
        }

        // Buffers the caller owns are left alone.
        let held = backend.create_buffer(4).unwrap();
        gpu_msm(&backend, &ctx, &points, &scalars, &config).unwrap();
        assert_eq!(backend.live_buffers().unwrap(), 1);
        assert_eq!(backend.read_buffer(held).unwrap(), vec![0; 4]);
    }
}
