use criterion::Criterion;
use cuzk_core::curve::CurveContext;
use cuzk_core::msm::config::{ExecutionMode, MsmConfig, ReductionStrategy};
use cuzk_core::msm::cuzk_msm;
use cuzk_core::utils::random::{random_points, random_scalars};
use cuzk_core::{gpu_msm, AffinePoint, CurveParams, HostBackend};
use num::BigUint;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

const WORD_SIZE: usize = 13;

fn setup_bench(ctx: &CurveContext, log_n: usize) -> (Vec<AffinePoint>, Vec<BigUint>) {
    let mut rng = ChaCha20Rng::seed_from_u64(log_n as u64);
    let n = 1 << log_n;
    (
        random_points(&mut rng, ctx, n),
        random_scalars(&mut rng, ctx, n),
    )
}

fn benchmark_cuzk(c: &mut Criterion, ctx: &CurveContext, log_n: usize) {
    let (points, scalars) = setup_bench(ctx, log_n);
    let base = MsmConfig::for_input_size(points.len()).with_scalar_bits(ctx.curve.scalar_bits());
    let serial = base.clone();
    let parallel = base
        .clone()
        .with_execution(ExecutionMode::Parallel)
        .with_reduction(ReductionStrategy::Parallel { num_blocks: 16 });
    let backend = HostBackend::new(None).unwrap();

    c.bench_function(&format!("cuzk_msm 2^{log_n} [serial]"), |b| {
        b.iter(|| cuzk_msm(ctx, &points, &scalars, &serial).unwrap())
    });
    c.bench_function(&format!("cuzk_msm 2^{log_n} [parallel]"), |b| {
        b.iter(|| cuzk_msm(ctx, &points, &scalars, &parallel).unwrap())
    });
    c.bench_function(&format!("gpu_msm 2^{log_n} [host]"), |b| {
        b.iter(|| gpu_msm(&backend, ctx, &points, &scalars, &parallel).unwrap())
    });
}

fn main() {
    let ctx = CurveContext::new(CurveParams::ed_on_bls12_377(), WORD_SIZE).unwrap();
    let mut criterion = Criterion::default()
        .configure_from_args()
        .sample_size(10)
        .warm_up_time(std::time::Duration::from_secs(5));
    for log_n in [8, 10, 12] {
        benchmark_cuzk(&mut criterion, &ctx, log_n);
    }
    criterion.final_summary();
}
