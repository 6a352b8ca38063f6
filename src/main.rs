use std::any::Any;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cuzk_core::curve::{CurveContext, CurveParams, CurvePreset};
use cuzk_core::msm::config::{DigitEncoding, ExecutionMode, MsmConfig, ReductionStrategy};
use cuzk_core::msm::{cuzk_msm, naive_msm};
use cuzk_core::utils::random::{random_points, random_scalars};
use cuzk_core::{gpu_msm, AffinePoint, HostBackend};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::{self, fmt::format::FmtSpan, prelude::*, EnvFilter};

/// Runs the sparse-matrix MSM on random instances.
#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// One MSM with plain logging
    Run(MsmArgs),
    /// One MSM with span timings and optional Chrome traces
    Profile(ProfileArgs),
}

#[derive(Args, Debug, Clone)]
struct MsmArgs {
    /// Number of points as 2^log_n
    #[clap(short = 'n', long, default_value_t = 12)]
    log_n: usize,

    /// Window width in bits. Derived from the input size if not supplied.
    #[clap(short, long)]
    chunk_size: Option<usize>,

    /// Rows of the sparse matrix. Derived from the input size if not supplied.
    #[clap(short, long)]
    rows: Option<usize>,

    /// Limb width in bits (8..=15)
    #[clap(short, long, default_value_t = 13)]
    word_size: usize,

    #[clap(long, value_enum, default_value_t = Curve::EdOnBls12_377)]
    curve: Curve,

    #[clap(long, value_enum, default_value_t = Encoding::Signed)]
    encoding: Encoding,

    #[clap(short, long, value_enum, default_value_t = Backend::Cpu)]
    backend: Backend,

    /// Split each window's bucket reduction into this many blocks
    #[clap(long)]
    blocks: Option<usize>,

    /// Check the result against double-and-add
    #[clap(long)]
    verify: bool,

    #[clap(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args, Debug, Clone)]
struct ProfileArgs {
    #[clap(flatten)]
    msm: MsmArgs,

    /// Output formats
    #[clap(short, long, value_enum)]
    format: Option<Vec<Format>>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
enum Curve {
    #[value(name = "ed-on-bls12-377")]
    EdOnBls12_377,
    BabyJubjub,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
enum Encoding {
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
enum Backend {
    Cpu,
    HostGpu,
}

#[derive(Debug, Clone, ValueEnum, PartialEq)]
enum Format {
    Default,
    Chrome,
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(msm) => trace(ProfileArgs { msm, format: None }),
        Commands::Profile(args) => trace(args),
    }
}

fn trace(args: ProfileArgs) -> eyre::Result<()> {
    let mut layers = Vec::new();

    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(log_filter)
        .boxed();
    layers.push(log_layer);

    let mut guards: Vec<Box<dyn Any>> = vec![];

    if let Some(format) = &args.format {
        if format.contains(&Format::Default) {
            let collector_layer = tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .compact()
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .boxed();
            layers.push(collector_layer);
        }
        if format.contains(&Format::Chrome) {
            let (chrome_layer, guard) = ChromeLayerBuilder::new().include_args(true).build();
            layers.push(chrome_layer.boxed());
            guards.push(Box::new(guard));
            tracing::info!("Running tracing-chrome. Files will be saved as trace-<some timestamp>.json and can be viewed in https://ui.perfetto.dev/");
        }
    }

    tracing_subscriber::registry().with(layers).init();
    let span = tracing::info_span!("msm", log_n = args.msm.log_n);
    span.in_scope(|| run_msm(&args.msm))
}

fn config_for(args: &MsmArgs, ctx: &CurveContext, n: usize) -> MsmConfig {
    let mut config = match args.chunk_size {
        Some(chunk_size) => MsmConfig::new(chunk_size),
        None => MsmConfig::for_input_size(n),
    }
    .with_encoding(match args.encoding {
        Encoding::Signed => DigitEncoding::Signed,
        Encoding::Unsigned => DigitEncoding::Unsigned,
    })
    .with_scalar_bits(ctx.curve.scalar_bits())
    .with_execution(ExecutionMode::Parallel);
    if let Some(rows) = args.rows {
        config = config.with_num_rows(rows);
    }
    if let Some(num_blocks) = args.blocks {
        config = config.with_reduction(ReductionStrategy::Parallel { num_blocks });
    }
    config
}

fn run_msm(args: &MsmArgs) -> eyre::Result<()> {
    let preset = match args.curve {
        Curve::EdOnBls12_377 => CurvePreset::EdOnBls12_377,
        Curve::BabyJubjub => CurvePreset::BabyJubjub,
    };
    let ctx = CurveContext::new(CurveParams::from_preset(preset), args.word_size)?;
    let n = 1usize << args.log_n;

    let mut rng = ChaCha20Rng::seed_from_u64(args.seed);
    let (points, scalars) = tracing::info_span!("generate_instance", n).in_scope(|| {
        (
            random_points(&mut rng, &ctx, n),
            random_scalars(&mut rng, &ctx, n),
        )
    });
    let config = config_for(args, &ctx, n);
    tracing::info!(
        curve = ctx.curve.name,
        chunk_size = config.chunk_size,
        num_subtasks = config.num_subtasks,
        num_rows = config.num_rows,
        backend = ?args.backend,
        "starting msm"
    );

    let start = Instant::now();
    let result: AffinePoint = match args.backend {
        Backend::Cpu => cuzk_msm(&ctx, &points, &scalars, &config)?,
        Backend::HostGpu => {
            let backend = HostBackend::new(None)?;
            gpu_msm(&backend, &ctx, &points, &scalars, &config)?
        }
    };
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "msm complete");
    println!("x = {}", result.x);
    println!("y = {}", result.y);

    if args.verify {
        let expected = naive_msm(&ctx, &points, &scalars)?;
        eyre::ensure!(
            expected == result,
            "cuzk result differs from the double-and-add reference"
        );
        tracing::info!("result verified");
    }
    Ok(())
}
