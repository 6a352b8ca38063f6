//! Typed kernel parameters and the WGSL declarations generated from them.
//!
//! Every constant a stage bakes in comes from [`KernelParams`], which in turn reads the
//! limb constants from [`FieldParams`](crate::field::FieldParams). A backend compiles
//! nothing from text: it re-renders the prelude from the parameters and rejects any mismatch.

use std::fmt::{self, Write};

use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::curve::CurveContext;
use crate::field::limbs::to_limbs;
use crate::field::MontgomeryVariant;
use crate::msm::config::{MsmConfig, ReductionStrategy};
use crate::msm::sparse_matrix::row_capacity;
use crate::utils::errors::MsmError;

pub const WORKGROUP_SIZE: u32 = 64;

/// One compute stage per variant. Stages run strictly in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum KernelKind {
    ConvertPoints,
    DecomposeScalars,
    BuildSparseMatrix,
    Transpose,
    Smvp,
    BucketReduction,
    ReduceBlocks,
    Horner,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    /// Each invocation owns `stride` consecutive words.
    Write { stride: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindingSlot {
    pub name: &'static str,
    pub access: Access,
}

const fn read(name: &'static str) -> BindingSlot {
    BindingSlot {
        name,
        access: Access::Read,
    }
}

const fn write(name: &'static str, stride: usize) -> BindingSlot {
    BindingSlot {
        name,
        access: Access::Write { stride },
    }
}

/// Everything a kernel is specialised on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelParams {
    pub ctx: CurveContext,
    pub config: MsmConfig,
    pub variant: MontgomeryVariant,
    pub num_points: usize,
}

impl KernelParams {
    pub fn new(ctx: &CurveContext, config: &MsmConfig, num_points: usize) -> Result<Self, MsmError> {
        config.validate()?;
        if num_points == 0 {
            return Err(MsmError::InvalidConfig(
                "kernels need at least one point".into(),
            ));
        }
        Ok(Self {
            ctx: ctx.clone(),
            config: config.clone(),
            variant: config
                .montgomery_variant
                .unwrap_or_else(|| ctx.field.montgomery_variant()),
            num_points,
        })
    }

    pub fn num_words(&self) -> usize {
        self.ctx.field.num_words
    }

    /// Words per serialized point: x, y, t, z.
    pub fn point_words(&self) -> usize {
        4 * self.num_words()
    }

    pub fn scalar_words(&self) -> usize {
        self.config.scalar_bits.div_ceil(32)
    }

    pub fn row_capacity(&self) -> usize {
        row_capacity(self.num_points, self.config.num_rows)
    }

    /// ELL slots per subtask.
    pub fn slots_per_subtask(&self) -> usize {
        self.config.num_rows * self.row_capacity()
    }

    pub fn num_blocks(&self) -> usize {
        match self.config.reduction {
            ReductionStrategy::RunningSum => 1,
            ReductionStrategy::Parallel { num_blocks } => num_blocks,
        }
    }

    /// How many invocations a stage needs; each owns one output slot per write binding.
    pub fn invocations(&self, kind: KernelKind) -> usize {
        let k = self.config.num_subtasks;
        match kind {
            KernelKind::ConvertPoints | KernelKind::DecomposeScalars => self.num_points,
            KernelKind::BuildSparseMatrix => k * self.config.num_rows,
            KernelKind::Transpose | KernelKind::ReduceBlocks => k,
            KernelKind::Smvp => k * self.config.num_buckets(),
            KernelKind::BucketReduction => k * self.num_blocks(),
            KernelKind::Horner => 1,
        }
    }

    /// Bindings in declaration order: all reads first, then all writes.
    pub fn layout(&self, kind: KernelKind) -> Vec<BindingSlot> {
        let pw = self.point_words();
        let cap = self.row_capacity();
        let slots = self.slots_per_subtask();
        match kind {
            KernelKind::ConvertPoints => vec![read("points_in"), write("points", pw)],
            KernelKind::DecomposeScalars => vec![
                read("scalars"),
                write("digits", self.config.num_subtasks),
                write("carry_flags", 1),
            ],
            KernelKind::BuildSparseMatrix => vec![
                read("points"),
                read("digits"),
                write("ell_data", cap * pw),
                write("ell_col_idx", cap),
                write("ell_row_len", 1),
            ],
            KernelKind::Transpose => vec![
                read("ell_col_idx"),
                read("ell_row_len"),
                read("ell_data"),
                write("csc_col_ptr", self.config.num_columns() + 1),
                write("csc_row_idx", slots),
                write("csc_data", slots * pw),
            ],
            KernelKind::Smvp => vec![
                read("csc_col_ptr"),
                read("csc_data"),
                write("buckets", pw),
            ],
            KernelKind::BucketReduction => vec![read("buckets"), write("block_sums", pw)],
            KernelKind::ReduceBlocks => vec![read("block_sums"), write("window_sums", pw)],
            KernelKind::Horner => vec![read("window_sums"), write("result", pw)],
        }
    }

    /// Words a write binding must provide: one stride per invocation.
    pub fn output_len(&self, kind: KernelKind, binding: usize) -> usize {
        match self.layout(kind)[binding].access {
            Access::Write { stride } => stride * self.invocations(kind),
            Access::Read => 0,
        }
    }
}

fn limb_array(out: &mut String, name: &str, limbs: &[u32]) -> fmt::Result {
    let body = limbs
        .iter()
        .map(|limb| format!("{limb}u"))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        out,
        "const {name}: array<u32, {len}> = array<u32, {len}>({body});",
        len = limbs.len()
    )
}

fn write_prelude(out: &mut String, kind: KernelKind, params: &KernelParams) -> fmt::Result {
    let field = &params.ctx.field;
    let curve = &params.ctx.curve;
    let config = &params.config;
    let mont = |x: &num::BigUint| {
        to_limbs(
            &field.to_montgomery(&(x % &field.modulus)),
            field.num_words,
            field.word_size,
        )
    };
    let variant: &'static str = params.variant.into();
    let name: &'static str = kind.into();

    writeln!(out, "// cuzk {name} over {}", curve.name)?;
    writeln!(out, "// montgomery variant: {variant}")?;
    let constants = [
        ("WORD_SIZE", field.word_size),
        ("NUM_WORDS", field.num_words),
        ("MASK", field.mask as usize),
        ("N0", field.n0 as usize),
        ("NSAFE", field.nsafe),
        ("MODULUS_BITS", field.modulus_bits),
        ("NUM_POINTS", params.num_points),
        ("SCALAR_WORDS", params.scalar_words()),
        ("CHUNK_SIZE", config.chunk_size),
        ("NUM_SUBTASKS", config.num_subtasks),
        ("NUM_ROWS", config.num_rows),
        ("ROW_CAPACITY", params.row_capacity()),
        ("NUM_COLUMNS", config.num_columns()),
        ("INDEX_SHIFT", config.index_shift() as usize),
        ("NUM_BUCKETS", config.num_buckets()),
        ("NUM_BLOCKS", params.num_blocks()),
        ("WORKGROUP_SIZE", WORKGROUP_SIZE as usize),
        ("INVOCATIONS", params.invocations(kind)),
    ];
    for (constant, value) in constants {
        writeln!(out, "const {constant}: u32 = {value}u;")?;
    }
    writeln!(out, "const A_IS_MINUS_ONE: bool = {};", curve.a_is_minus_one())?;
    limb_array(out, "P", &field.modulus_limbs)?;
    limb_array(out, "R", &field.r_limbs)?;
    limb_array(out, "R_SQUARED", &field.r_squared_limbs)?;
    limb_array(out, "BARRETT_M", &field.barrett_m_limbs)?;
    limb_array(out, "EDWARDS_A", &mont(&curve.a))?;
    limb_array(out, "EDWARDS_D", &mont(&curve.d))?;

    for (binding, slot) in params.layout(kind).iter().enumerate() {
        let access = match slot.access {
            Access::Read => "read",
            Access::Write { .. } => "read_write",
        };
        writeln!(
            out,
            "@group(0) @binding({binding}) var<storage, {access}> {}: array<u32>;",
            slot.name
        )?;
    }
    Ok(())
}

/// WGSL module-scope declarations for one stage: constants, limb arrays and storage
/// bindings. It holds no functions; a backend links the `{kind}` stage body against it.
pub fn render_prelude(kind: KernelKind, params: &KernelParams) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_prelude(&mut out, kind, params)?;
    Ok(out)
}

/// What a stage is specialised on, handed to
/// [`ComputeBackend::compile`](super::backend::ComputeBackend::compile).
///
/// This is a parameter manifest, not a runnable shader. `prelude` is the declaration block
/// a WGSL backend would prepend to its `kind` stage body, and a backend that executes the
/// stages natively, such as [`HostBackend`](super::host::HostBackend), only checks that the
/// text still agrees with `params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelManifest {
    pub kind: KernelKind,
    pub params: KernelParams,
    pub prelude: String,
}

impl KernelManifest {
    pub fn new(kind: KernelKind, params: &KernelParams) -> Result<Self, MsmError> {
        let prelude = render_prelude(kind, params)
            .map_err(|_| MsmError::Backend(format!("failed to render the {kind} prelude")))?;
        Ok(Self {
            kind,
            prelude,
            params: params.clone(),
        })
    }

    pub fn is_consistent(&self) -> bool {
        render_prelude(self.kind, &self.params).is_ok_and(|prelude| prelude == self.prelude)
    }
}
