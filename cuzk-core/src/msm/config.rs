use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::field::MontgomeryVariant;
use crate::utils::errors::MsmError;
use crate::utils::math::{ln_without_floats, Math};

pub const DEFAULT_SCALAR_BITS: usize = 256;
pub const DEFAULT_NUM_ROWS: usize = 16;
pub const MAX_CHUNK_SIZE: usize = 16;

/// How a scalar's windows are turned into bucket indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DigitEncoding {
    /// Digits in (-2^(c-1), 2^(c-1)], shifted by 2^(c-1). Halves the bucket count.
    #[default]
    Signed,
    /// Digits in [0, 2^c), used directly as bucket indices.
    Unsigned,
}

/// Whether matrix rows are built by one thread or one rayon task per row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReductionStrategy {
    #[default]
    RunningSum,
    /// Contiguous blocks reduced independently and recombined with their offsets.
    Parallel { num_blocks: usize },
}

/// Shape of one MSM run. `chunk_size` is the window width c, `num_subtasks` the number of
/// windows k.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsmConfig {
    pub chunk_size: usize,
    pub num_subtasks: usize,
    pub num_rows: usize,
    pub encoding: DigitEncoding,
    pub execution: ExecutionMode,
    pub reduction: ReductionStrategy,
    pub scalar_bits: usize,
    /// Overrides the variant chosen from nsafe when running in Montgomery form.
    pub montgomery_variant: Option<MontgomeryVariant>,
}

impl MsmConfig {
    pub fn new(chunk_size: usize) -> Self {
        let mut config = Self {
            chunk_size,
            num_subtasks: 0,
            num_rows: DEFAULT_NUM_ROWS,
            encoding: DigitEncoding::default(),
            execution: ExecutionMode::default(),
            reduction: ReductionStrategy::default(),
            scalar_bits: DEFAULT_SCALAR_BITS,
            montgomery_variant: None,
        };
        config.num_subtasks = config.min_subtasks();
        config
    }

    /// Window width heuristic: 16 bits from 2^16 points on, log-based below that.
    pub fn for_input_size(n: usize) -> Self {
        let chunk_size = if n >= 1 << 16 {
            16
        } else if n < 32 {
            3
        } else {
            ln_without_floats(n) + 2
        };
        Self::new(chunk_size).with_num_rows(n.clamp(1, DEFAULT_NUM_ROWS))
    }

    pub fn with_encoding(mut self, encoding: DigitEncoding) -> Self {
        self.encoding = encoding;
        self.num_subtasks = self.min_subtasks();
        self
    }

    pub fn with_scalar_bits(mut self, scalar_bits: usize) -> Self {
        self.scalar_bits = scalar_bits;
        self.num_subtasks = self.min_subtasks();
        self
    }

    pub fn with_num_subtasks(mut self, num_subtasks: usize) -> Self {
        self.num_subtasks = num_subtasks;
        self
    }

    pub fn with_num_rows(mut self, num_rows: usize) -> Self {
        self.num_rows = num_rows;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_reduction(mut self, reduction: ReductionStrategy) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_montgomery_variant(mut self, variant: MontgomeryVariant) -> Self {
        self.montgomery_variant = Some(variant);
        self
    }

    /// Fewest windows that cover `scalar_bits`; signed digits need room for the final carry.
    pub fn min_subtasks(&self) -> usize {
        if self.chunk_size == 0 {
            return 0;
        }
        match self.encoding {
            DigitEncoding::Signed => (self.scalar_bits + 1).div_ceil(self.chunk_size),
            DigitEncoding::Unsigned => self.scalar_bits.div_ceil(self.chunk_size),
        }
    }

    /// 2^(c-1) for signed digits, the index that encodes digit value zero.
    pub fn index_shift(&self) -> u32 {
        match self.encoding {
            DigitEncoding::Signed => 1 << (self.chunk_size - 1),
            DigitEncoding::Unsigned => 0,
        }
    }

    /// Matrix columns. Signed indices span [1, 2^c]; column 0 stays empty in both encodings.
    pub fn num_columns(&self) -> usize {
        match self.encoding {
            DigitEncoding::Signed => self.chunk_size.pow2() + 1,
            DigitEncoding::Unsigned => self.chunk_size.pow2(),
        }
    }

    /// Length of a bucket array, including the unused slot 0.
    pub fn num_buckets(&self) -> usize {
        match self.encoding {
            DigitEncoding::Signed => self.num_columns() / 2 + 1,
            DigitEncoding::Unsigned => self.num_columns(),
        }
    }

    pub fn validate(&self) -> Result<(), MsmError> {
        if !(2..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(MsmError::InvalidConfig(format!(
                "chunk size {} outside 2..={MAX_CHUNK_SIZE}",
                self.chunk_size
            )));
        }
        if self.scalar_bits == 0 {
            return Err(MsmError::InvalidConfig("scalar_bits must be positive".into()));
        }
        if self.num_subtasks * self.chunk_size < self.scalar_bits {
            return Err(MsmError::InvalidConfig(format!(
                "{} subtasks of {} bits cannot cover {}-bit scalars",
                self.num_subtasks, self.chunk_size, self.scalar_bits
            )));
        }
        if self.num_rows == 0 {
            return Err(MsmError::InvalidConfig("num_rows must be positive".into()));
        }
        if let ReductionStrategy::Parallel { num_blocks: 0 } = self.reduction {
            return Err(MsmError::InvalidConfig("num_blocks must be positive".into()));
        }
        Ok(())
    }
}

impl Default for MsmConfig {
    fn default() -> Self {
        Self::new(13)
    }
}
