use num::BigUint;
use rayon::prelude::*;

use super::config::{DigitEncoding, MsmConfig};
use crate::utils::errors::MsmError;
use crate::utils::math::read_bits;

/// Bucket indices for every (subtask, point) pair, stored subtask-major:
/// `indices[subtask * num_points + point]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScalarDigits {
    pub num_points: usize,
    pub num_subtasks: usize,
    pub indices: Vec<u32>,
}

impl ScalarDigits {
    pub fn subtask(&self, subtask: usize) -> &[u32] {
        let start = subtask * self.num_points;
        &self.indices[start..start + self.num_points]
    }
}

/// Little-endian `c`-bit windows of a scalar given as 32-bit words.
pub fn unsigned_digits(words: &[u32], num_subtasks: usize, chunk_size: usize) -> Vec<u32> {
    (0..num_subtasks)
        .map(|i| read_bits(words, i * chunk_size, chunk_size))
        .collect()
}

/// Recodes unsigned windows into digits in (-2^(c-1), 2^(c-1)].
///
/// A window goes negative when it exceeds half the radix, borrowing one from the next
/// window. Returns `None` if a carry is left after the last window.
pub fn signed_digits(words: &[u32], num_subtasks: usize, chunk_size: usize) -> Option<Vec<i32>> {
    let radix = 1i64 << chunk_size;
    let half = radix / 2;
    let mut carry = 0i64;
    let digits = unsigned_digits(words, num_subtasks, chunk_size)
        .into_iter()
        .map(|d| {
            let t = d as i64 + carry;
            if t > half {
                carry = 1;
                (t - radix) as i32
            } else {
                carry = 0;
                t as i32
            }
        })
        .collect();
    (carry == 0).then_some(digits)
}

/// Digits of one scalar as bucket indices; `None` on a final carry.
pub fn scalar_bucket_indices(words: &[u32], config: &MsmConfig) -> Option<Vec<u32>> {
    match config.encoding {
        DigitEncoding::Unsigned => Some(unsigned_digits(
            words,
            config.num_subtasks,
            config.chunk_size,
        )),
        DigitEncoding::Signed => {
            let shift = config.index_shift() as i32;
            signed_digits(words, config.num_subtasks, config.chunk_size)
                .map(|digits| digits.into_iter().map(|d| (d + shift) as u32).collect())
        }
    }
}

/// Rejects any scalar wider than both the declared scalar width and the `k·c` bits the
/// windows cover.
pub fn check_scalar_widths(scalars: &[BigUint], config: &MsmConfig) -> Result<(), MsmError> {
    let max_bits = config.scalar_bits.min(config.num_subtasks * config.chunk_size);
    if let Some((index, scalar)) = scalars
        .iter()
        .enumerate()
        .find(|(_, s)| s.bits() as usize > max_bits)
    {
        return Err(MsmError::ScalarTooLarge {
            index,
            bits: scalar.bits() as usize,
            max_bits,
        });
    }
    Ok(())
}

/// Splits every scalar into `num_subtasks` bucket indices.
#[tracing::instrument(skip_all, fields(n = scalars.len()))]
pub fn decompose_scalars(
    scalars: &[BigUint],
    config: &MsmConfig,
) -> Result<ScalarDigits, MsmError> {
    check_scalar_widths(scalars, config)?;
    let per_scalar = scalars
        .par_iter()
        .enumerate()
        .map(|(index, scalar)| {
            scalar_bucket_indices(&scalar.to_u32_digits(), config)
                .ok_or(MsmError::FinalCarry { index })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let n = scalars.len();
    let mut indices = vec![0u32; n * config.num_subtasks];
    for (point, digits) in per_scalar.iter().enumerate() {
        for (subtask, &index) in digits.iter().enumerate() {
            indices[subtask * n + point] = index;
        }
    }
    Ok(ScalarDigits {
        num_points: n,
        num_subtasks: config.num_subtasks,
        indices,
    })
}
