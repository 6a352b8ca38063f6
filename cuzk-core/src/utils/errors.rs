use core::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MsmError {
    #[error("Length mismatch: {0} points but {1} scalars")]
    LengthMismatch(usize, usize),
    #[error("Scalar #{index} has {bits} bits, decomposition covers only {max_bits}")]
    ScalarTooLarge {
        index: usize,
        bits: usize,
        max_bits: usize,
    },
    #[error("Signed decomposition of scalar #{index} left a carry past the most significant digit")]
    FinalCarry { index: usize },
    #[error("Bucket index {index} outside of the declared {num_columns} columns")]
    BucketIndexOutOfRange { index: u32, num_columns: usize },
    #[error("Unsupported word size {0}, expected a value in 8..=15")]
    UnsupportedWordSize(usize),
    #[error("Invalid modulus: {0}")]
    InvalidModulus(String),
    #[error("Invalid MSM configuration: {0}")]
    InvalidConfig(String),
    #[error("Input point #{index} is not on the curve")]
    PointNotOnCurve { index: usize },
    #[error("No usable compute backend: {0}")]
    BackendUnavailable(String),
    #[error("Compute backend error: {0}")]
    Backend(String),
}
