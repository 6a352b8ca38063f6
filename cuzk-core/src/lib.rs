#![allow(clippy::needless_range_loop)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::too_many_arguments)]

pub mod curve;
pub mod field;
pub mod gpu;
pub mod msm;
pub mod utils;

pub use curve::{AffinePoint, CurveContext, CurveParams, CurvePreset, ExtendedPoint};
pub use field::{FieldElement, FieldParams, MontgomeryVariant};
pub use gpu::{gpu_msm, ComputeBackend, HostBackend};
pub use msm::{cuzk_msm, naive_msm, DigitEncoding, ExecutionMode, MsmConfig, ReductionStrategy};
pub use utils::errors::MsmError;
