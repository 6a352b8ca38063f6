//! Data-parallel execution of the cuZK pipeline behind a compute-backend contract.
//!
//! [`shader`] turns a curve, field and [`MsmConfig`](crate::msm::MsmConfig) into one kernel
//! manifest per stage, [`wire`] fixes how points and scalars are laid out as `u32` words, and
//! [`pipeline::gpu_msm`] chains the stages through any [`ComputeBackend`]. [`HostBackend`]
//! executes the stage bodies in [`kernels`] on a rayon pool.

pub mod backend;
pub mod host;
pub mod kernels;
pub mod pipeline;
pub mod shader;
pub mod wire;

pub use backend::{Binding, BufferId, ComputeBackend, DispatchHandle, Grid, KernelId};
pub use host::HostBackend;
pub use pipeline::gpu_msm;
pub use shader::{KernelKind, KernelManifest, KernelParams, WORKGROUP_SIZE};
