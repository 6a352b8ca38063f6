//! The compute-backend contract the GPU pipeline is written against.

use super::shader::KernelManifest;
use crate::utils::errors::MsmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelId(pub usize);

/// How a buffer is attached to a dispatch. Writes name the number of words each invocation
/// owns, so every invocation's output slot is disjoint from every other's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    Read(BufferId),
    Write { buffer: BufferId, stride: usize },
}

impl Binding {
    pub fn buffer(&self) -> BufferId {
        match self {
            Binding::Read(buffer) | Binding::Write { buffer, .. } => *buffer,
        }
    }
}

/// Dispatch size in workgroups; only the x dimension is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    pub workgroups: u32,
    pub workgroup_size: u32,
}

impl Grid {
    /// Enough workgroups to cover `invocations`.
    pub fn covering(invocations: usize, workgroup_size: u32) -> Self {
        Self {
            workgroups: invocations.div_ceil(workgroup_size as usize) as u32,
            workgroup_size,
        }
    }

    pub fn threads(&self) -> usize {
        self.workgroups as usize * self.workgroup_size as usize
    }
}

/// Returned once a dispatch has run to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchHandle {
    pub kernel: KernelId,
    pub invocations: usize,
}

/// Buffers are flat `u32` arrays. All calls block until the work they describe is done.
///
/// A buffer lives until it is released; using a released id is an error. Compiling the same
/// manifest twice may return the same kernel.
pub trait ComputeBackend: Send + Sync {
    fn name(&self) -> &str;

    fn create_buffer(&self, len: usize) -> Result<BufferId, MsmError>;

    fn release_buffer(&self, buffer: BufferId) -> Result<(), MsmError>;

    fn write_buffer(&self, buffer: BufferId, words: &[u32]) -> Result<(), MsmError>;

    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u32>, MsmError>;

    fn compile(&self, manifest: &KernelManifest) -> Result<KernelId, MsmError>;

    fn dispatch(
        &self,
        kernel: KernelId,
        bindings: &[Binding],
        grid: Grid,
    ) -> Result<DispatchHandle, MsmError>;

    fn upload(&self, words: &[u32]) -> Result<BufferId, MsmError> {
        let buffer = self.create_buffer(words.len())?;
        self.write_buffer(buffer, words)?;
        Ok(buffer)
    }
}
