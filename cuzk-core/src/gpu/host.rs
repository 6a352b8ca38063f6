//! Executes the compute contract on the host. A dispatch runs its invocations on a rayon
//! pool; each invocation is handed only its own slot of every write binding.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use itertools::Itertools;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::backend::{Binding, BufferId, ComputeBackend, DispatchHandle, Grid, KernelId};
use super::kernels::{self, KernelEnv};
use super::shader::{Access, BindingSlot, KernelManifest};
use crate::utils::errors::MsmError;

/// Live buffers by id. Ids are never reused, so a stale id cannot alias a newer buffer.
#[derive(Default)]
struct Buffers {
    next: usize,
    live: HashMap<usize, Vec<u32>>,
}

impl Buffers {
    fn get(&self, buffer: BufferId) -> Result<&Vec<u32>, MsmError> {
        self.live.get(&buffer.0).ok_or_else(|| unknown_buffer(buffer))
    }
}

pub struct HostBackend {
    buffers: Mutex<Buffers>,
    kernels: Mutex<Vec<KernelManifest>>,
    pool: ThreadPool,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, MsmError> {
    mutex
        .lock()
        .map_err(|_| MsmError::Backend("host backend state poisoned".into()))
}

fn unknown_buffer(buffer: BufferId) -> MsmError {
    MsmError::Backend(format!("unknown buffer {}", buffer.0))
}

impl HostBackend {
    /// `None` sizes the pool like rayon's global one.
    pub fn new(num_threads: Option<usize>) -> Result<Self, MsmError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("cuzk-host-{i}"));
        if let Some(num_threads) = num_threads {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder
            .build()
            .map_err(|e| MsmError::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            buffers: Mutex::new(Buffers::default()),
            kernels: Mutex::new(Vec::new()),
            pool,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Buffers created and not yet released.
    pub fn live_buffers(&self) -> Result<usize, MsmError> {
        Ok(lock(&self.buffers)?.live.len())
    }

    /// Distinct kernels compiled so far.
    pub fn num_kernels(&self) -> Result<usize, MsmError> {
        Ok(lock(&self.kernels)?.len())
    }
}

/// Bindings must follow the kernel's layout slot for slot, and no buffer may be bound twice.
fn check_bindings(
    layout: &[BindingSlot],
    bindings: &[Binding],
    buffers: &Buffers,
    invocations: usize,
) -> Result<(), MsmError> {
    if layout.len() != bindings.len() {
        return Err(MsmError::Backend(format!(
            "kernel declares {} bindings, dispatch supplied {}",
            layout.len(),
            bindings.len()
        )));
    }
    if !bindings.iter().map(Binding::buffer).all_unique() {
        return Err(MsmError::Backend("buffer bound more than once".into()));
    }
    for (slot, binding) in layout.iter().zip(bindings) {
        let words = buffers.get(binding.buffer())?;
        match (slot.access, *binding) {
            (Access::Read, Binding::Read(_)) => {}
            (Access::Write { stride }, Binding::Write { stride: bound, .. })
                if stride == bound && stride > 0 =>
            {
                if words.len() < invocations * stride {
                    return Err(MsmError::Backend(format!(
                        "{} holds {} words, {invocations} invocations need {}",
                        slot.name,
                        words.len(),
                        invocations * stride
                    )));
                }
            }
            _ => {
                return Err(MsmError::Backend(format!(
                    "binding {} does not match {:?}",
                    slot.name, slot.access
                )))
            }
        }
    }
    Ok(())
}

impl ComputeBackend for HostBackend {
    fn name(&self) -> &str {
        "host"
    }

    fn create_buffer(&self, len: usize) -> Result<BufferId, MsmError> {
        let mut buffers = lock(&self.buffers)?;
        let id = buffers.next;
        buffers.next += 1;
        buffers.live.insert(id, vec![0; len]);
        Ok(BufferId(id))
    }

    fn release_buffer(&self, buffer: BufferId) -> Result<(), MsmError> {
        lock(&self.buffers)?
            .live
            .remove(&buffer.0)
            .map(drop)
            .ok_or_else(|| unknown_buffer(buffer))
    }

    fn write_buffer(&self, buffer: BufferId, words: &[u32]) -> Result<(), MsmError> {
        let mut buffers = lock(&self.buffers)?;
        let target = buffers
            .live
            .get_mut(&buffer.0)
            .ok_or_else(|| unknown_buffer(buffer))?;
        if target.len() != words.len() {
            return Err(MsmError::Backend(format!(
                "buffer {} holds {} words, got {}",
                buffer.0,
                target.len(),
                words.len()
            )));
        }
        target.copy_from_slice(words);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u32>, MsmError> {
        lock(&self.buffers)?.get(buffer).cloned()
    }

    fn compile(&self, manifest: &KernelManifest) -> Result<KernelId, MsmError> {
        if !manifest.is_consistent() {
            return Err(MsmError::Backend(format!(
                "{} manifest does not match its parameters",
                manifest.kind
            )));
        }
        let mut kernels = lock(&self.kernels)?;
        if let Some(id) = kernels.iter().position(|kernel| kernel == manifest) {
            return Ok(KernelId(id));
        }
        kernels.push(manifest.clone());
        tracing::debug!(kernel = %manifest.kind, id = kernels.len() - 1, "compiled");
        Ok(KernelId(kernels.len() - 1))
    }

    #[tracing::instrument(skip_all, name = "HostBackend::dispatch")]
    fn dispatch(
        &self,
        kernel: KernelId,
        bindings: &[Binding],
        grid: Grid,
    ) -> Result<DispatchHandle, MsmError> {
        let manifest = lock(&self.kernels)?
            .get(kernel.0)
            .cloned()
            .ok_or_else(|| MsmError::Backend(format!("unknown kernel {}", kernel.0)))?;
        let kind = manifest.kind;
        let params = &manifest.params;
        // Threads past the declared invocation count exit immediately.
        let invocations = grid.threads().min(params.invocations(kind));

        let mut buffers = lock(&self.buffers)?;
        check_bindings(&params.layout(kind), bindings, &buffers, invocations)?;

        let mut writes: Vec<(BufferId, usize, Vec<u32>)> = bindings
            .iter()
            .filter_map(|binding| match *binding {
                Binding::Write { buffer, stride } => Some((buffer, stride)),
                Binding::Read(_) => None,
            })
            .map(|(buffer, stride)| {
                let words = buffers.live.remove(&buffer.0).unwrap_or_default();
                (buffer, stride, words)
            })
            .collect();

        {
            let inputs: Vec<&[u32]> = bindings
                .iter()
                .filter_map(|binding| match binding {
                    Binding::Read(buffer) => buffers.live.get(&buffer.0).map(Vec::as_slice),
                    Binding::Write { .. } => None,
                })
                .collect();

            let mut slots: Vec<Vec<&mut [u32]>> = (0..invocations)
                .map(|_| Vec::with_capacity(writes.len()))
                .collect();
            for (_, stride, words) in writes.iter_mut() {
                let owned = words[..invocations * *stride].chunks_mut(*stride);
                for (slot, chunk) in slots.iter_mut().zip(owned) {
                    slot.push(chunk);
                }
            }

            let env = KernelEnv::new(params);
            self.pool.install(|| {
                slots
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(id, outputs)| kernels::run(kind, &env, id, &inputs, outputs));
            });
        }

        for (buffer, _, words) in writes {
            buffers.live.insert(buffer.0, words);
        }
        tracing::debug!(
            kernel = %kind,
            workgroups = grid.workgroups,
            invocations,
            "dispatched"
        );
        Ok(DispatchHandle {
            kernel,
            invocations,
        })
    }
}
