//! Stream event and host-mapped flag word (raw driver API)

use cudarc::driver::safe::CudaContext;
use cudarc::driver::sys;
use std::ffi::c_void;
use std::sync::Arc;

use super::{bind, check};
use crate::error::Result;
use crate::runtime::MappedWord;

/// Timing-disabled CUDA event, reusable across recordings
pub struct CudaEvent {
    pub(crate) event: sys::CUevent,
    context: Arc<CudaContext>,
}

// SAFETY: CUevent handles are context-scoped, not thread-scoped; every use
// binds the owning context first.
unsafe impl Send for CudaEvent {}

impl CudaEvent {
    pub(crate) fn new(context: &Arc<CudaContext>) -> Result<Self> {
        bind(context)?;
        let mut event: sys::CUevent = std::ptr::null_mut();
        // SAFETY: `event` is a valid out-pointer and the context is current.
        let result = unsafe {
            sys::cuEventCreate(
                &mut event,
                sys::CUevent_flags::CU_EVENT_DISABLE_TIMING as u32,
            )
        };
        check(result, "Error creating event for CCMA")?;
        Ok(Self {
            event,
            context: context.clone(),
        })
    }
}

impl std::fmt::Debug for CudaEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaEvent")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

impl Drop for CudaEvent {
    fn drop(&mut self) {
        if let Err(e) = self.context.bind_to_thread() {
            tracing::warn!(error = ?e, "cannot bind CUDA context to destroy event");
            return;
        }
        // SAFETY: the event was created by cuEventCreate and is destroyed once.
        let result = unsafe { sys::cuEventDestroy_v2(self.event) };
        if result != sys::CUresult::CUDA_SUCCESS {
            tracing::warn!(?result, "cuEventDestroy failed");
        }
    }
}

/// One `i32` of pinned host memory mapped into the device address space
pub struct CudaMappedWord {
    host: *mut i32,
    device: sys::CUdeviceptr,
    context: Arc<CudaContext>,
}

// SAFETY: the pinned allocation belongs to the context, not to a thread, and
// host access goes through volatile reads and writes.
unsafe impl Send for CudaMappedWord {}

impl CudaMappedWord {
    pub(crate) fn new(context: &Arc<CudaContext>) -> Result<Self> {
        bind(context)?;
        let mut host: *mut c_void = std::ptr::null_mut();
        // SAFETY: `host` is a valid out-pointer; DEVICEMAP requests a mapped allocation.
        let result = unsafe {
            sys::cuMemHostAlloc(
                &mut host,
                std::mem::size_of::<i32>(),
                sys::CU_MEMHOSTALLOC_DEVICEMAP,
            )
        };
        check(result, "Error allocating pinned memory")?;

        // From here on, dropping `word` frees the allocation even if the
        // device-pointer lookup fails.
        let mut word = Self {
            host: host as *mut i32,
            device: 0,
            context: context.clone(),
        };
        word.store(0);

        let mut device: sys::CUdeviceptr = 0;
        // SAFETY: `host` is a live mapped pinned allocation in the current context.
        let result = unsafe { sys::cuMemHostGetDevicePointer_v2(&mut device, host, 0) };
        check(result, "Error getting device address for pinned memory")?;
        word.device = device;
        Ok(word)
    }
}

impl std::fmt::Debug for CudaMappedWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaMappedWord")
            .field("host", &self.host)
            .field("device", &format_args!("0x{:x}", self.device))
            .finish_non_exhaustive()
    }
}

impl MappedWord for CudaMappedWord {
    fn device_address(&self) -> u64 {
        self.device
    }

    fn load(&self) -> i32 {
        // SAFETY: `host` points at a live i32 for the lifetime of `self`.
        unsafe { self.host.read_volatile() }
    }

    fn store(&self, value: i32) {
        // SAFETY: as above; the device does not write while no solve is in flight.
        unsafe { self.host.write_volatile(value) }
    }
}

impl Drop for CudaMappedWord {
    fn drop(&mut self) {
        if let Err(e) = self.context.bind_to_thread() {
            tracing::warn!(error = ?e, "cannot bind CUDA context to free pinned memory");
            return;
        }
        // SAFETY: `host` came from cuMemHostAlloc and is freed exactly once.
        let result = unsafe { sys::cuMemFreeHost(self.host as *mut c_void) };
        if result != sys::CUresult::CUDA_SUCCESS {
            tracing::warn!(?result, "cuMemFreeHost failed");
        }
    }
}
