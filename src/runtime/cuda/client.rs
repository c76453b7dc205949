//! CUDA Client implementation
//!
//! CudaClient owns the context and the single stream every kernel of an
//! engine launches on, and caches the PTX modules kernels are loaded from.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone`; clones share context, stream and module cache
//! via `Arc`. CUDA calls bind the context to the calling thread first.

use bytemuck::Pod;
use cudarc::driver::safe::{CudaContext, CudaModule, CudaStream};
use cudarc::driver::sys;
use cudarc::nvrtc::Ptx;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::device::CudaDevice;
use super::kernel::CudaKernel;
use super::runtime::CudaRuntime;
use super::sync::{CudaEvent, CudaMappedWord};
use super::{bind, check, driver_error};
use crate::error::{Error, Result};
use crate::runtime::{DeviceArray, RuntimeClient};

/// CUDA Runtime Client
///
/// All kernels built by [`kernel`](Self::kernel) launch on `self.stream`, and
/// events are recorded on the same stream, so an event checkpoint covers
/// every launch enqueued before it.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all kernels launch
    pub(crate) stream: Arc<CudaStream>,

    /// Loaded PTX modules by source path
    modules: Arc<Mutex<HashMap<PathBuf, Arc<CudaModule>>>>,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Create a new CUDA client for a device.
    ///
    /// # Errors
    ///
    /// Returns an error if context or stream creation fails (e.g., invalid
    /// device ID, no driver).
    pub fn new(device: CudaDevice) -> Result<Self> {
        let context = CudaContext::new(device.index)
            .map_err(|e| driver_error(e, "Error creating CUDA context"))?;
        bind(&context)?;
        let stream = context
            .new_stream()
            .map_err(|e| driver_error(e, "Error creating CUDA stream"))?;

        tracing::debug!(device = device.index, "CUDA client created");
        Ok(Self {
            device,
            context,
            stream,
            modules: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Get reference to the CUDA stream.
    #[inline]
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Get reference to the CUDA context.
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// Load (or fetch from cache) the PTX module at `path`.
    pub fn load_module(&self, path: impl AsRef<Path>) -> Result<Arc<CudaModule>> {
        let path = path.as_ref();
        let mut modules = self.modules.lock();
        if let Some(module) = modules.get(path) {
            return Ok(module.clone());
        }
        let module = self
            .context
            .load_module(Ptx::from_file(path))
            .map_err(|e| driver_error(e, "Error loading CUDA module"))?;
        modules.insert(path.to_path_buf(), module.clone());
        Ok(module)
    }

    /// Look up `name` in `module` and wrap it as a kernel on this client's stream.
    pub fn kernel(&self, module: &Arc<CudaModule>, name: &str) -> Result<CudaKernel> {
        let func = module.load_function(name).map_err(|e| {
            tracing::debug!(kernel = name, error = ?e, "kernel lookup failed");
            driver_error(e, "Error loading kernel function")
        })?;
        Ok(CudaKernel::new(name.to_string(), func, self.stream.clone()))
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Allocate device memory and upload `data`
    pub fn alloc_array<T: Pod>(&self, data: &[T]) -> Result<DeviceArray> {
        let size = std::mem::size_of_val(data);
        if size == 0 {
            return Err(Error::InvalidArgument {
                arg: "data",
                reason: "cannot allocate an empty device array".into(),
            });
        }
        bind(&self.context)?;
        let cu_stream = self.stream.cu_stream();
        let mut ptr: sys::CUdeviceptr = 0;
        // SAFETY: out-pointer is valid; the stream belongs to the bound context.
        check(
            unsafe { sys::cuMemAllocAsync(&mut ptr, size, cu_stream) },
            "Error allocating device array",
        )?;
        let array = DeviceArray::new(ptr, data.len(), std::mem::size_of::<T>());
        if let Err(e) = self.write_array(&array, data) {
            // SAFETY: `ptr` was allocated above on this stream.
            let _ = unsafe { sys::cuMemFreeAsync(ptr, cu_stream) };
            return Err(e);
        }
        Ok(array)
    }

    /// Overwrite a device array from host data (blocks until the copy lands)
    pub fn write_array<T: Pod>(&self, array: &DeviceArray, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() != array.size_bytes() {
            return Err(Error::InvalidArgument {
                arg: "data",
                reason: format!("expected {} bytes, got {}", array.size_bytes(), bytes.len()),
            });
        }
        bind(&self.context)?;
        // SAFETY: `array` covers `bytes.len()` bytes of device memory.
        check(
            unsafe {
                sys::cuMemcpyHtoDAsync_v2(
                    array.handle(),
                    bytes.as_ptr() as *const std::ffi::c_void,
                    bytes.len(),
                    self.stream.cu_stream(),
                )
            },
            "Error copying host data to device",
        )?;
        self.synchronize()
    }

    /// Copy a device array back to the host (blocks until the copy lands)
    pub fn read_array<T: Pod>(&self, array: &DeviceArray) -> Result<Vec<T>> {
        if std::mem::size_of::<T>() != array.elem_size() {
            return Err(Error::InvalidArgument {
                arg: "T",
                reason: format!(
                    "array holds {}-byte elements, requested {}-byte view",
                    array.elem_size(),
                    std::mem::size_of::<T>()
                ),
            });
        }
        let mut out = vec![T::zeroed(); array.len()];
        bind(&self.context)?;
        {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
            // SAFETY: `bytes` and the device array have the same length.
            check(
                unsafe {
                    sys::cuMemcpyDtoHAsync_v2(
                        bytes.as_mut_ptr() as *mut std::ffi::c_void,
                        array.handle(),
                        bytes.len(),
                        self.stream.cu_stream(),
                    )
                },
                "Error copying device data to host",
            )?;
        }
        self.synchronize()?;
        Ok(out)
    }

    /// Release a device array allocated by this client
    pub fn free_array(&self, array: DeviceArray) -> Result<()> {
        bind(&self.context)?;
        // SAFETY: the handle came from cuMemAllocAsync on this stream.
        check(
            unsafe { sys::cuMemFreeAsync(array.handle(), self.stream.cu_stream()) },
            "Error freeing device array",
        )
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.stream
            .synchronize()
            .map_err(|e| driver_error(e, "Error synchronizing CUDA stream"))
    }

    fn create_event(&self) -> Result<CudaEvent> {
        CudaEvent::new(&self.context)
    }

    fn record_event(&self, event: &CudaEvent) -> Result<()> {
        // SAFETY: both handles belong to this client's context.
        let result = unsafe { sys::cuEventRecord(event.event, self.stream.cu_stream()) };
        check(result, "Error recording event for CCMA")
    }

    fn synchronize_event(&self, event: &CudaEvent) -> Result<()> {
        // SAFETY: the event is live for the duration of the borrow.
        let result = unsafe { sys::cuEventSynchronize(event.event) };
        check(result, "Error synchronizing on event for CCMA")
    }

    fn alloc_mapped_word(&self) -> Result<CudaMappedWord> {
        CudaMappedWord::new(&self.context)
    }
}
