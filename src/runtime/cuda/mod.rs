//! CUDA runtime implementation
//!
//! This module provides GPU execution via NVIDIA CUDA using cudarc.
//!
//! # Features
//!
//! - `CudaDevice` - Represents a CUDA GPU device
//! - `CudaClient` - Owns context and stream, loads PTX modules, manages arrays
//! - `CudaKernel` - Kernel function with persistent argument slots
//! - `CudaEvent` / `CudaMappedWord` - The convergence checkpoint pair
//!
//! Kernel PTX is produced by the host integrator's build; this backend only
//! loads modules and launches their functions.
//!
//! # Errors
//!
//! Every driver call is checked. A failing call becomes
//! [`Error::Runtime`](crate::error::Error::Runtime) carrying the `CUresult`
//! code, the driver's description and the Rust call site.

mod client;
mod device;
mod kernel;
mod runtime;
mod sync;

pub use client::CudaClient;
pub use device::CudaDevice;
pub use kernel::{BLOCK_SIZE, CudaKernel};
pub use runtime::{CudaRuntime, is_cuda_available};
pub use sync::{CudaEvent, CudaMappedWord};

use cudarc::driver::DriverError;
use cudarc::driver::safe::CudaContext;
use cudarc::driver::sys::{CUresult, cuGetErrorString};
use std::ffi::CStr;

use crate::error::{Error, Result};

/// Turn a raw driver status into a `Result`, recording the caller's location.
#[track_caller]
pub(crate) fn check(result: CUresult, context: &'static str) -> Result<()> {
    if result == CUresult::CUDA_SUCCESS {
        return Ok(());
    }
    Err(Error::runtime(context, result as i32, error_string(result)))
}

/// Attach context and location to an error from cudarc's safe API.
#[track_caller]
pub(crate) fn driver_error(e: DriverError, context: &'static str) -> Error {
    Error::runtime(context, e.0 as i32, error_string(e.0))
}

/// Make `context` current on this thread, reporting failure at the caller.
#[track_caller]
pub(crate) fn bind(context: &CudaContext) -> Result<()> {
    match context.bind_to_thread() {
        Ok(()) => Ok(()),
        Err(e) => Err(driver_error(e, "Error binding CUDA context")),
    }
}

fn error_string(result: CUresult) -> String {
    let mut ptr: *const std::ffi::c_char = std::ptr::null();
    // SAFETY: cuGetErrorString writes a pointer to a static string or leaves it null.
    let status = unsafe { cuGetErrorString(result, &mut ptr) };
    if status == CUresult::CUDA_SUCCESS && !ptr.is_null() {
        // SAFETY: non-null pointers returned by the driver are NUL-terminated statics.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    } else {
        format!("{:?}", result)
    }
}
