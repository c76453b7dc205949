//! CPU runtime implementation
//!
//! The CPU runtime runs kernels as Rust closures on the calling thread, in
//! launch order, against buffers held in host memory. It is the reference
//! backend for the engine and the instrument its tests observe: a client
//! built with [`CpuClient::with_activity_log`] appends every launch, event
//! record and event synchronization to its [`StreamOp`] log. Without it
//! nothing is recorded.
//!
//! # Kernels
//!
//! ```ignore
//! let client = CpuRuntime::default_client(&CpuDevice::new())?;
//! let mut kernel = client.kernel("scale", |launch| {
//!     let mut data: Vec<f32> = launch.read(0)?;
//!     let factor = launch.real(1)? as f32;
//!     data.iter_mut().for_each(|x| *x *= factor);
//!     launch.write(0, &data)
//! });
//! kernel.set_arg(0, buffer.as_arg())?;
//! kernel.set_arg(1, KernelArg::F32(2.0))?;
//! kernel.execute(buffer.len())?;
//! ```
//!
//! # Fault injection
//!
//! [`CpuClient::inject_fault`] makes the next matching runtime call fail with
//! a chosen status code, which is how error propagation is exercised without
//! a real device.

mod client;
mod device;
mod kernel;
mod memory;
mod runtime;

pub use client::{CpuClient, HostFault, StreamOp};
pub use device::CpuDevice;
pub use kernel::{CpuKernel, HostLaunch};
pub use memory::{CpuEvent, CpuMappedWord};
pub use runtime::CpuRuntime;
