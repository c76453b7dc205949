//! Runtime backends for constraint kernels
//!
//! This module defines the `Runtime` trait and provides implementations
//! for the host (CPU) and CUDA backends.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a specific GPU/CPU)
//! ├── Client (owns the execution stream, events, host-mapped memory)
//! ├── Kernel (pre-built kernel with positional argument bindings)
//! ├── Event (checkpoint recorded on the stream)
//! └── MappedWord (one i32 visible to host and device without a copy)
//! ```
//!
//! Compiling kernels and deciding their fixed arguments is the host
//! integrator's job. This crate only binds the arguments that change between
//! solves and decides when, and over how many work units, each kernel runs.

mod array;
mod kernel;

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use array::DeviceArray;
pub use kernel::{Kernel, KernelArg};

use crate::error::Result;

/// Core trait for compute backends
///
/// `Runtime` abstracts over different accelerators. It uses static dispatch
/// via generics: the engine is generic over `R: Runtime` and never boxes a
/// kernel or an event.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific compute unit (e.g., GPU 0, GPU 1)
/// - `Client`: Launch stream plus event and pinned-memory management
/// - `Kernel`: Launchable kernel with persistent argument slots
/// - `Event`: Stream checkpoint the host can block on
/// - `MappedWord`: Host-mapped convergence flag storage
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching operations
    type Client: RuntimeClient<Self>;

    /// Launchable kernel type
    type Kernel: Kernel;

    /// Synchronization event; released on drop
    type Event: Send;

    /// Host-mapped word; released on drop
    type MappedWord: MappedWord;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Result<Self::Client>;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle stream-level operations
///
/// All kernels built from a client launch onto the client's single execution
/// stream, so they run in program order without host intervention. The only
/// host-blocking calls here are [`synchronize`](Self::synchronize) and
/// [`synchronize_event`](Self::synchronize_event).
pub trait RuntimeClient<R: Runtime>: Clone + Send {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Wait for all pending operations on the stream to complete
    fn synchronize(&self) -> Result<()>;

    /// Create a reusable event with timing disabled
    fn create_event(&self) -> Result<R::Event>;

    /// Record `event` on the stream after all work enqueued so far
    fn record_event(&self, event: &R::Event) -> Result<()>;

    /// Block the calling thread until the last recording of `event` completes
    fn synchronize_event(&self, event: &R::Event) -> Result<()>;

    /// Allocate one zeroed `i32` in host-mapped (pinned) memory
    fn alloc_mapped_word(&self) -> Result<R::MappedWord>;
}

/// One `i32` addressable from both host and device without an explicit copy
///
/// The device writes it from kernels through [`device_address`]; the host
/// reads it directly. A host read is only meaningful after an event recorded
/// behind the writing kernel has been synchronized.
///
/// [`device_address`]: MappedWord::device_address
pub trait MappedWord: Send {
    /// Address kernels receive as their argument (not the host pointer)
    fn device_address(&self) -> u64;

    /// Read the current value from host memory
    fn load(&self) -> i32;

    /// Write a value from the host
    fn store(&self, value: i32);
}
