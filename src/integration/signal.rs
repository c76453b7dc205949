//! Convergence signal: the event and flag word as one owned pair
//!
//! Ownership of the flag word is split by phase:
//!
//! ```text
//! host   store(0)  ──►  kernels enqueued  ──►  record(event)
//! device                 force kernel writes flag on convergence
//! host   synchronize(event)  ──►  load()
//! ```
//!
//! [`ConvergenceSignal::wait_converged`] is the only way to read the flag,
//! and it always synchronizes on the event first.

use crate::error::Result;
use crate::runtime::{MappedWord, Runtime, RuntimeClient};

/// Host-mapped convergence flag plus the event guarding reads of it
///
/// Both resources are created in [`new`](Self::new) and released together
/// on drop; there is no state in which one exists without the other.
pub struct ConvergenceSignal<R: Runtime> {
    event: R::Event,
    flag: R::MappedWord,
    device_address: u64,
}

impl<R: Runtime> ConvergenceSignal<R> {
    /// Create the event and allocate the flag word.
    ///
    /// If the allocation fails the already-created event is dropped before
    /// the error is returned.
    pub fn new(client: &R::Client) -> Result<Self> {
        let event = client.create_event()?;
        let flag = client.alloc_mapped_word()?;
        let device_address = flag.device_address();
        Ok(Self {
            event,
            flag,
            device_address,
        })
    }

    /// Device-visible address of the flag, as passed to kernels
    #[inline]
    pub fn device_address(&self) -> u64 {
        self.device_address
    }

    /// Clear the flag before a solve is enqueued.
    pub fn reset(&self) {
        self.flag.store(0);
    }

    /// Record the event behind everything enqueued so far.
    pub fn checkpoint(&self, client: &R::Client) -> Result<()> {
        client.record_event(&self.event)
    }

    /// Block until the last checkpoint is reached, then read the flag.
    pub fn wait_converged(&self, client: &R::Client) -> Result<bool> {
        client.synchronize_event(&self.event)?;
        Ok(self.flag.load() != 0)
    }
}

impl<R: Runtime> std::fmt::Debug for ConvergenceSignal<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergenceSignal")
            .field("device_address", &format_args!("0x{:x}", self.device_address))
            .finish_non_exhaustive()
    }
}
