//! Kernel launch seam
//!
//! A [`Kernel`] is a pre-built accelerator function with positional argument
//! slots. Bindings persist between launches, so a solver only re-binds the
//! slots whose values change (tolerance, iteration index, target buffer).
//!
//! ```text
//! setup (external)            per solve (this crate)
//! ────────────────            ──────────────────────
//! set_arg(0, positions)       set_arg(1, tolerance)
//! set_arg(2, constraints)     execute(num_groups)
//! ...
//! ```

use crate::error::Result;

/// Scalar or pointer value bound to a kernel argument slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelArg {
    /// Single-precision scalar
    F32(f32),
    /// Double-precision scalar
    F64(f64),
    /// Signed integer (iteration indices)
    I32(i32),
    /// Unsigned integer (counts)
    U32(u32),
    /// Device address of a buffer or mapped word
    Ptr(u64),
}

impl KernelArg {
    /// Value as a device pointer, if it is one
    pub fn as_ptr(&self) -> Option<u64> {
        match self {
            KernelArg::Ptr(p) => Some(*p),
            _ => None,
        }
    }

    /// Value as a real scalar widened to `f64`, if it is one
    pub fn as_real(&self) -> Option<f64> {
        match self {
            KernelArg::F32(v) => Some(*v as f64),
            KernelArg::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Value as a signed integer, if it is one
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            KernelArg::I32(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f32> for KernelArg {
    fn from(v: f32) -> Self {
        KernelArg::F32(v)
    }
}

impl From<f64> for KernelArg {
    fn from(v: f64) -> Self {
        KernelArg::F64(v)
    }
}

impl From<i32> for KernelArg {
    fn from(v: i32) -> Self {
        KernelArg::I32(v)
    }
}

impl From<u32> for KernelArg {
    fn from(v: u32) -> Self {
        KernelArg::U32(v)
    }
}

/// Launchable kernel with persistent argument bindings
pub trait Kernel: Send {
    /// Kernel entry point name
    fn name(&self) -> &str;

    /// Bind `arg` to slot `index`, replacing any previous binding
    fn set_arg(&mut self, index: usize, arg: KernelArg) -> Result<()>;

    /// Currently bound value of slot `index`
    fn arg(&self, index: usize) -> Option<KernelArg>;

    /// Enqueue one launch covering `work_units` threads of work.
    ///
    /// Returns as soon as the launch is enqueued. `work_units == 0` is
    /// rejected with [`Error::EmptyLaunch`](crate::error::Error::EmptyLaunch).
    fn execute(&mut self, work_units: usize) -> Result<()>;
}

/// Positional argument storage shared by backend kernel implementations.
#[derive(Debug, Clone, Default)]
pub(crate) struct ArgSlots {
    slots: Vec<Option<KernelArg>>,
}

impl ArgSlots {
    pub(crate) fn set(&mut self, index: usize, arg: KernelArg) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(arg);
    }

    pub(crate) fn get(&self, index: usize) -> Option<KernelArg> {
        self.slots.get(index).copied().flatten()
    }

    /// All slots in order, failing on the first gap.
    #[cfg(feature = "cuda")]
    pub(crate) fn bound(&self, kernel: &str) -> Result<Vec<KernelArg>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| crate::error::Error::MissingKernelArg {
                    kernel: kernel.to_string(),
                    index,
                })
            })
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<Option<KernelArg>> {
        self.slots.clone()
    }
}
