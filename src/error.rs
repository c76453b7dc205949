//! Error types for holonomic

use std::panic::Location;
use thiserror::Error;

/// Result type alias using holonomic's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving constraint kernels
///
/// Failing to converge is deliberately absent: the matrix-coupled solver
/// soft-caps its iteration count and reports the outcome through
/// [`ConstraintStats`](crate::integration::ConstraintStats) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Accelerator runtime call failed (allocation, event, launch, device lost)
    #[error("{context}: {description} ({code}) at {location}")]
    Runtime {
        /// What the engine was doing when the call failed
        context: &'static str,
        /// Status code reported by the runtime
        code: i32,
        /// Human-readable description of the status code
        description: String,
        /// Call site that issued the failing runtime call
        location: &'static Location<'static>,
    },

    /// Kernel launched while one of its argument slots was never bound
    #[error("Kernel '{kernel}' has no argument bound at slot {index}")]
    MissingKernelArg {
        /// Kernel name
        kernel: String,
        /// Unbound slot
        index: usize,
    },

    /// Kernel launched over zero work units
    #[error("Kernel '{kernel}' launched over an empty batch")]
    EmptyLaunch {
        /// Kernel name
        kernel: String,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Handle does not name a live buffer or mapped word on this client
    #[error("Unknown device handle 0x{handle:x}")]
    UnknownBuffer {
        /// The stale or foreign handle
        handle: u64,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a [`Error::Runtime`] that records the caller's source location.
    #[track_caller]
    pub fn runtime(context: &'static str, code: i32, description: impl Into<String>) -> Self {
        Error::Runtime {
            context,
            code,
            description: description.into(),
            location: Location::caller(),
        }
    }

    /// Status code of a runtime failure, if this is one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Runtime { code, .. } => Some(*code),
            _ => None,
        }
    }
}
