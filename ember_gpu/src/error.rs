//! Error types for the Ember GPU memory core
//!
//! This module defines the error taxonomy shared by the allocator, the
//! staging pipeline, the global buffer manager and descriptor set tracking.
//! Backends map their native failures onto these variants.

use std::fmt;

/// Result type for Ember operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ember errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caller passed an invalid argument (zero size, mismatched byte counts, wrong usage...)
    InvalidArgument(String),

    /// Device memory exhausted
    OutOfDeviceMemory,

    /// Host memory exhausted
    OutOfHostMemory,

    /// Operation on a resource that has already been freed
    UseAfterFree(String),

    /// Second release of an already released resource
    DoubleFree(String),

    /// Backend-specific error (Vulkan, mock device, etc.)
    BackendError(String),

    /// Device context or backend initialization failed
    InitializationFailed(String),
}

impl Error {
    /// Whether this error is a programming-contract violation rather than a runtime condition
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::UseAfterFree(_) | Error::DoubleFree(_))
    }

    /// Whether this error reports memory exhaustion
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Error::OutOfDeviceMemory | Error::OutOfHostMemory)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::OutOfDeviceMemory => write!(f, "Out of device memory"),
            Error::OutOfHostMemory => write!(f, "Out of host memory"),
            Error::UseAfterFree(msg) => write!(f, "Use after free: {}", msg),
            Error::DoubleFree(msg) => write!(f, "Double free: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
