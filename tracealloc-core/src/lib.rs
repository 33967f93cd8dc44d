//! Tracealloc Core - Building blocks for allocator trace analysis
//!
//! This crate provides the pieces shared by the simulation engine and the
//! command-line front end: the allocator contract and its reference
//! implementations, the normalized trace record reader with sample
//! extraction, and configuration management.

pub mod allocator;
pub mod config;
pub mod trace;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use allocator::{
    Allocator, AllocatorError, AllocatorStatistics, FirstFitAllocator, NopAllocator, RequestId,
};
pub use config::{ExtractionConfig, SimulationConfig, TraceAllocConfig};
pub use trace::{TraceError, TraceOp, TraceRecord};

/// Core errors that can bubble up from any tracealloc subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum TraceAllocError {
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TraceAllocError {
    /// Checks if this error is due to user input validation.
    ///
    /// Malformed trace lines and unparsable parameter files count as user
    /// errors, I/O failures do not.
    pub fn is_user_error(&self) -> bool {
        match self {
            TraceAllocError::Configuration { .. }
            | TraceAllocError::Trace(TraceError::MalformedRecord { .. }) => true,
            TraceAllocError::Serialization(error) => !error.is_io(),
            TraceAllocError::Trace(TraceError::Io(_)) | TraceAllocError::Io(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceAllocError>;
