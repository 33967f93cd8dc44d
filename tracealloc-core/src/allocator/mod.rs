//! Allocator contract under test and its reference implementations.
//!
//! The simulation engine only ever talks to [`Allocator`], so any strategy
//! can be benchmarked by implementing its three operations.

mod first_fit;
mod nop;
mod stats;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use first_fit::FirstFitAllocator;
pub use nop::NopAllocator;
pub use stats::{AllocatorStatistics, fragmentation_ratio};

/// Identifier of one logical allocation in a synthetic workload.
///
/// Ids are assigned sequentially from zero and never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Creates RequestId from zero-based index.
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the underlying id as u64.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Faults raised by an allocator under test.
///
/// An allocation that simply cannot be satisfied is not a fault; it is
/// signalled by `allocate` returning `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    #[error("Invalid free of request {request_id}: {size} bytes at {address:#x}")]
    InvalidFree {
        request_id: RequestId,
        address: u64,
        size: u64,
    },

    #[error("Allocator fault: {reason}")]
    Fault { reason: String },
}

/// Capability set required of any allocator benchmarked by the simulator.
///
/// Calls are always issued from a single thread, one at a time. The
/// scheduler guarantees `free` is called at most once per handle returned
/// by a successful `allocate`, with the same size.
pub trait Allocator {
    /// Opaque cookie returned on success and handed back on free.
    type Handle;

    /// Allocates `size` bytes for `request_id`.
    ///
    /// Returns `Ok(None)` when the request cannot be satisfied.
    ///
    /// # Errors
    /// Returns `AllocatorError` only for internal faults.
    fn allocate(
        &mut self,
        request_id: RequestId,
        size: u64,
    ) -> Result<Option<Self::Handle>, AllocatorError>;

    /// Releases the allocation identified by `handle`.
    ///
    /// # Errors
    /// Returns `AllocatorError` when the handle does not describe a live allocation.
    fn free(
        &mut self,
        request_id: RequestId,
        size: u64,
        handle: Self::Handle,
    ) -> Result<(), AllocatorError>;

    /// Emits utilization and fragmentation statistics.
    ///
    /// Called periodically and after every failed allocation.
    ///
    /// # Errors
    /// Returns `AllocatorError` only for internal faults.
    fn report_statistics(&mut self) -> Result<(), AllocatorError>;
}

impl<A: Allocator + ?Sized> Allocator for &mut A {
    type Handle = A::Handle;

    fn allocate(
        &mut self,
        request_id: RequestId,
        size: u64,
    ) -> Result<Option<Self::Handle>, AllocatorError> {
        (**self).allocate(request_id, size)
    }

    fn free(
        &mut self,
        request_id: RequestId,
        size: u64,
        handle: Self::Handle,
    ) -> Result<(), AllocatorError> {
        (**self).free(request_id, size, handle)
    }

    fn report_statistics(&mut self) -> Result<(), AllocatorError> {
        (**self).report_statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive<A: Allocator>(mut allocator: A) -> Option<A::Handle> {
        allocator.allocate(RequestId::new(0), 8).unwrap()
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::new(42).to_string(), "42");
        assert_eq!(RequestId::new(7).as_u64(), 7);
    }

    #[test]
    fn test_mutable_reference_is_an_allocator() {
        let mut allocator = NopAllocator::new();
        assert_eq!(drive(&mut allocator), Some(()));
        assert_eq!(allocator.allocations(), 1);
    }

    #[test]
    fn test_invalid_free_message() {
        let error = AllocatorError::InvalidFree {
            request_id: RequestId::new(3),
            address: 0x40,
            size: 16,
        };
        assert_eq!(
            error.to_string(),
            "Invalid free of request 3: 16 bytes at 0x40"
        );
    }
}
