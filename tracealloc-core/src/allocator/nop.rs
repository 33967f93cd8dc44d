//! Baseline allocator that accepts every request and does no work.

use super::{Allocator, AllocatorError, RequestId};

/// No-op reference allocator.
///
/// Every allocation succeeds with the unit handle, frees and reports do
/// nothing beyond bumping call counters. Replaying against it measures the
/// cost of the simulator itself.
#[derive(Debug, Default, Clone)]
pub struct NopAllocator {
    allocations: u64,
    frees: u64,
    reports: u64,
}

impl NopAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn frees(&self) -> u64 {
        self.frees
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }
}

impl Allocator for NopAllocator {
    type Handle = ();

    fn allocate(&mut self, _request_id: RequestId, _size: u64) -> Result<Option<()>, AllocatorError> {
        self.allocations += 1;
        Ok(Some(()))
    }

    fn free(&mut self, _request_id: RequestId, _size: u64, _handle: ()) -> Result<(), AllocatorError> {
        self.frees += 1;
        Ok(())
    }

    fn report_statistics(&mut self) -> Result<(), AllocatorError> {
        self.reports += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nop_allocator_counts_calls() {
        let mut allocator = NopAllocator::new();

        let handle = allocator.allocate(RequestId::new(0), 16).unwrap();
        assert_eq!(handle, Some(()));
        allocator.free(RequestId::new(0), 16, ()).unwrap();
        allocator.report_statistics().unwrap();

        assert_eq!(allocator.allocations(), 1);
        assert_eq!(allocator.frees(), 1);
        assert_eq!(allocator.reports(), 1);
    }
}
