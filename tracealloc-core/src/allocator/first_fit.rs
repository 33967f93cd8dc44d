//! First-fit allocator over a simulated, fixed-capacity address space.
//!
//! Free space is kept as a sorted list of disjoint, non-adjacent ranges.
//! Allocation carves the first range that fits; freeing reinserts the block
//! and merges it with its neighbours.

use std::num::NonZeroU64;
use std::ops::Range;

use super::stats::{AllocatorStatistics, fragmentation_ratio};
use super::{Allocator, AllocatorError, RequestId};

const DEFAULT_ALIGNMENT: NonZeroU64 = NonZeroU64::new(8).unwrap();

/// First-fit free-list allocator.
///
/// Handles are block addresses inside `[0, capacity)`. No memory is ever
/// touched; only the bookkeeping of a real allocator is modelled.
#[derive(Debug, Clone)]
pub struct FirstFitAllocator {
    capacity: u64,
    alignment: NonZeroU64,
    free_ranges: Vec<Range<u64>>,
    bytes_in_use: u64,
    peak_bytes_in_use: u64,
    live_allocations: u64,
    successful_allocations: u64,
    failed_allocations: u64,
    reports: Vec<AllocatorStatistics>,
}

impl FirstFitAllocator {
    /// Creates an allocator managing `capacity` bytes with 8-byte alignment.
    pub fn new(capacity: u64) -> Self {
        Self::with_alignment(capacity, DEFAULT_ALIGNMENT)
    }

    /// Creates an allocator managing `capacity` bytes.
    pub fn with_alignment(capacity: u64, alignment: NonZeroU64) -> Self {
        let free_ranges = if capacity == 0 {
            Vec::new()
        } else {
            vec![0..capacity]
        };

        Self {
            capacity,
            alignment,
            free_ranges,
            bytes_in_use: 0,
            peak_bytes_in_use: 0,
            live_allocations: 0,
            successful_allocations: 0,
            failed_allocations: 0,
            reports: Vec::new(),
        }
    }

    /// Returns the free ranges in address order.
    pub fn free_ranges(&self) -> &[Range<u64>] {
        &self.free_ranges
    }

    /// Returns every snapshot emitted by `report_statistics`, oldest first.
    pub fn reports(&self) -> &[AllocatorStatistics] {
        &self.reports
    }

    /// Computes a statistics snapshot without recording it.
    pub fn statistics(&self) -> AllocatorStatistics {
        let free_bytes = self.capacity - self.bytes_in_use;
        let largest_free_block = self
            .free_ranges
            .iter()
            .map(|range| range.end - range.start)
            .max()
            .unwrap_or(0);

        AllocatorStatistics {
            capacity: self.capacity,
            bytes_in_use: self.bytes_in_use,
            peak_bytes_in_use: self.peak_bytes_in_use,
            live_allocations: self.live_allocations,
            successful_allocations: self.successful_allocations,
            failed_allocations: self.failed_allocations,
            free_blocks: self.free_ranges.len(),
            largest_free_block,
            fragmentation: fragmentation_ratio(free_bytes, largest_free_block),
        }
    }

    fn align_up(&self, value: u64) -> Option<u64> {
        let alignment = self.alignment.get();
        value
            .checked_add(alignment - 1)
            .map(|bumped| bumped / alignment * alignment)
    }

    fn block_length(&self, size: u64) -> Option<u64> {
        self.align_up(size.max(1))
    }

    /// Finds the first free range that can hold an aligned block of `length`.
    fn find_first_fit(&self, length: u64) -> Option<(usize, u64)> {
        self.free_ranges.iter().enumerate().find_map(|(index, range)| {
            let start = self.align_up(range.start)?;
            let end = start.checked_add(length)?;
            (end <= range.end).then_some((index, start))
        })
    }

    /// Removes `start..start + length` from the free range at `index`.
    fn carve(&mut self, index: usize, start: u64, length: u64) {
        let range = self.free_ranges[index].clone();
        let end = start + length;

        let head = range.start..start;
        let tail = end..range.end;

        match (head.is_empty(), tail.is_empty()) {
            (true, true) => {
                self.free_ranges.remove(index);
            }
            (true, false) => self.free_ranges[index] = tail,
            (false, true) => self.free_ranges[index] = head,
            (false, false) => {
                self.free_ranges[index] = head;
                self.free_ranges.insert(index + 1, tail);
            }
        }
    }

    /// Reinserts a block, merging with adjacent free ranges.
    ///
    /// Returns `false` when the block overlaps free space.
    fn release(&mut self, block: Range<u64>) -> bool {
        let index = self
            .free_ranges
            .partition_point(|range| range.end <= block.start);

        if self
            .free_ranges
            .get(index)
            .is_some_and(|next| next.start < block.end)
        {
            return false;
        }

        let merges_prev = index > 0 && self.free_ranges[index - 1].end == block.start;
        let merges_next = self
            .free_ranges
            .get(index)
            .is_some_and(|next| next.start == block.end);

        match (merges_prev, merges_next) {
            (true, true) => {
                let next_end = self.free_ranges[index].end;
                self.free_ranges[index - 1].end = next_end;
                self.free_ranges.remove(index);
            }
            (true, false) => self.free_ranges[index - 1].end = block.end,
            (false, true) => self.free_ranges[index].start = block.start,
            (false, false) => self.free_ranges.insert(index, block),
        }

        true
    }
}

impl Allocator for FirstFitAllocator {
    type Handle = u64;

    fn allocate(&mut self, request_id: RequestId, size: u64) -> Result<Option<u64>, AllocatorError> {
        let fit = self
            .block_length(size)
            .and_then(|length| Some((length, self.find_first_fit(length)?)));

        let Some((length, (index, address))) = fit else {
            self.failed_allocations += 1;
            tracing::debug!(
                "FirstFitAllocator: request {} of {} bytes does not fit",
                request_id,
                size
            );
            return Ok(None);
        };

        self.carve(index, address, length);
        self.bytes_in_use += length;
        self.peak_bytes_in_use = self.peak_bytes_in_use.max(self.bytes_in_use);
        self.live_allocations += 1;
        self.successful_allocations += 1;

        Ok(Some(address))
    }

    fn free(&mut self, request_id: RequestId, size: u64, address: u64) -> Result<(), AllocatorError> {
        let invalid = || AllocatorError::InvalidFree {
            request_id,
            address,
            size,
        };

        let length = self.block_length(size).ok_or_else(invalid)?;
        let end = address
            .checked_add(length)
            .filter(|end| *end <= self.capacity)
            .ok_or_else(invalid)?;

        if !self.release(address..end) {
            return Err(invalid());
        }

        self.bytes_in_use -= length;
        self.live_allocations = self.live_allocations.saturating_sub(1);

        Ok(())
    }

    fn report_statistics(&mut self) -> Result<(), AllocatorError> {
        let stats = self.statistics();

        tracing::info!(
            capacity = stats.capacity,
            bytes_in_use = stats.bytes_in_use,
            peak_bytes_in_use = stats.peak_bytes_in_use,
            live_allocations = stats.live_allocations,
            failed_allocations = stats.failed_allocations,
            free_blocks = stats.free_blocks,
            largest_free_block = stats.largest_free_block,
            fragmentation = stats.fragmentation,
            "FirstFitAllocator statistics"
        );

        self.reports.push(stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u64) -> RequestId {
        RequestId::new(index)
    }

    #[test]
    fn test_allocations_are_aligned_and_sequential() {
        let mut allocator = FirstFitAllocator::new(128);

        let first = allocator.allocate(id(0), 10).unwrap();
        let second = allocator.allocate(id(1), 3).unwrap();

        assert_eq!(first, Some(0));
        assert_eq!(second, Some(16));
        assert_eq!(allocator.free_ranges(), &[24..128]);
        assert_eq!(allocator.statistics().bytes_in_use, 24);
    }

    #[test]
    fn test_allocation_failure_when_full() {
        let mut allocator = FirstFitAllocator::new(32);

        assert_eq!(allocator.allocate(id(0), 32).unwrap(), Some(0));
        assert_eq!(allocator.allocate(id(1), 8).unwrap(), None);

        let stats = allocator.statistics();
        assert_eq!(stats.failed_allocations, 1);
        assert_eq!(stats.successful_allocations, 1);
        assert_eq!(stats.free_blocks, 0);
    }

    #[test]
    fn test_free_coalesces_neighbours() {
        let mut allocator = FirstFitAllocator::new(64);

        let a = allocator.allocate(id(0), 16).unwrap().unwrap();
        let b = allocator.allocate(id(1), 16).unwrap().unwrap();
        let c = allocator.allocate(id(2), 16).unwrap().unwrap();

        allocator.free(id(0), 16, a).unwrap();
        allocator.free(id(2), 16, c).unwrap();
        assert_eq!(allocator.free_ranges(), &[0..16, 32..64]);

        allocator.free(id(1), 16, b).unwrap();
        assert_eq!(allocator.free_ranges(), &[0..64]);
        assert_eq!(allocator.statistics().live_allocations, 0);
    }

    #[test]
    fn test_first_fit_reuses_earliest_hole() {
        let mut allocator = FirstFitAllocator::new(96);

        let a = allocator.allocate(id(0), 32).unwrap().unwrap();
        let _b = allocator.allocate(id(1), 32).unwrap().unwrap();
        allocator.free(id(0), 32, a).unwrap();

        // Fits in the hole at the front rather than the tail
        assert_eq!(allocator.allocate(id(2), 8).unwrap(), Some(0));
        assert_eq!(allocator.free_ranges(), &[8..32, 64..96]);
    }

    #[test]
    fn test_fragmentation_reported() {
        let mut allocator = FirstFitAllocator::new(64);

        let a = allocator.allocate(id(0), 16).unwrap().unwrap();
        let _b = allocator.allocate(id(1), 16).unwrap().unwrap();
        allocator.free(id(0), 16, a).unwrap();

        // Free: 0..16 and 32..64, largest block 32 of 48 free bytes
        allocator.report_statistics().unwrap();
        let stats = &allocator.reports()[0];
        assert_eq!(stats.free_blocks, 2);
        assert_eq!(stats.largest_free_block, 32);
        assert!((stats.fragmentation - (1.0 - 32.0 / 48.0)).abs() < 1e-12);
        assert_eq!(stats.peak_bytes_in_use, 32);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut allocator = FirstFitAllocator::new(64);

        let a = allocator.allocate(id(0), 16).unwrap().unwrap();
        allocator.free(id(0), 16, a).unwrap();

        let result = allocator.free(id(0), 16, a);
        assert!(matches!(
            result,
            Err(AllocatorError::InvalidFree { address: 0, size: 16, .. })
        ));
    }

    #[test]
    fn test_out_of_range_free_is_rejected() {
        let mut allocator = FirstFitAllocator::new(64);
        assert!(allocator.free(id(0), 16, 60).is_err());
        assert!(allocator.free(id(0), 8, u64::MAX).is_err());
    }

    #[test]
    fn test_zero_capacity_never_allocates() {
        let mut allocator = FirstFitAllocator::new(0);
        assert_eq!(allocator.allocate(id(0), 1).unwrap(), None);
        assert_eq!(allocator.statistics().fragmentation, 0.0);
    }

    #[test]
    fn test_custom_alignment() {
        let mut allocator = FirstFitAllocator::with_alignment(256, NonZeroU64::new(64).unwrap());

        assert_eq!(allocator.allocate(id(0), 1).unwrap(), Some(0));
        assert_eq!(allocator.allocate(id(1), 65).unwrap(), Some(64));
        assert_eq!(allocator.free_ranges(), &[192..256]);
    }
}
