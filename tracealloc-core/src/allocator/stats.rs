//! Utilization and fragmentation snapshots.

use serde::{Deserialize, Serialize};

/// Point-in-time view of an allocator's address space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocatorStatistics {
    /// Total managed bytes
    pub capacity: u64,
    /// Bytes currently handed out
    pub bytes_in_use: u64,
    /// Highest `bytes_in_use` observed
    pub peak_bytes_in_use: u64,
    /// Allocations not yet freed
    pub live_allocations: u64,
    pub successful_allocations: u64,
    pub failed_allocations: u64,
    /// Number of disjoint free blocks
    pub free_blocks: usize,
    pub largest_free_block: u64,
    /// `1 - largest_free_block / free_bytes`, 0 when nothing is free
    pub fragmentation: f64,
}

impl AllocatorStatistics {
    /// Bytes not handed out.
    pub fn free_bytes(&self) -> u64 {
        self.capacity.saturating_sub(self.bytes_in_use)
    }

    /// Fraction of capacity in use, 0 for an empty address space.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.bytes_in_use as f64 / self.capacity as f64
    }
}

/// External fragmentation of a free list.
///
/// Ratio of free space that is not part of the largest free block, clamped
/// to `[0, 1]`.
pub fn fragmentation_ratio(free_bytes: u64, largest_free_block: u64) -> f64 {
    if free_bytes == 0 {
        return 0.0;
    }
    let largest = largest_free_block.min(free_bytes) as f64;
    (1.0 - largest / free_bytes as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragmentation_ratio() {
        assert_eq!(fragmentation_ratio(0, 0), 0.0);
        assert_eq!(fragmentation_ratio(100, 100), 0.0);
        assert_eq!(fragmentation_ratio(100, 25), 0.75);
        // Largest block larger than total is clamped
        assert_eq!(fragmentation_ratio(10, 50), 0.0);
    }

    #[test]
    fn test_utilization() {
        let stats = AllocatorStatistics {
            capacity: 200,
            bytes_in_use: 50,
            ..Default::default()
        };
        assert_eq!(stats.free_bytes(), 150);
        assert_eq!(stats.utilization(), 0.25);
        assert_eq!(AllocatorStatistics::default().utilization(), 0.0);
    }

    #[test]
    fn test_free_bytes_of_overcommitted_snapshot() {
        let stats = AllocatorStatistics {
            capacity: 64,
            bytes_in_use: 100,
            ..Default::default()
        };
        assert_eq!(stats.free_bytes(), 0);
    }
}
