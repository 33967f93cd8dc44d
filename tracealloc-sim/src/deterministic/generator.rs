//! Turns sampled triples into timed allocation requests.
//!
//! Rounding: every real sample is clamped to be non-negative (NaN becomes
//! 0) and truncated toward zero. Sizes are then raised to at least one byte
//! and aligned up, so the smallest request is one alignment unit. Time
//! arithmetic saturates instead of wrapping.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use tracealloc_core::RequestId;

use super::sampler::SampledWorkload;

/// One simulated logical allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub id: RequestId,
    /// Aligned size in bytes, always positive
    pub size: u64,
    pub birth_time: u64,
    /// Never earlier than `birth_time`
    pub death_time: u64,
}

impl AllocationRequest {
    /// Time between allocation and free.
    pub fn lifetime(&self) -> u64 {
        self.death_time - self.birth_time
    }
}

/// Rounds `value` up to the next multiple of `alignment`, saturating at
/// the largest representable multiple.
pub fn align_up(value: u64, alignment: NonZeroU64) -> u64 {
    let alignment = alignment.get();
    match value.checked_add(alignment - 1) {
        Some(bumped) => bumped / alignment * alignment,
        None => u64::MAX / alignment * alignment,
    }
}

/// Clamps a real sample to a non-negative integer by truncation.
fn to_ticks(sample: f64) -> u64 {
    // `as` saturates and maps NaN to 0
    sample.max(0.0) as u64
}

/// Builds `count` requests from sampled triples.
///
/// Birth times accumulate the interval samples starting at zero, so they
/// never decrease. Non-positive durations free at the birth instant. At
/// most `samples.len()` requests are produced.
pub fn generate_requests(
    samples: &SampledWorkload,
    count: usize,
    alignment: NonZeroU64,
) -> Vec<AllocationRequest> {
    let count = count.min(samples.len());
    let mut requests = Vec::with_capacity(count);
    let mut clock: u64 = 0;

    for index in 0..count {
        let birth_time = clock;
        let size = align_up(to_ticks(samples.sizes[index]).max(1), alignment);
        let death_time = birth_time.saturating_add(to_ticks(samples.durations[index]));

        requests.push(AllocationRequest {
            id: RequestId::new(index as u64),
            size,
            birth_time,
            death_time,
        });

        clock = clock.saturating_add(to_ticks(samples.intervals[index]));
    }

    tracing::debug!(
        "Generated {} allocation requests spanning {} ticks",
        requests.len(),
        clock
    );

    requests
}
