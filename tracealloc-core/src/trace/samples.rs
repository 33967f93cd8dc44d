//! Empirical samples extracted from a trace.
//!
//! These are the raw inputs of the distribution-fitting step: allocation
//! sizes, gaps between consecutive allocations and object lifetimes.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use super::{TraceOp, TraceRecord};
use crate::config::ExtractionConfig;

/// Size, interval and lifetime samples of one trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSamples {
    /// Requested sizes, in trace order
    pub sizes: Vec<u64>,
    /// Gaps between consecutive allocations, in time order
    pub intervals: Vec<u64>,
    /// Time from allocation to matching free, in free order
    pub lifetimes: Vec<u64>,
}

impl TraceSamples {
    /// Extracts all three sample sets from `records`.
    pub fn extract(records: &[TraceRecord], config: &ExtractionConfig) -> Self {
        let samples = Self {
            sizes: size_samples(records, config.max_size),
            intervals: interval_samples(records, config.max_interval),
            lifetimes: lifetime_samples(records, config.lifetime_floor),
        };

        tracing::debug!(
            "Extracted {} sizes, {} intervals, {} lifetimes from {} records",
            samples.sizes.len(),
            samples.intervals.len(),
            samples.lifetimes.len(),
            records.len()
        );

        samples
    }
}

fn size_samples(records: &[TraceRecord], max_size: u64) -> Vec<u64> {
    records
        .iter()
        .filter_map(|record| match record.op {
            TraceOp::Malloc { size, .. } if size <= max_size => Some(size),
            _ => None,
        })
        .collect()
}

fn interval_samples(records: &[TraceRecord], max_interval: u64) -> Vec<u64> {
    let mut stamps: Vec<u64> = records
        .iter()
        .filter(|record| matches!(record.op, TraceOp::Malloc { .. }))
        .map(|record| record.timestamp)
        .collect();
    stamps.sort_unstable();

    stamps
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|gap| *gap <= max_interval)
        .collect()
}

fn lifetime_samples(records: &[TraceRecord], lifetime_floor: u64) -> Vec<u64> {
    // pid -> address -> allocation timestamp
    let mut live: HashMap<u32, HashMap<u64, u64>> = HashMap::new();
    let mut lifetimes = Vec::new();

    for record in records {
        match record.op {
            // Failed malloc
            TraceOp::Malloc { address: 0, .. } => {}
            TraceOp::Malloc { address, .. } => {
                live.entry(record.pid)
                    .or_default()
                    .insert(address, record.timestamp);
            }
            TraceOp::Free { address } => {
                let Some(born) = live
                    .get_mut(&record.pid)
                    .and_then(|addresses| addresses.remove(&address))
                else {
                    continue;
                };

                let lifetime = record.timestamp.saturating_sub(born);
                if lifetime > lifetime_floor {
                    lifetimes.push(lifetime);
                }
            }
        }
    }

    lifetimes
}

/// Counts allocation sizes per bucket.
///
/// Each size `<= limit` lands in bucket `bucket * (size / bucket)`.
pub fn size_histogram(records: &[TraceRecord], bucket: NonZeroU64, limit: u64) -> BTreeMap<u64, u64> {
    let bucket = bucket.get();
    let mut histogram = BTreeMap::new();

    for record in records {
        if let TraceOp::Malloc { size, .. } = record.op {
            if size > limit {
                continue;
            }
            *histogram.entry(bucket * (size / bucket)).or_insert(0) += 1;
        }
    }

    histogram
}

/// Descriptive statistics of a sample set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

impl SampleSummary {
    /// Summarizes `values`; all zero for an empty set.
    pub fn of(values: &[u64]) -> Self {
        let (Some(min), Some(max)) = (values.iter().min(), values.iter().max()) else {
            return Self::default();
        };

        let total: u128 = values.iter().map(|v| u128::from(*v)).sum();
        Self {
            count: values.len(),
            min: *min,
            max: *max,
            mean: total as f64 / values.len() as f64,
        }
    }
}
