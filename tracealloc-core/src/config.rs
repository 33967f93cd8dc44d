//! Centralized configuration for tracealloc.
//!
//! All tunable parameters are defined here to avoid hard-coded values
//! scattered throughout the codebase.

use crate::TraceAllocError;

/// Central configuration for all tracealloc components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct TraceAllocConfig {
    pub simulation: SimulationConfig,
    pub extraction: ExtractionConfig,
}

/// Workload simulation configuration.
///
/// Controls how many synthetic allocations are generated, how their sizes
/// are rounded, how often the allocator under test reports statistics and
/// which seed drives the sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Total synthetic allocations to generate
    pub event_count: usize,
    /// Size rounding boundary in bytes
    pub alignment: u64,
    /// Fraction of `event_count` successful allocations between periodic reports
    pub report_threshold_fraction: f64,
    /// Seed for reproducible runs, drawn from OS entropy when absent
    pub random_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            event_count: 1_000_000,
            alignment: 8,
            report_threshold_fraction: 0.1,
            random_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            event_count: 1_000,
            alignment: 8,
            report_threshold_fraction: 0.1,
            random_seed: Some(42), // Fixed seed for reproducible tests
        }
    }

    /// Number of successful allocations between periodic statistics reports.
    ///
    /// Never zero: tiny workloads report after every success instead of
    /// never reporting at all.
    pub fn report_threshold(&self) -> u64 {
        let threshold = (self.event_count as f64 * self.report_threshold_fraction).floor() as u64;
        threshold.max(1)
    }

    /// Checks that the configuration describes a runnable workload.
    ///
    /// # Errors
    ///
    /// - `TraceAllocError::Configuration` - Alignment is zero or the report fraction is outside (0, 1]
    pub fn validate(&self) -> Result<(), TraceAllocError> {
        if self.alignment == 0 {
            return Err(TraceAllocError::Configuration {
                reason: "alignment must be positive".to_string(),
            });
        }

        let fraction = self.report_threshold_fraction;
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(TraceAllocError::Configuration {
                reason: format!("report threshold fraction {fraction} must be in (0, 1]"),
            });
        }

        Ok(())
    }
}

/// Trace sample extraction configuration.
///
/// Limits applied when turning normalized trace records into size,
/// interval and lifetime samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Allocation sizes above this are dropped from the size sample
    pub max_size: u64,
    /// Inter-arrival gaps above this are dropped from the interval sample
    pub max_interval: u64,
    /// Only lifetimes strictly longer than this are kept
    pub lifetime_floor: u64,
    /// Width of a size histogram bucket
    pub histogram_bucket: u64,
    /// Sizes above this are dropped from the size histogram
    pub histogram_limit: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_size: 2048,
            max_interval: 20_000,
            lifetime_floor: 1_000_000,
            histogram_bucket: 32,
            histogram_limit: 50_000,
        }
    }
}

impl ExtractionConfig {
    /// Checks histogram settings.
    ///
    /// # Errors
    ///
    /// - `TraceAllocError::Configuration` - Bucket width or limit is zero
    pub fn validate(&self) -> Result<(), TraceAllocError> {
        if self.histogram_bucket == 0 {
            return Err(TraceAllocError::Configuration {
                reason: "histogram bucket must be a positive integer".to_string(),
            });
        }
        if self.histogram_limit == 0 {
            return Err(TraceAllocError::Configuration {
                reason: "histogram limit must be a positive integer".to_string(),
            });
        }
        Ok(())
    }
}

impl TraceAllocConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(count) = lookup("TRACEALLOC_EVENT_COUNT").and_then(|v| v.parse().ok()) {
            config.simulation.event_count = count;
        }

        if let Some(alignment) = lookup("TRACEALLOC_ALIGNMENT").and_then(|v| v.parse().ok()) {
            config.simulation.alignment = alignment;
        }

        if let Some(fraction) = lookup("TRACEALLOC_REPORT_FRACTION").and_then(|v| v.parse().ok()) {
            config.simulation.report_threshold_fraction = fraction;
        }

        if let Some(seed) = lookup("TRACEALLOC_SEED").and_then(|v| v.parse().ok()) {
            config.simulation.random_seed = Some(seed);
        }

        config
    }
}
