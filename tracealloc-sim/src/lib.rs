//! Tracealloc Simulation - Deterministic allocation trace replay.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! This crate generates synthetic allocation workloads from fitted
//! statistical distributions and replays them against any type
//! implementing [`tracealloc_core::Allocator`].
//!
//! # Features
//!
//! - **Deterministic Execution**: Same seed always produces identical requests and dispatch order
//! - **Event-Based Replay**: Allocations and frees dispatched from a time-ordered queue
//! - **Periodic Statistics**: Allocator reports after a fixed number of successes and on every failure
//!
//! # Example
//!
//! ```rust,no_run
//! use tracealloc_core::{NopAllocator, SimulationConfig};
//! use tracealloc_sim::{SampleParameters, WorkloadSimulation};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SimulationConfig {
//!     event_count: 10_000,
//!     random_seed: Some(12345),
//!     ..Default::default()
//! };
//!
//! let mut sim = WorkloadSimulation::new(config, &SampleParameters::reference_workload())?;
//! let report = sim.run(&mut NopAllocator::new())?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod deterministic;

pub use deterministic::{
    AllocationEvent, AllocationRequest, DeterministicRng, DistributionFamily, EventKind,
    EventQueue, EventScheduler, FittedDistribution, LiveObjectTable, ParameterSet, ReplayReport,
    RunningCounters, SampleParameters, SampledWorkload, SimulationClock, SimulationError,
    WorkloadSampler, WorkloadSimulation, align_up, generate_requests, replay,
};
// Re-export config from core for convenience
pub use tracealloc_core::SimulationConfig;

/// Common simulation error type for convenience.
pub type Result<T> = std::result::Result<T, SimulationError>;
