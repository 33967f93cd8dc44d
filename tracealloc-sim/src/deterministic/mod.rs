//! Deterministic allocation workload simulation.
//!
//! Samples allocation sizes, inter-arrival intervals and lifetimes from
//! fitted distributions, turns them into timed requests and replays the
//! resulting allocate and free events against an allocator in a fixed
//! global order.

mod clock;
mod events;
mod generator;
mod live_objects;
mod sampler;
mod scheduler;
mod simulation;

// Re-export core types for public API
pub use clock::{DeterministicRng, SimulationClock};
pub use events::{AllocationEvent, EventKind, EventQueue};
pub use generator::{AllocationRequest, align_up, generate_requests};
pub use live_objects::LiveObjectTable;
pub use sampler::{
    DistributionFamily, FittedDistribution, ParameterSet, SampleParameters, SampledWorkload,
    WorkloadSampler,
};
pub use scheduler::{EventScheduler, RunningCounters, replay};
pub use simulation::{ReplayReport, SimulationError, WorkloadSimulation};
