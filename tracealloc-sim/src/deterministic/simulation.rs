//! Workload simulation driver tying sampling, generation and replay together.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracealloc_core::{Allocator, AllocatorError, RequestId, SimulationConfig};

use super::clock::DeterministicRng;
use super::events::AllocationEvent;
use super::generator::{AllocationRequest, generate_requests};
use super::live_objects::LiveObjectTable;
use super::sampler::{SampleParameters, WorkloadSampler};
use super::scheduler::EventScheduler;

/// Errors that can occur during simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Distribution parameters do not describe a valid distribution
    #[error("Invalid distribution parameters: {reason}")]
    InvalidParameters {
        /// Which parameter set failed and why
        reason: String,
    },

    /// Simulation configuration rejected before sampling
    #[error("Invalid simulation configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Event could not be scheduled properly
    #[error("Invalid event scheduling: {reason}")]
    InvalidEventScheduling {
        /// Reason why scheduling failed
        reason: String,
    },

    /// Request id allocated again while still live
    #[error("Request {request_id} is already live")]
    DuplicateLiveObject { request_id: RequestId },

    /// Allocator under test faulted
    #[error(transparent)]
    Allocator(#[from] AllocatorError),
}

/// Result of a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Seed used for reproduction, absent for replays of hand-built requests
    pub seed: Option<u64>,
    pub events_dispatched: u64,
    pub allocations_succeeded: u64,
    pub allocations_failed: u64,
    /// Frees forwarded to the allocator
    pub frees_dispatched: u64,
    /// Frees skipped because their allocation failed
    pub untracked_frees: u64,
    pub periodic_reports: u64,
    pub failure_reports: u64,
    pub peak_live_objects: usize,
    pub live_objects_remaining: usize,
    pub final_time: u64,
}

impl ReplayReport {
    /// Statistics reports requested from the allocator.
    pub fn total_reports(&self) -> u64 {
        self.periodic_reports + self.failure_reports
    }

    /// Generates human-readable summary.
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        match self.seed {
            Some(seed) => summary.push_str(&format!("Replay Report (seed: {seed})\n")),
            None => summary.push_str("Replay Report\n"),
        }
        summary.push_str(&format!("Events dispatched: {}\n", self.events_dispatched));
        summary.push_str(&format!("Final time: {}\n", self.final_time));

        summary.push_str("\nAllocations:\n");
        summary.push_str(&format!("  Succeeded: {}\n", self.allocations_succeeded));
        summary.push_str(&format!("  Failed: {}\n", self.allocations_failed));
        summary.push_str(&format!(
            "  Frees: {} ({} untracked)\n",
            self.frees_dispatched, self.untracked_frees
        ));

        summary.push_str(&format!(
            "\nReports: {} periodic, {} on failure\n",
            self.periodic_reports, self.failure_reports
        ));
        summary.push_str(&format!(
            "Live objects: peak {}, remaining {}\n",
            self.peak_live_objects, self.live_objects_remaining
        ));

        summary
    }
}

/// Sampled allocation workload replayed against an allocator.
///
/// Requests are generated once, on first use, from the seeded RNG. The same
/// seed, configuration and parameters always yield the same requests and
/// the same dispatch order.
pub struct WorkloadSimulation {
    config: SimulationConfig,
    sampler: WorkloadSampler,
    rng: DeterministicRng,
    alignment: NonZeroU64,
    report_threshold: NonZeroU64,
    requests: Option<Vec<AllocationRequest>>,
    history_limit: usize,
    last_history: Vec<AllocationEvent>,
}

impl WorkloadSimulation {
    /// Creates a simulation, validating configuration and parameters.
    ///
    /// Without a configured seed one is drawn from entropy and recorded.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidConfiguration` - Zero alignment or bad report fraction
    /// - `SimulationError::InvalidParameters` - Any parameter set is invalid
    pub fn new(
        config: SimulationConfig,
        parameters: &SampleParameters,
    ) -> Result<Self, SimulationError> {
        config
            .validate()
            .map_err(|error| SimulationError::InvalidConfiguration {
                reason: error.to_string(),
            })?;

        let alignment =
            NonZeroU64::new(config.alignment).ok_or_else(|| SimulationError::InvalidConfiguration {
                reason: "alignment must be positive".to_string(),
            })?;
        let report_threshold = NonZeroU64::new(config.report_threshold()).ok_or_else(|| {
            SimulationError::InvalidConfiguration {
                reason: "report threshold must be positive".to_string(),
            }
        })?;

        let sampler = WorkloadSampler::new(parameters)?;

        let rng = match config.random_seed {
            Some(seed) => DeterministicRng::from_seed(seed),
            None => DeterministicRng::from_entropy(),
        };

        tracing::info!(
            seed = rng.seed(),
            events = config.event_count,
            alignment = config.alignment,
            report_threshold = report_threshold.get(),
            "Simulation configured"
        );

        Ok(Self {
            config,
            sampler,
            rng,
            alignment,
            report_threshold,
            requests: None,
            history_limit: 0,
            last_history: Vec::new(),
        })
    }

    /// Keeps up to `limit` dispatched events of the next run.
    pub fn with_dispatch_history(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Returns the seed used for this simulation.
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn report_threshold(&self) -> NonZeroU64 {
        self.report_threshold
    }

    /// Generated requests, sampling them on first call.
    pub fn requests(&mut self) -> &[AllocationRequest] {
        let count = self.config.event_count;
        let alignment = self.alignment;
        let sampler = &self.sampler;
        let rng = &mut self.rng;

        self.requests.get_or_insert_with(|| {
            let samples = sampler.sample(rng, count);
            generate_requests(&samples, count, alignment)
        })
        .as_slice()
    }

    /// Events dispatched by the last run, up to the history limit.
    pub fn dispatch_history(&self) -> &[AllocationEvent] {
        &self.last_history
    }

    /// Replays the generated requests against `allocator`.
    ///
    /// Each call starts from an empty live-object table and fresh counters,
    /// replaying the same requests.
    ///
    /// # Errors
    ///
    /// Propagates allocator faults and scheduling errors from the replay.
    pub fn run<A: Allocator>(&mut self, allocator: &mut A) -> Result<ReplayReport, SimulationError> {
        let report_threshold = self.report_threshold;
        let history_limit = self.history_limit;

        let mut scheduler =
            EventScheduler::new(report_threshold).with_dispatch_history(history_limit);
        scheduler.schedule_requests(self.requests());

        let mut live = LiveObjectTable::new();
        let mut report = scheduler.run(allocator, &mut live)?;
        report.seed = Some(self.seed());

        self.last_history = scheduler.dispatch_history().to_vec();

        Ok(report)
    }
}
