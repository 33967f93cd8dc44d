//! Property tests for request generation and event replay

use std::collections::HashSet;
use std::num::NonZeroU64;

use proptest::prelude::*;
use tracealloc_core::{Allocator, AllocatorError, NopAllocator, RequestId, SimulationConfig};
use tracealloc_sim::{
    AllocationRequest, EventKind, SampleParameters, SampledWorkload, WorkloadSimulation,
    generate_requests, replay,
};

/// Allocator that records dispatch order and fails every `fail_every`-th allocation.
struct PatternAllocator {
    fail_every: u64,
    allocate_calls: u64,
    outstanding: HashSet<u64>,
    /// Outstanding handles after each allocate or free call
    live_after_call: Vec<usize>,
    dispatched: Vec<(RequestId, EventKind)>,
    reports: u64,
}

impl PatternAllocator {
    fn new(fail_every: u64) -> Self {
        Self {
            fail_every,
            allocate_calls: 0,
            outstanding: HashSet::new(),
            live_after_call: Vec::new(),
            dispatched: Vec::new(),
            reports: 0,
        }
    }
}

impl Allocator for PatternAllocator {
    type Handle = u64;

    fn allocate(&mut self, request_id: RequestId, _size: u64) -> Result<Option<u64>, AllocatorError> {
        self.allocate_calls += 1;
        self.dispatched.push((request_id, EventKind::Allocate));
        let handle = request_id.as_u64();
        let granted = self.allocate_calls % self.fail_every != 0 && self.outstanding.insert(handle);
        self.live_after_call.push(self.outstanding.len());
        Ok(granted.then_some(handle))
    }

    fn free(&mut self, request_id: RequestId, _size: u64, handle: u64) -> Result<(), AllocatorError> {
        if handle != request_id.as_u64() || !self.outstanding.remove(&handle) {
            return Err(AllocatorError::InvalidFree {
                request_id,
                address: handle,
                size: 0,
            });
        }
        self.dispatched.push((request_id, EventKind::Free));
        self.live_after_call.push(self.outstanding.len());
        Ok(())
    }

    fn report_statistics(&mut self) -> Result<(), AllocatorError> {
        self.reports += 1;
        Ok(())
    }
}

fn workload() -> impl Strategy<Value = SampledWorkload> {
    prop::collection::vec((-50.0f64..5000.0, -10.0f64..100.0, -10.0f64..500.0), 0..64).prop_map(
        |triples| SampledWorkload {
            sizes: triples.iter().map(|t| t.0).collect(),
            intervals: triples.iter().map(|t| t.1).collect(),
            durations: triples.iter().map(|t| t.2).collect(),
        },
    )
}

fn sort_key(request: &AllocationRequest, kind: EventKind) -> (u64, RequestId, EventKind) {
    match kind {
        EventKind::Allocate => (request.birth_time, request.id, kind),
        EventKind::Free => (request.death_time, request.id, kind),
    }
}

proptest! {
    #[test]
    fn generated_requests_are_well_formed(
        samples in workload(),
        alignment in prop::sample::select(vec![1u64, 8, 16, 64]),
    ) {
        let alignment = NonZeroU64::new(alignment).unwrap();
        let requests = generate_requests(&samples, samples.len(), alignment);

        prop_assert_eq!(requests.len(), samples.len());
        for pair in requests.windows(2) {
            prop_assert!(pair[0].birth_time <= pair[1].birth_time);
        }
        for (index, request) in requests.iter().enumerate() {
            prop_assert_eq!(request.id, RequestId::new(index as u64));
            prop_assert!(request.death_time >= request.birth_time);
            prop_assert!(request.size > 0);
            prop_assert_eq!(request.size % alignment.get(), 0);
        }
    }

    #[test]
    fn replay_dispatches_every_event_in_order(
        samples in workload(),
        fail_every in 2u64..6,
        threshold in 1u64..10,
    ) {
        let requests = generate_requests(&samples, samples.len(), NonZeroU64::new(8).unwrap());
        let mut allocator = PatternAllocator::new(fail_every);

        let report = replay(&requests, &mut allocator, NonZeroU64::new(threshold).unwrap()).unwrap();

        let count = requests.len() as u64;
        prop_assert_eq!(report.events_dispatched, 2 * count);
        prop_assert_eq!(report.allocations_succeeded + report.allocations_failed, count);

        // Every successful allocation is freed exactly once; failed ones never are
        prop_assert_eq!(report.frees_dispatched, report.allocations_succeeded);
        prop_assert_eq!(report.untracked_frees, report.allocations_failed);
        prop_assert_eq!(report.live_objects_remaining, 0);
        prop_assert!(allocator.outstanding.is_empty());

        // After every call the live count is successes minus matched frees so far
        let mut succeeded = 0usize;
        let mut freed = 0usize;
        let mut allocate_calls = 0u64;
        for ((_, kind), live) in allocator.dispatched.iter().zip(&allocator.live_after_call) {
            match kind {
                EventKind::Allocate => {
                    allocate_calls += 1;
                    if allocate_calls % fail_every != 0 {
                        succeeded += 1;
                    }
                }
                EventKind::Free => freed += 1,
            }
            prop_assert_eq!(*live, succeeded - freed);
        }
        prop_assert_eq!(succeeded as u64, report.allocations_succeeded);
        prop_assert_eq!(
            allocator.live_after_call.iter().copied().max().unwrap_or(0),
            report.peak_live_objects
        );

        prop_assert_eq!(report.failure_reports, report.allocations_failed);
        prop_assert_eq!(report.periodic_reports, report.allocations_succeeded / threshold);
        prop_assert_eq!(allocator.reports, report.total_reports());

        // Dispatch order matches the (time, id, kind) key
        let keys: Vec<_> = allocator
            .dispatched
            .iter()
            .map(|(id, kind)| sort_key(&requests[id.as_u64() as usize], *kind))
            .collect();
        for pair in keys.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn no_op_replay_never_fails(samples in workload(), threshold in 1u64..100) {
        let requests = generate_requests(&samples, samples.len(), NonZeroU64::new(8).unwrap());
        let mut allocator = NopAllocator::new();

        let report = replay(&requests, &mut allocator, NonZeroU64::new(threshold).unwrap()).unwrap();

        prop_assert_eq!(report.allocations_failed, 0);
        prop_assert_eq!(report.allocations_succeeded, requests.len() as u64);
        prop_assert_eq!(report.periodic_reports, requests.len() as u64 / threshold);
        prop_assert_eq!(allocator.reports(), report.periodic_reports);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn same_seed_same_workload(seed in any::<u64>()) {
        let config = SimulationConfig {
            event_count: 64,
            random_seed: Some(seed),
            ..Default::default()
        };
        let parameters = SampleParameters::reference_workload();

        let mut first = WorkloadSimulation::new(config.clone(), &parameters).unwrap();
        let mut second = WorkloadSimulation::new(config, &parameters).unwrap();

        prop_assert_eq!(first.requests(), second.requests());
        prop_assert_eq!(
            first.run(&mut NopAllocator::new()).unwrap(),
            second.run(&mut NopAllocator::new()).unwrap()
        );
    }
}
