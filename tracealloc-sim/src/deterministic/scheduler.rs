//! Replay loop dispatching queued events against an allocator.

use std::num::NonZeroU64;

use tracealloc_core::Allocator;

use super::clock::SimulationClock;
use super::events::{AllocationEvent, EventKind, EventQueue};
use super::generator::AllocationRequest;
use super::live_objects::LiveObjectTable;
use super::simulation::{ReplayReport, SimulationError};

/// Counters reset every time a periodic report is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningCounters {
    pub successful_allocations_since_last_report: u64,
}

/// Discrete-event scheduler for one replay.
///
/// Owns the event queue and the reporting counters. Every run state lives
/// here, so independent schedulers never interfere.
#[derive(Debug, Clone)]
pub struct EventScheduler {
    queue: EventQueue,
    clock: SimulationClock,
    counters: RunningCounters,
    report_threshold: NonZeroU64,
    history: Vec<AllocationEvent>,
    history_limit: usize,
}

impl EventScheduler {
    /// Creates a scheduler that reports after every `report_threshold`
    /// successful allocations.
    pub fn new(report_threshold: NonZeroU64) -> Self {
        Self {
            queue: EventQueue::new(),
            clock: SimulationClock::new(),
            counters: RunningCounters::default(),
            report_threshold,
            history: Vec::new(),
            history_limit: 0,
        }
    }

    /// Keeps up to `limit` dispatched events for inspection.
    pub fn with_dispatch_history(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Queues the allocate and free events of every request.
    pub fn schedule_requests(&mut self, requests: &[AllocationRequest]) {
        for request in requests {
            self.queue.schedule(request);
        }
    }

    /// Number of events not yet dispatched.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn report_threshold(&self) -> NonZeroU64 {
        self.report_threshold
    }

    pub fn counters(&self) -> RunningCounters {
        self.counters
    }

    /// Current simulation time.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Events dispatched so far, oldest first, up to the history limit.
    pub fn dispatch_history(&self) -> &[AllocationEvent] {
        &self.history
    }

    /// Drains the queue in replay order.
    ///
    /// Each run starts at time zero with fresh counters and history, so a
    /// scheduler can be refilled and run again. Successful allocations are recorded in `live`; frees of ids missing
    /// from `live` are skipped. Statistics are reported after every failed
    /// allocation and after every `report_threshold` successes.
    ///
    /// # Errors
    /// - `SimulationError::Allocator` - The allocator under test faulted
    /// - `SimulationError::DuplicateLiveObject` - An id was allocated twice while live
    /// - `SimulationError::InvalidEventScheduling` - An event was queued in the past
    pub fn run<A: Allocator>(
        &mut self,
        allocator: &mut A,
        live: &mut LiveObjectTable<A::Handle>,
    ) -> Result<ReplayReport, SimulationError> {
        let mut report = ReplayReport::default();
        self.clock.reset();
        self.counters = RunningCounters::default();
        self.history.clear();

        tracing::debug!(
            "Replaying {} events, reporting every {} allocations",
            self.queue.len(),
            self.report_threshold
        );

        while let Some(event) = self.queue.pop() {
            self.clock.advance_to(event.time)?;

            tracing::trace!(
                time = event.time,
                request_id = event.request_id.as_u64(),
                size = event.size,
                kind = event.kind.as_str(),
                "dispatch"
            );

            match event.kind {
                EventKind::Allocate => self.dispatch_allocate(&event, allocator, live, &mut report)?,
                EventKind::Free => match live.remove(event.request_id) {
                    Some(handle) => {
                        allocator.free(event.request_id, event.size, handle)?;
                        report.frees_dispatched += 1;
                    }
                    None => report.untracked_frees += 1,
                },
            }

            report.events_dispatched += 1;
            if self.history.len() < self.history_limit {
                self.history.push(event);
            }
        }

        report.peak_live_objects = live.peak();
        report.live_objects_remaining = live.len();
        report.final_time = self.clock.now();

        tracing::info!(
            events = report.events_dispatched,
            succeeded = report.allocations_succeeded,
            failed = report.allocations_failed,
            untracked_frees = report.untracked_frees,
            reports = report.total_reports(),
            peak_live = report.peak_live_objects,
            final_time = report.final_time,
            "Replay complete"
        );

        Ok(report)
    }

    fn dispatch_allocate<A: Allocator>(
        &mut self,
        event: &AllocationEvent,
        allocator: &mut A,
        live: &mut LiveObjectTable<A::Handle>,
        report: &mut ReplayReport,
    ) -> Result<(), SimulationError> {
        let Some(handle) = allocator.allocate(event.request_id, event.size)? else {
            report.allocations_failed += 1;
            tracing::debug!(
                "Allocation of {} bytes for request {} failed at {}",
                event.size,
                event.request_id,
                event.time
            );
            allocator.report_statistics()?;
            report.failure_reports += 1;
            return Ok(());
        };

        live.insert(event.request_id, handle)?;
        report.allocations_succeeded += 1;

        let counter = &mut self.counters.successful_allocations_since_last_report;
        *counter += 1;
        if *counter >= self.report_threshold.get() {
            *counter = 0;
            allocator.report_statistics()?;
            report.periodic_reports += 1;
        }

        Ok(())
    }
}

/// Replays `requests` against `allocator` with a fresh scheduler and
/// live-object table.
///
/// # Errors
/// Propagates any error of [`EventScheduler::run`].
pub fn replay<A: Allocator>(
    requests: &[AllocationRequest],
    allocator: &mut A,
    report_threshold: NonZeroU64,
) -> Result<ReplayReport, SimulationError> {
    let mut scheduler = EventScheduler::new(report_threshold);
    scheduler.schedule_requests(requests);

    let mut live = LiveObjectTable::new();
    scheduler.run(allocator, &mut live)
}

#[cfg(test)]
mod tests {
    use tracealloc_core::{AllocatorError, NopAllocator, RequestId};

    use super::*;

    fn request(id: u64, birth_time: u64, death_time: u64) -> AllocationRequest {
        AllocationRequest {
            id: RequestId::new(id),
            size: 16,
            birth_time,
            death_time,
        }
    }

    /// Allocator whose `free` always faults.
    struct FaultyFree;

    impl Allocator for FaultyFree {
        type Handle = ();

        fn allocate(&mut self, _: RequestId, _: u64) -> Result<Option<()>, AllocatorError> {
            Ok(Some(()))
        }

        fn free(&mut self, _: RequestId, _: u64, _: ()) -> Result<(), AllocatorError> {
            Err(AllocatorError::Fault {
                reason: "free exploded".to_string(),
            })
        }

        fn report_statistics(&mut self) -> Result<(), AllocatorError> {
            Ok(())
        }
    }

    #[test]
    fn test_scheduler_drains_queue() {
        let requests = [request(0, 0, 10), request(1, 5, 6)];
        let mut scheduler = EventScheduler::new(NonZeroU64::new(10).unwrap());
        scheduler.schedule_requests(&requests);
        assert_eq!(scheduler.pending_events(), 4);

        let mut live = LiveObjectTable::new();
        let report = scheduler.run(&mut NopAllocator::new(), &mut live).unwrap();

        assert_eq!(scheduler.pending_events(), 0);
        assert_eq!(report.events_dispatched, 4);
        assert_eq!(report.allocations_succeeded, 2);
        assert_eq!(report.frees_dispatched, 2);
        assert_eq!(report.peak_live_objects, 2);
        assert_eq!(report.live_objects_remaining, 0);
        assert_eq!(report.final_time, 10);
        assert!(live.is_empty());
    }

    #[test]
    fn test_periodic_report_resets_counter() {
        let requests: Vec<_> = (0..5).map(|i| request(i, i, 100)).collect();
        let mut allocator = NopAllocator::new();

        let report = replay(&requests, &mut allocator, NonZeroU64::new(2).unwrap()).unwrap();

        assert_eq!(report.periodic_reports, 2);
        assert_eq!(report.failure_reports, 0);
        assert_eq!(allocator.reports(), 2);
    }

    #[test]
    fn test_dispatch_history_is_bounded() {
        let requests: Vec<_> = (0..4).map(|i| request(i, i, i + 1)).collect();
        let mut scheduler =
            EventScheduler::new(NonZeroU64::new(1).unwrap()).with_dispatch_history(3);
        scheduler.schedule_requests(&requests);

        scheduler
            .run(&mut NopAllocator::new(), &mut LiveObjectTable::new())
            .unwrap();

        let history = scheduler.dispatch_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].kind, EventKind::Allocate);
        assert_eq!(history[1].time, 1);
    }

    #[test]
    fn test_scheduler_reused_for_earlier_batch() {
        let mut scheduler = EventScheduler::new(NonZeroU64::new(2).unwrap());
        let mut allocator = NopAllocator::new();

        let late: Vec<_> = (0..3).map(|i| request(i, 100 + i, 200)).collect();
        scheduler.schedule_requests(&late);
        let first = scheduler.run(&mut allocator, &mut LiveObjectTable::new()).unwrap();
        assert_eq!(first.final_time, 200);
        assert_eq!(first.periodic_reports, 1);
        assert_eq!(scheduler.counters().successful_allocations_since_last_report, 1);

        // Second batch starts before the first one ended
        let early = [request(0, 0, 5)];
        scheduler.schedule_requests(&early);
        let second = scheduler.run(&mut allocator, &mut LiveObjectTable::new()).unwrap();

        assert_eq!(second.events_dispatched, 2);
        assert_eq!(second.final_time, 5);
        // Leftover count from the first run does not trigger a report
        assert_eq!(second.periodic_reports, 0);
        assert_eq!(scheduler.now(), 5);
        assert_eq!(allocator.reports(), 1);
    }

    #[test]
    fn test_allocator_fault_propagates() {
        let requests = [request(0, 0, 1)];
        let result = replay(&requests, &mut FaultyFree, NonZeroU64::new(1).unwrap());

        assert!(matches!(
            result,
            Err(SimulationError::Allocator(AllocatorError::Fault { .. }))
        ));
    }

    #[test]
    fn test_empty_request_list() {
        let report = replay(&[], &mut NopAllocator::new(), NonZeroU64::new(1).unwrap()).unwrap();
        assert_eq!(report, ReplayReport::default());
    }
}
