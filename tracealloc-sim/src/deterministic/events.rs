//! Allocation events and their global replay order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use tracealloc_core::RequestId;

use super::generator::AllocationRequest;

/// What happens to a request at an event's timestamp.
///
/// Declaration order is the tie-break order: for the same request at the
/// same time, the allocation is dispatched before the free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Allocate,
    Free,
}

impl EventKind {
    /// Returns string representation of event kind for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Allocate => "Allocate",
            EventKind::Free => "Free",
        }
    }
}

/// One instantaneous step of the replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEvent {
    pub time: u64,
    pub request_id: RequestId,
    pub size: u64,
    pub kind: EventKind,
}

impl AllocationEvent {
    pub fn allocate(request: &AllocationRequest) -> Self {
        Self {
            time: request.birth_time,
            request_id: request.id,
            size: request.size,
            kind: EventKind::Allocate,
        }
    }

    pub fn free(request: &AllocationRequest) -> Self {
        Self {
            time: request.death_time,
            request_id: request.id,
            size: request.size,
            kind: EventKind::Free,
        }
    }

    /// Replay key: time, then request id, then Allocate before Free.
    ///
    /// Different requests at the same time are ordered by id only, so a free
    /// is not moved ahead of an allocation of a lower id.
    pub fn replay_key(&self) -> (u64, RequestId, EventKind) {
        (self.time, self.request_id, self.kind)
    }
}

/// Heap entry wrapper giving min-heap behavior on the replay key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueuedEvent(AllocationEvent);

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap behavior
        self.0.replay_key().cmp(&other.0.replay_key()).reverse()
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered queue of pending events (binary min-heap).
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues both events of every request.
    pub fn from_requests(requests: &[AllocationRequest]) -> Self {
        let mut queue = Self {
            heap: BinaryHeap::with_capacity(requests.len() * 2),
        };
        for request in requests {
            queue.schedule(request);
        }
        queue
    }

    /// Queues the allocate and free events of `request`.
    pub fn schedule(&mut self, request: &AllocationRequest) {
        self.push(AllocationEvent::allocate(request));
        self.push(AllocationEvent::free(request));
    }

    pub fn push(&mut self, event: AllocationEvent) {
        self.heap.push(QueuedEvent(event));
    }

    /// Removes and returns the earliest event.
    pub fn pop(&mut self) -> Option<AllocationEvent> {
        self.heap.pop().map(|queued| queued.0)
    }

    /// Returns the earliest event without removing it.
    pub fn peek(&self) -> Option<&AllocationEvent> {
        self.heap.peek().map(|queued| &queued.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
