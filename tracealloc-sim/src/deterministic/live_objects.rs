//! Tracking of requests currently held by the allocator under test.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracealloc_core::RequestId;

use super::simulation::SimulationError;

/// Maps live request ids to the handle their allocation returned.
///
/// An id is present at most once. Requests whose allocation failed are
/// never inserted, so their free finds nothing to release.
#[derive(Debug, Clone)]
pub struct LiveObjectTable<H> {
    entries: HashMap<RequestId, H>,
    peak: usize,
}

impl<H> Default for LiveObjectTable<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            peak: 0,
        }
    }
}

impl<H> LiveObjectTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful allocation.
    ///
    /// # Errors
    ///
    /// - `SimulationError::DuplicateLiveObject` - The id is already live
    pub fn insert(&mut self, request_id: RequestId, handle: H) -> Result<(), SimulationError> {
        match self.entries.entry(request_id) {
            Entry::Occupied(_) => Err(SimulationError::DuplicateLiveObject { request_id }),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                self.peak = self.peak.max(self.entries.len());
                Ok(())
            }
        }
    }

    /// Removes a live entry, returning its handle.
    ///
    /// `None` means the request was never tracked or was already freed.
    pub fn remove(&mut self, request_id: RequestId) -> Option<H> {
        self.entries.remove(&request_id)
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        self.entries.contains_key(&request_id)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest number of simultaneously live entries.
    pub fn peak(&self) -> usize {
        self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let mut table = LiveObjectTable::new();

        table.insert(RequestId::new(1), 0x10_u64).unwrap();
        table.insert(RequestId::new(2), 0x20_u64).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.contains(RequestId::new(1)));

        assert_eq!(table.remove(RequestId::new(1)), Some(0x10));
        assert_eq!(table.len(), 1);
        assert_eq!(table.peak(), 2);
    }

    #[test]
    fn test_untracked_remove_is_none() {
        let mut table: LiveObjectTable<u64> = LiveObjectTable::new();
        assert_eq!(table.remove(RequestId::new(5)), None);

        table.insert(RequestId::new(5), 1).unwrap();
        assert_eq!(table.remove(RequestId::new(5)), Some(1));
        // Second free of the same id finds nothing
        assert_eq!(table.remove(RequestId::new(5)), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut table = LiveObjectTable::new();
        table.insert(RequestId::new(3), ()).unwrap();

        let result = table.insert(RequestId::new(3), ());
        assert!(matches!(
            result,
            Err(SimulationError::DuplicateLiveObject { request_id }) if request_id == RequestId::new(3)
        ));
        assert_eq!(table.len(), 1);
    }
}
