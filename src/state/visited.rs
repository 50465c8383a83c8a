/// Crawl-wide record of object ids that have been claimed for fetching
///
/// An id is claimed the moment it is first discovered, before its fetch is
/// scheduled, so two discoveries of the same id (a sub-page that is also
/// mentioned elsewhere) race on `insert_if_absent` and exactly one wins.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared set of object ids already fetched or in flight
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl VisitedSet {
    /// Creates an empty visited set
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims an id
    ///
    /// # Returns
    ///
    /// * `true` - The id was not present and now belongs to the caller
    /// * `false` - Another discovery already claimed it
    pub fn insert_if_absent(&self, id: &str) -> bool {
        let mut ids = self.lock();
        if ids.contains(id) {
            return false;
        }
        ids.insert(id.to_string())
    }

    /// Returns true if the id has been claimed
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    /// Number of claimed ids
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been claimed yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
