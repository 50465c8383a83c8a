//! Scheduler for managing the crawl frontier and fetch concurrency
//!
//! This module handles:
//! - The FIFO frontier of objects waiting to be fetched
//! - Claiming ids in the visited set so each object is queued once
//! - Global concurrency limiting via a semaphore

use crate::config::CrawlerConfig;
use crate::state::{ObjectRef, VisitedSet};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A scheduled fetch with a semaphore permit
///
/// The permit is released when the fetch task drops this value.
pub struct ScheduledFetch {
    /// The object to fetch
    pub target: ObjectRef,

    /// The semaphore permit for this fetch
    pub _permit: OwnedSemaphorePermit,
}

/// Scheduler manages the frontier queue and the fetch ceiling
///
/// Breadth-first: objects are fetched in discovery order. An object's id is
/// claimed in the visited set when it is enqueued, so a second discovery of
/// the same id (from another path or another worker's decode) is dropped.
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    semaphore: Arc<Semaphore>,

    /// Maximum number of permits
    max_concurrent: usize,

    /// Objects waiting to be fetched, in discovery order
    frontier: VecDeque<ObjectRef>,

    /// Ids already fetched, in flight, or queued
    visited: VisitedSet,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// A new Scheduler with an empty frontier
    pub fn new(config: &CrawlerConfig) -> Self {
        let max_concurrent = config.max_concurrent_fetches.max(1) as usize;
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            frontier: VecDeque::new(),
            visited: VisitedSet::new(),
        }
    }

    /// Queues an object unless its id was seen before
    ///
    /// # Returns
    ///
    /// * `true` - The object was new and is now queued
    /// * `false` - The id was already claimed; nothing changed
    pub fn enqueue(&mut self, target: ObjectRef) -> bool {
        if !self.visited.insert_if_absent(&target.id) {
            tracing::trace!("Skipping already visited {}", target);
            return false;
        }
        self.frontier.push_back(target);
        true
    }

    /// Gets the next object to fetch, if one is queued and a permit is free
    ///
    /// # Returns
    ///
    /// * `Some(ScheduledFetch)` - An object holding one of the fetch permits
    /// * `None` - The frontier is empty or every permit is in use
    pub fn next_fetch(&mut self) -> Option<ScheduledFetch> {
        if self.frontier.is_empty() {
            return None;
        }

        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        let target = self.frontier.pop_front()?;

        Some(ScheduledFetch {
            target,
            _permit: permit,
        })
    }

    /// Returns the number of objects waiting in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns the number of fetches currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// Returns the number of distinct ids claimed so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Returns true if the id has been claimed
    pub fn is_visited(&self, id: &str) -> bool {
        self.visited.contains(id)
    }
}
