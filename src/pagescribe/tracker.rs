//! # Annotation State Tracker
//!
//! The set of pages carrying a confirmed user edit. It is the single source of
//! truth for what `save` has to recompose.
//!
//! The set is read by the background thumbnail loader and written by the
//! foreground edit/clear flow, so every access goes through one mutex and
//! holds it for the whole check-or-mutate. Operations that need to inspect
//! and change the set together ([`AnnotationTracker::mark`],
//! [`AnnotationTracker::unmark`]) do both under a single lock acquisition.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct AnnotationTracker {
    pages: Mutex<BTreeSet<usize>>,
}

impl AnnotationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a BTreeSet half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, BTreeSet<usize>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `page` as annotated. Returns true if it was not annotated before.
    pub fn mark(&self, page: usize) -> bool {
        self.lock().insert(page)
    }

    /// Removes `page` from the set. Returns true if it was annotated.
    pub fn unmark(&self, page: usize) -> bool {
        self.lock().remove(&page)
    }

    pub fn contains(&self, page: usize) -> bool {
        self.lock().contains(&page)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Annotated pages in ascending order, as of one instant.
    pub fn snapshot(&self) -> Vec<usize> {
        self.lock().iter().copied().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
