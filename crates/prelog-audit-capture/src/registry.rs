//! Tracked handle sets.
//!
//! Descriptors, streams and directory handles are stored as plain integers
//! (a stream or directory pointer is recorded by address). Each set is a
//! multiset: tracking the same value twice needs two removals.

use std::collections::VecDeque;

use parking_lot::{Mutex, MutexGuard};
use strum::{Display, IntoStaticStr};

/// Which set a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum HandleKind {
    Descriptor,
    Stream,
    Directory,
}

#[derive(Debug, Default)]
struct HandleSets {
    descriptors: VecDeque<usize>,
    streams: VecDeque<usize>,
    directories: VecDeque<usize>,
}

impl HandleSets {
    fn get(&self, kind: HandleKind) -> &VecDeque<usize> {
        match kind {
            HandleKind::Descriptor => &self.descriptors,
            HandleKind::Stream => &self.streams,
            HandleKind::Directory => &self.directories,
        }
    }

    fn get_mut(&mut self, kind: HandleKind) -> &mut VecDeque<usize> {
        match kind {
            HandleKind::Descriptor => &mut self.descriptors,
            HandleKind::Stream => &mut self.streams,
            HandleKind::Directory => &mut self.directories,
        }
    }
}

/// Thread-safe registry of handles whose later operations get recorded.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    sets: Mutex<HandleSets>,
}

/// Holds the registry lock across `fork` so the child never inherits it
/// mid-mutation.
#[must_use = "the registry is only protected while the guard is alive"]
pub struct RegistryForkGuard<'a> {
    _sets: MutexGuard<'a, HandleSets>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle. Most recent insertions are found first.
    pub fn track(&self, kind: HandleKind, handle: usize) {
        self.sets.lock().get_mut(kind).push_front(handle);
    }

    pub fn is_tracked(&self, kind: HandleKind, handle: usize) -> bool {
        self.sets.lock().get(kind).contains(&handle)
    }

    /// Remove one occurrence. Returns whether the handle was tracked, so a
    /// close can check and untrack atomically.
    pub fn untrack_one(&self, kind: HandleKind, handle: usize) -> bool {
        let mut sets = self.sets.lock();
        let set = sets.get_mut(kind);
        match set.iter().position(|&h| h == handle) {
            Some(index) => {
                set.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of occurrences of a handle.
    pub fn count(&self, kind: HandleKind, handle: usize) -> usize {
        self.sets.lock().get(kind).iter().filter(|&&h| h == handle).count()
    }

    /// Copy of a set, most recent first.
    pub fn snapshot(&self, kind: HandleKind) -> Vec<usize> {
        self.sets.lock().get(kind).iter().copied().collect()
    }

    pub fn len(&self, kind: HandleKind) -> usize {
        self.sets.lock().get(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        let sets = self.sets.lock();
        sets.descriptors.is_empty() && sets.streams.is_empty() && sets.directories.is_empty()
    }

    pub fn lock_for_fork(&self) -> RegistryForkGuard<'_> {
        RegistryForkGuard {
            _sets: self.sets.lock(),
        }
    }
}
