// Bounded FIFO working set shared by the key cache and the segment dedup cache.

use std::collections::VecDeque;

/// Entries kept by both caches after trimming.
pub const CACHE_CAPACITY: usize = 100;

/// Append-only sequence that drops its oldest entries on [`trim`](Self::trim).
///
/// Lookups are linear scans; manifests only ever reference a small recent
/// window of keys and segments.
#[derive(Debug, Clone)]
pub struct BoundedCache<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends without trimming; the cache may exceed its capacity until the next trim.
    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
    }

    /// Evicts oldest entries until at most `capacity` remain.
    pub fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<&T> {
        self.entries.iter().find(|entry| predicate(entry))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: PartialEq> BoundedCache<T> {
    pub fn contains(&self, entry: &T) -> bool {
        self.entries.contains(entry)
    }
}

impl<T> Default for BoundedCache<T> {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY)
    }
}

/// URIs of segments already dispatched for download.
pub type SegmentCache = BoundedCache<String>;
