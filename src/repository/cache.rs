use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::storage::models::{ListedNote, Subject};

/// Upper bound on cached note listings (one per subject filter).
pub const DEFAULT_LISTING_CAPACITY: usize = 256;

struct Entry<T> {
    fetched_at: Instant,
    value: Arc<T>,
}

struct CacheState {
    generation: u64,
    notes: LruCache<Option<String>, Entry<Vec<ListedNote>>>,
    subjects: Option<Entry<Vec<Subject>>>,
}

/// Cache of note listings keyed by subject filter (`None` = all subjects).
///
/// Every invalidation bumps a generation counter. A reader records the
/// generation before fetching and may only store its result if nothing was
/// invalidated meanwhile, so a listing that raced a write is never cached.
/// Concurrent fetches for the same key are last-response-wins. The number of
/// cached listings is bounded; the least recently used one is evicted first.
pub struct ListingCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

impl ListingCache {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        let capacity =
            NonZeroUsize::new(DEFAULT_LISTING_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self::with_capacity(ttl, capacity)
    }

    pub fn with_capacity(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                generation: 0,
                notes: LruCache::new(capacity),
                subjects: None,
            }),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh<T>(&self, entry: &Entry<T>) -> bool {
        entry.fetched_at.elapsed() < self.ttl
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn notes(&self, subject_id: Option<&str>) -> Option<Arc<Vec<ListedNote>>> {
        let mut state = self.lock();
        let key = subject_id.map(str::to_string);
        let cached = state
            .notes
            .get(&key)
            .map(|entry| (self.is_fresh(entry), Arc::clone(&entry.value)));
        match cached {
            Some((true, notes)) => Some(notes),
            Some((false, _)) => {
                state.notes.pop(&key);
                None
            }
            None => None,
        }
    }

    /// Returns false when the listing was discarded as stale.
    pub fn store_notes(
        &self,
        subject_id: Option<&str>,
        generation: u64,
        notes: Arc<Vec<ListedNote>>,
    ) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.notes.put(
            subject_id.map(str::to_string),
            Entry {
                fetched_at: Instant::now(),
                value: notes,
            },
        );
        true
    }

    /// Number of note listings currently held.
    pub fn len(&self) -> usize {
        self.lock().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subjects(&self) -> Option<Arc<Vec<Subject>>> {
        let state = self.lock();
        state
            .subjects
            .as_ref()
            .filter(|e| self.is_fresh(e))
            .map(|e| Arc::clone(&e.value))
    }

    pub fn store_subjects(&self, generation: u64, subjects: Arc<Vec<Subject>>) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.subjects = Some(Entry {
            fetched_at: Instant::now(),
            value: subjects,
        });
        true
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.notes.clear();
        state.subjects = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_generation_is_not_stored() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let before = cache.generation();
        cache.invalidate();

        assert!(!cache.store_notes(Some("s1"), before, Arc::new(Vec::new())));
        assert!(cache.notes(Some("s1")).is_none());

        assert!(cache.store_notes(Some("s1"), cache.generation(), Arc::new(Vec::new())));
        assert!(cache.notes(Some("s1")).is_some());
        assert!(cache.notes(None).is_none());
    }

    #[test]
    fn zero_ttl_never_serves() {
        let cache = ListingCache::new(Duration::ZERO);
        assert!(cache.store_subjects(cache.generation(), Arc::new(Vec::new())));
        assert!(cache.subjects().is_none());

        cache.store_notes(None, cache.generation(), Arc::new(Vec::new()));
        assert!(cache.notes(None).is_none());
        // Expired listings are dropped on read
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_clears_every_key() {
        let cache = ListingCache::new(Duration::from_secs(60));
        let generation = cache.generation();
        cache.store_notes(None, generation, Arc::new(Vec::new()));
        cache.store_notes(Some("s2"), generation, Arc::new(Vec::new()));

        cache.invalidate();
        assert!(cache.notes(None).is_none());
        assert!(cache.notes(Some("s2")).is_none());
    }

    #[test]
    fn listings_are_bounded() {
        let capacity = NonZeroUsize::new(4).unwrap();
        let cache = ListingCache::with_capacity(Duration::from_secs(60), capacity);
        let generation = cache.generation();

        for i in 0..1000 {
            let key = format!("bogus-{i}");
            cache.store_notes(Some(&key), generation, Arc::new(Vec::new()));
        }

        assert_eq!(cache.len(), 4);
        assert!(cache.notes(Some("bogus-0")).is_none());
        assert!(cache.notes(Some("bogus-999")).is_some());
    }
}
