//! Bounded duplicate-suppression cache.
//!
//! Flood termination depends on every instance refusing to re-forward a
//! message it already accepted. The cache remembers accepted payloads up to
//! a capacity and TTL; with capacity 1 it degenerates to the single-slot
//! "most recent message only" behavior, which remains available for
//! comparison runs.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Inner {
    /// Payload -> acceptance instant.
    entries: HashMap<String, Instant>,
    /// Insertion order, oldest first, for capacity eviction.
    order: VecDeque<String>,
}

/// Bounded, TTL-expiring set of accepted message payloads.
///
/// `check_and_insert` is a single atomic read-modify-write: two concurrent
/// deliveries of the same new payload cannot both observe "not yet held",
/// so at most one of them forwards.
pub struct SeenCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl SeenCache {
    /// Create a cache holding up to `capacity` payloads, each for at most
    /// `ttl`. Capacity is clamped to at least 1.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Accept `payload` if it is not already held.
    ///
    /// Returns `true` if the payload was newly accepted (the caller should
    /// forward it) and `false` if it is a duplicate.
    pub fn check_and_insert(&self, payload: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        Self::purge_expired(&mut inner, now, self.ttl);

        if inner.entries.contains_key(payload) {
            return false;
        }

        inner.entries.insert(payload.to_owned(), now);
        inner.order.push_back(payload.to_owned());

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }

        true
    }

    /// Whether `payload` is currently held (without inserting).
    #[must_use]
    pub fn contains(&self, payload: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        Self::purge_expired(&mut inner, now, self.ttl);
        inner.entries.contains_key(payload)
    }

    /// Number of payloads currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True if no payload is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    fn purge_expired(inner: &mut Inner, now: Instant, ttl: Duration) {
        loop {
            let expired = match inner.order.front() {
                Some(front) => inner
                    .entries
                    .get(front)
                    .is_none_or(|inserted| now.duration_since(*inserted) >= ttl),
                None => false,
            };
            if !expired {
                break;
            }
            if let Some(front) = inner.order.pop_front() {
                inner.entries.remove(&front);
            }
        }
    }
}

impl std::fmt::Debug for SeenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeenCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_accepts_repeat_rejects() {
        let cache = SeenCache::new(8, Duration::from_secs(60));
        assert!(cache.check_and_insert("m1"));
        assert!(!cache.check_and_insert("m1"));
        assert!(cache.contains("m1"));
    }

    #[test]
    fn distinct_payloads_are_independent() {
        let cache = SeenCache::new(8, Duration::from_secs(60));
        assert!(cache.check_and_insert("round-1"));
        assert!(cache.check_and_insert("round-2"));
        assert!(!cache.check_and_insert("round-1"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn capacity_one_reproduces_single_slot_overwrite() {
        let cache = SeenCache::new(1, Duration::from_secs(60));
        assert!(cache.check_and_insert("a"));
        assert!(cache.check_and_insert("b"));
        // "a" was evicted by "b", so a late copy of "a" looks new again.
        assert!(cache.check_and_insert("a"));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let cache = SeenCache::new(2, Duration::from_secs(60));
        assert!(cache.check_and_insert("a"));
        assert!(cache.check_and_insert("b"));
        assert!(cache.check_and_insert("c"));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn expired_entries_are_forgotten() {
        let cache = SeenCache::new(8, Duration::from_millis(20));
        assert!(cache.check_and_insert("m"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.contains("m"));
        assert!(cache.check_and_insert("m"));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = SeenCache::new(0, Duration::from_secs(60));
        assert!(cache.check_and_insert("m"));
        assert!(!cache.check_and_insert("m"));
    }
}
