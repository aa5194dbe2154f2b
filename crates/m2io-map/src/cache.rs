//! Resolution cache keyed by `(source digest, target digest, spec hash)`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use m2io_model::Digest;

use crate::error::LinkError;
use crate::plan::CrosswalkPlan;

pub type ResolutionKey = (Digest, Digest, Digest);

type Outcome = Result<Arc<CrosswalkPlan>, LinkError>;
type Slot = Arc<OnceLock<Outcome>>;

/// Single-flight cache of resolved plans.
///
/// The map lock is only held to find or create a key's slot. The slot's
/// `OnceLock` runs at most one computation per key; concurrent callers for
/// the same key block on it and share the outcome. Failed outcomes are
/// handed to every waiter and then evicted so the next call retries.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    slots: Mutex<HashMap<ResolutionKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Result of a cache lookup, with whether this call did the computation.
#[derive(Debug)]
pub struct Cached {
    pub outcome: Result<Arc<CrosswalkPlan>, LinkError>,
    pub computed: bool,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_resolve<F>(&self, key: ResolutionKey, resolve: F) -> Cached
    where
        F: FnOnce() -> Outcome,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut computed = false;
        let outcome = slot
            .get_or_init(|| {
                computed = true;
                resolve()
            })
            .clone();

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
            if outcome.is_err() {
                self.evict(&key, &slot);
            }
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        Cached { outcome, computed }
    }

    /// Cached plan for `key`, if one has been resolved successfully.
    pub fn get(&self, key: &ResolutionKey) -> Option<Arc<CrosswalkPlan>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(key)
            .and_then(|slot| slot.get())
            .and_then(|outcome| outcome.as_ref().ok())
            .map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| matches!(slot.get(), Some(Ok(_))))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn evict(&self, key: &ResolutionKey, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> ResolutionKey {
        let digest = Digest::from_sha256([n; 32]);
        (digest.clone(), digest.clone(), digest)
    }

    #[test]
    fn failures_are_not_kept() {
        let cache = ResolutionCache::new();
        let failed = cache.get_or_resolve(key(1), || {
            Err(LinkError::TargetBundleUnknown {
                reference: "Nope@1.0".to_string(),
            })
        });
        assert!(failed.computed);
        assert!(failed.outcome.is_err());
        assert!(cache.is_empty());

        let retried = cache.get_or_resolve(key(1), || {
            Err(LinkError::NoSourceAttributes {
                target: "x".to_string(),
            })
        });
        assert!(retried.computed);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 0);
    }
}
