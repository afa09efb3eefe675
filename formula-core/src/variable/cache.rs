//! Lazy Cache
//!
//! The cache slot of a lazy variable.
//!
//! # How It Works
//!
//! 1. A new cache starts stale, so the first read computes.
//!
//! 2. After computing, the registry stores the value and the cache is fresh.
//!
//! 3. When an upstream constant changes, the registry marks the cache stale
//!    while holding its write lock.
//!
//! Readers fill the cache under the registry's read lock, so the slot has
//! its own mutex. Two readers racing on a stale cache both compute the same
//! value; whichever stores last wins, and the result is identical.

use parking_lot::Mutex;

/// State of a lazy variable's cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheState {
    /// The cached value is up to date.
    Fresh(f64),

    /// The variable must recompute on next read.
    Stale,
}

impl CacheState {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

pub(crate) struct LazyCache {
    state: Mutex<CacheState>,
}

impl LazyCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState::Stale),
        }
    }

    pub fn get(&self) -> Option<f64> {
        match *self.state.lock() {
            CacheState::Fresh(value) => Some(value),
            CacheState::Stale => None,
        }
    }

    pub fn state(&self) -> CacheState {
        *self.state.lock()
    }

    pub fn store(&self, value: f64) {
        *self.state.lock() = CacheState::Fresh(value);
    }

    /// Mark stale. Returns whether a fresh value was dropped.
    pub fn invalidate(&self) -> bool {
        let mut state = self.state.lock();
        let was_fresh = state.is_fresh();
        *state = CacheState::Stale;
        was_fresh
    }
}
