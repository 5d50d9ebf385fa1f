//! Hit/miss/save/error accounting.
//!
//! Counters are shared by every request that touches the store, so they are
//! plain atomics rather than a locked struct.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    saves: AtomicU64,
    errors: AtomicU64,
}

/// Copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterValues {
    pub hits: u64,
    pub misses: u64,
    pub saves: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn values(&self) -> CounterValues {
        CounterValues {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.saves.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_and_reset() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_save();
        stats.record_error();

        assert_eq!(
            stats.values(),
            CounterValues {
                hits: 2,
                misses: 1,
                saves: 1,
                errors: 1
            }
        );

        stats.reset();
        assert_eq!(stats.values(), CounterValues::default());
    }
}
