//! Durable memoization layer.
//!
//! Expensive remote aggregates and the computations built on them are
//! persisted as JSON records keyed by a deterministic fingerprint. Freshness
//! is decided by the reader's TTL, so one entry can serve several tiers.

pub mod clock;
pub mod key;
pub mod memo;
pub mod stats;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{generate_key, CacheKey};
pub use memo::{CachePolicy, Memoizer};
pub use stats::{CacheStats, CounterValues};
pub use store::{CacheEntry, CacheStore};
