//! Compute-or-fetch wrapper around idempotent async operations.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::key::CacheKey;
use crate::store::CacheStore;

/// Identity and freshness window of one memoized operation class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub name: &'static str,
    pub ttl: Duration,
}

impl CachePolicy {
    pub const fn new(name: &'static str, ttl: Duration) -> Self {
        Self { name, ttl }
    }

    pub const fn minutes(name: &'static str, minutes: u64) -> Self {
        Self::new(name, Duration::from_secs(minutes * 60))
    }

    /// Start a key for one call of this operation.
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.name)
    }
}

/// Memoizes operations into a shared [`CacheStore`].
#[derive(Debug, Clone)]
pub struct Memoizer {
    store: Arc<CacheStore>,
    enabled: bool,
}

impl Memoizer {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            enabled: true,
        }
    }

    /// With caching disabled every call goes straight to the operation.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Return the cached result if fresh under `policy.ttl`, otherwise run
    /// `op`, cache a success, and propagate a failure uncached.
    ///
    /// The key always starts from `policy.key()`; `args` only appends the
    /// call's arguments, so two policies never share an entry.
    pub async fn run<T, E, A, F, Fut>(&self, policy: &CachePolicy, args: A, op: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: Display,
        A: FnOnce(CacheKey) -> CacheKey,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return op().await;
        }

        let fingerprint = args(policy.key()).fingerprint();
        if let Some(cached) = self.store.get::<T>(&fingerprint, Some(policy.ttl)) {
            return Ok(cached);
        }

        info!("Computing: {}...", policy.name);
        let started = Instant::now();

        match op().await {
            Ok(result) => {
                self.store.set(&fingerprint, &result);
                info!(
                    "Computed in {:.1}s: {}",
                    started.elapsed().as_secs_f64(),
                    policy.name
                );
                Ok(result)
            }
            Err(e) => {
                warn!(
                    "Error after {:.1}s: {}: {}",
                    started.elapsed().as_secs_f64(),
                    policy.name,
                    e
                );
                Err(e)
            }
        }
    }
}
