//! Client-side throttle for aggregate queries.
//!
//! The analytics backend meters reduce-region calls per project. Queries
//! wait here for a slot instead of drawing 429s.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Single-bucket limiter shared by every clone of the client.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Allow `requests_per_minute` queries (zero is treated as one).
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        }
    }

    /// Wait until a query slot is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}
