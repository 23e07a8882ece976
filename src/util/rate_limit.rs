//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Reliable requests (fire, claim) a peer may send per second
pub const RELIABLE_RATE_LIMIT: u32 = 30;

/// Per-peer inbound rate limiter state
#[derive(Clone)]
pub struct PeerRateLimiter {
    movement_limiter: Arc<Limiter>,
    reliable_limiter: Arc<Limiter>,
}

impl PeerRateLimiter {
    /// Movement updates are allowed at twice the tick rate to absorb jitter
    pub fn new(tick_rate: u32) -> Self {
        Self {
            movement_limiter: create_limiter(tick_rate.saturating_mul(2)),
            reliable_limiter: create_limiter(RELIABLE_RATE_LIMIT),
        }
    }

    /// Check if a movement update is allowed (returns true if allowed)
    pub fn check_movement(&self) -> bool {
        self.movement_limiter.check().is_ok()
    }

    /// Check if a reliable request is allowed
    pub fn check_reliable(&self) -> bool {
        self.reliable_limiter.check().is_ok()
    }
}
