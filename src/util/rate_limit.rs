//! Rate limiting for client input

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

/// Max input messages per second per connection
pub const INPUT_RATE_LIMIT: u32 = 30;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-connection input rate limiter. One of these lives in each socket
/// task, so no sharing or keying is needed.
pub struct PlayerRateLimiter {
    limiter: Limiter,
}

impl PlayerRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(INPUT_RATE_LIMIT)
    }

    pub fn with_rate(per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Check if an input message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for PlayerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
