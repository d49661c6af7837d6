//! Traffic policy and liveness counters: per-direction token buckets, the
//! daily byte cap, watchdogs and the reset line debounce.

use std::time::{Duration, Instant};

use common::Direction;

mod bucket;
mod daily;
mod liveness;

pub use bucket::*;
pub use daily::*;
pub use liveness::*;

/// Token buckets for both directions, refilled from elapsed wall time.
#[derive(Clone, Debug)]
pub struct RateGovernor {
    pub downstream: TokenBucket,
    pub upstream: TokenBucket,
    last_refill: Option<Instant>,
}

impl RateGovernor {
    pub fn new(kbps_down: u32, kbps_up: u32) -> Self {
        Self {
            downstream: TokenBucket::from_kbps(kbps_down),
            upstream: TokenBucket::from_kbps(kbps_up),
            last_refill: None,
        }
    }

    /// Refill both buckets for the time since the previous call. The first
    /// call only starts the clock.
    ///
    /// The clock advances by whole milliseconds; the sub-millisecond rest
    /// stays pending for the next call.
    pub fn replenish(&mut self, now: Instant) {
        let Some(last) = self.last_refill else {
            self.last_refill = Some(now);
            return;
        };

        let elapsed_ms = now.saturating_duration_since(last).as_millis() as u64;
        self.downstream.replenish(elapsed_ms);
        self.upstream.replenish(elapsed_ms);
        self.last_refill = Some(last + Duration::from_millis(elapsed_ms));
    }

    pub fn bucket(&self, direction: Direction) -> &TokenBucket {
        match direction {
            Direction::Downstream => &self.downstream,
            Direction::Upstream => &self.upstream,
        }
    }

    pub fn bucket_mut(&mut self, direction: Direction) -> &mut TokenBucket {
        match direction {
            Direction::Downstream => &mut self.downstream,
            Direction::Upstream => &mut self.upstream,
        }
    }
}
