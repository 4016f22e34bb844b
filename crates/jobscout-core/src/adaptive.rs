//! Adaptive (AIMD) per-source concurrency.
//!
//! Every completed HTTP attempt for a source reports its status here. Error
//! statuses halve the source's limit; a run of successes raises it by one.

use std::sync::Mutex;

use crate::limiter::Limiter;

/// Consecutive non-error responses needed before the limit grows by one.
pub const SUCCESS_STREAK_TO_GROW: u32 = 20;

#[derive(Debug)]
pub struct SourceConcurrencyState {
    limiter: Limiter,
    min_limit: usize,
    max_limit: usize,
    success_streak: Mutex<u32>,
}

impl SourceConcurrencyState {
    /// Starts at `base` with bounds `[1, 2 * base]`.
    pub fn new(base: usize) -> Self {
        let base = base.max(1);
        Self {
            limiter: Limiter::new(base),
            min_limit: 1,
            max_limit: base * 2,
            success_streak: Mutex::new(0),
        }
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    pub fn limit(&self) -> usize {
        self.limiter.limit()
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    pub fn success_streak(&self) -> u32 {
        *self.streak()
    }

    fn streak(&self) -> std::sync::MutexGuard<'_, u32> {
        self.success_streak
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Feeds one completed attempt's status into the controller.
    ///
    /// Must be called exactly once per HTTP attempt; a retried call reports
    /// each of its attempts separately.
    pub fn record(&self, status: u16) {
        let mut streak = self.streak();

        if status == 429 || (500..600).contains(&status) {
            let current = self.limiter.limit();
            let next = (current / 2).max(self.min_limit);
            *streak = 0;
            if next != current {
                self.limiter.set_limit(next);
                tracing::debug!(status, from = current, to = next, "Reduced source concurrency");
            }
            return;
        }

        *streak += 1;
        if *streak >= SUCCESS_STREAK_TO_GROW {
            *streak = 0;
            let current = self.limiter.limit();
            let next = (current + 1).min(self.max_limit);
            if next != current {
                self.limiter.set_limit(next);
                tracing::debug!(from = current, to = next, "Raised source concurrency");
            }
        }
    }
}
