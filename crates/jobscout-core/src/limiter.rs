//! Resizable concurrency limiter.
//!
//! Bounds the number of in-flight tasks for one key (the whole transport or a
//! single source). Waiters are admitted in strict FIFO order, and the limit
//! can be raised or lowered while tasks are running.
//!
//! Built on [`tokio::sync::Semaphore`], which is fair. Raising the limit adds
//! permits immediately. Lowering it forgets idle permits right away; permits
//! that are currently held are forgotten as their tasks finish, so `active()`
//! may briefly exceed a freshly lowered limit but never a stable one.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug)]
struct LimitState {
    limit: usize,
    /// Held permits that must be forgotten instead of returned.
    owed: usize,
}

#[derive(Debug)]
pub struct Limiter {
    semaphore: Semaphore,
    state: Mutex<LimitState>,
}

/// Guard for one admitted task. Releases (or retires) the slot on drop.
pub struct LimiterPermit<'a> {
    limiter: &'a Limiter,
    permit: Option<SemaphorePermit<'a>>,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        let mut state = self.limiter.lock_state();
        if state.owed > 0 {
            state.owed -= 1;
            permit.forget();
        }
    }
}

impl Limiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Semaphore::new(limit),
            state: Mutex::new(LimitState { limit, owed: 0 }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LimitState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned limiter mutex");
            poisoned.into_inner()
        })
    }

    pub fn limit(&self) -> usize {
        self.lock_state().limit
    }

    /// Number of tasks currently holding a slot.
    pub fn active(&self) -> usize {
        let state = self.lock_state();
        (state.limit + state.owed).saturating_sub(self.semaphore.available_permits())
    }

    /// Sets a new limit, clamped to at least 1. Takes effect immediately.
    pub fn set_limit(&self, limit: usize) {
        let limit = limit.max(1);
        let mut state = self.lock_state();

        if limit > state.limit {
            let grow = limit - state.limit;
            let cancelled = grow.min(state.owed);
            state.owed -= cancelled;
            self.semaphore.add_permits(grow - cancelled);
        } else if limit < state.limit {
            let shrink = state.limit - limit;
            let retired = self.semaphore.forget_permits(shrink);
            state.owed += shrink - retired;
        }
        state.limit = limit;
    }

    /// Waits for a free slot, queueing behind earlier waiters.
    pub async fn acquire(&self) -> LimiterPermit<'_> {
        // The semaphore is owned here and never closed, so acquisition only
        // fails if that invariant is broken; in that case run unbounded.
        let permit = self.semaphore.acquire().await.ok();
        LimiterPermit {
            limiter: self,
            permit,
        }
    }

    /// Runs `task` once a slot is free and releases the slot when it finishes,
    /// whether it succeeded or failed.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        task.await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn test_limit_is_clamped_to_one() {
        let limiter = Limiter::new(0);
        assert_eq!(limiter.limit(), 1);
        limiter.set_limit(0);
        assert_eq!(limiter.limit(), 1);
    }

    #[tokio::test]
    async fn test_running_never_exceeds_limit() {
        let limiter = Arc::new(Limiter::new(3));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                limiter
                    .run(async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test]
    async fn test_raising_limit_admits_exactly_enough_waiters() {
        let limiter = Arc::new(Limiter::new(1));
        let held = limiter.acquire().await;
        let admitted = Arc::new(AtomicUsize::new(0));

        let mut releases = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let (tx, rx) = oneshot::channel::<()>();
            releases.push(tx);
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await;
                admitted.fetch_add(1, Ordering::SeqCst);
                let _ = rx.await;
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(admitted.load(Ordering::SeqCst), 0);

        limiter.set_limit(3);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(admitted.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.active(), 3);

        drop(held);
        for tx in releases {
            let _ = tx.send(());
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test]
    async fn test_lowering_limit_retires_slots_as_tasks_finish() {
        let limiter = Limiter::new(4);
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;
        let c = limiter.acquire().await;

        limiter.set_limit(1);
        assert_eq!(limiter.limit(), 1);
        assert_eq!(limiter.active(), 3);

        drop(a);
        drop(b);
        assert_eq!(limiter.active(), 1);
        assert_eq!(limiter.semaphore.available_permits(), 0);

        drop(c);
        assert_eq!(limiter.active(), 0);
        assert_eq!(limiter.semaphore.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_raise_after_lower_cancels_owed_permits() {
        let limiter = Limiter::new(2);
        let a = limiter.acquire().await;
        let b = limiter.acquire().await;

        limiter.set_limit(1);
        limiter.set_limit(3);
        drop(a);
        drop(b);

        assert_eq!(limiter.limit(), 3);
        assert_eq!(limiter.active(), 0);
        assert_eq!(limiter.semaphore.available_permits(), 3);
    }

    #[tokio::test]
    async fn test_waiters_are_admitted_in_fifo_order() {
        let limiter = Arc::new(Limiter::new(1));
        let order = Arc::new(Mutex::new(Vec::new()));
        let held = limiter.acquire().await;

        let mut handles = Vec::new();
        for i in 0..5 {
            let limiter = Arc::clone(&limiter);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter
                    .run(async {
                        order.lock().unwrap().push(i);
                    })
                    .await;
            }));
            // Make sure each waiter is queued before the next one.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_slot_released_when_task_fails() {
        let limiter = Limiter::new(1);
        let result: Result<(), &str> = limiter.run(async { Err("boom") }).await;
        assert!(result.is_err());
        assert_eq!(limiter.active(), 0);
        limiter.run(async {}).await;
    }
}
